use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use http::StatusCode;
use log::{info, warn};

use crate::api::code::CodeInput;
use crate::api::error::ApiError;
use crate::api::state::{AppState, run_blocking};
use crate::db::models::test_kinds;
use crate::services::assessment::{TestReport, failed_test_report, measured_test_report};
use crate::utils::decode_json;

/// Runs the functional/efficiency suite. A capture failure is still answered
/// with a full report body, only the status changes.
pub async fn run_tests(State(state): State<AppState>, body: Bytes) -> Result<(StatusCode, Json<TestReport>), ApiError> {
    let input: CodeInput = decode_json(&body)?;
    let code_id = input.require_code_id()?;
    let code = input.codigo.unwrap_or_default();

    let (status, report) = run_blocking(move || {
        let result = state
            .capture
            .measure_and_record(&state.pool, &code, code_id, test_kinds::FUNCTIONAL);
        Ok(match result {
            Ok(reading) => {
                let report = measured_test_report(&state.rules, &code, reading);
                info!("Test run for code {}: passed={}", code_id, report.pasaron);
                (StatusCode::OK, report)
            }
            Err(e) => {
                warn!("Test run for code {} failed: {}", code_id, e);
                (StatusCode::INTERNAL_SERVER_ERROR, failed_test_report(&e.to_string()))
            }
        })
    })
    .await?;
    Ok((status, Json(report)))
}
