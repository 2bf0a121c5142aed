//! Code generation, measurement and AI-assisted refactoring.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use diesel::OptionalExtension;
use log::info;
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, not_found_as};
use crate::api::state::{AppState, run_blocking, transactional};
use crate::client::{AssistProfile, is_error_text, parse_suggestions};
use crate::db::models::{self as dbm, test_kinds};
use crate::db::store;
use crate::services::capture::CaptureReading;
use crate::utils::{decode_json, provided_id};

const DEFAULT_CODE: &str = "print(\"No code\")";
const GENERATED_LANGUAGE: &str = "HTML/CSS";

#[derive(Debug, Deserialize)]
pub struct GenerateInput {
    pub arquitectura_id: Option<i64>,
    pub script: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GeneratedCode {
    pub codigo_id: i64,
    pub script: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CodeInput {
    pub codigo: Option<String>,
    pub codigo_id: Option<i64>,
}

impl CodeInput {
    pub fn require_code_id(&self) -> Result<i64, ApiError> {
        provided_id(self.codigo_id).ok_or_else(|| ApiError::Validation("codigo_id es requerido".to_string()))
    }
}

#[derive(Debug, Serialize)]
pub struct OptimizedCode {
    pub nuevo_codigo: String,
    pub resultado: CaptureReading,
}

#[derive(Debug, Serialize)]
pub struct Suggestion {
    pub sugerencia: String,
}

#[derive(Debug, Serialize)]
pub struct Suggestions {
    pub sugerencias: Vec<Suggestion>,
}

/// Stores editor output as a code artifact of an architecture.
pub async fn generate(State(state): State<AppState>, body: Bytes) -> Result<Json<GeneratedCode>, ApiError> {
    let input: GenerateInput = decode_json(&body)?;
    let architecture_id = provided_id(input.arquitectura_id)
        .ok_or_else(|| ApiError::Validation("arquitectura_id es requerido".to_string()))?;

    let row = dbm::NewCode {
        architecture_id,
        language: Some(GENERATED_LANGUAGE.to_string()),
        script: input.script,
    };
    let saved = run_blocking(move || {
        let mut conn = state.conn()?;
        transactional(&mut conn, "Error al guardar código", |conn| {
            store::get_architecture(conn, architecture_id)
                .map_err(|e| not_found_as(e, "Arquitectura no encontrada"))?;
            Ok(store::insert_code(conn, &row)?)
        })
    })
    .await?;

    Ok(Json(GeneratedCode {
        codigo_id: saved.id,
        script: saved.script,
    }))
}

pub async fn analyze(State(state): State<AppState>, body: Bytes) -> Result<Json<CaptureReading>, ApiError> {
    let input: CodeInput = decode_json(&body)?;
    let code_id = input.require_code_id()?;
    let code = input.codigo.unwrap_or_else(|| DEFAULT_CODE.to_string());

    let reading = run_blocking(move || {
        Ok(state
            .capture
            .measure_and_record(&state.pool, &code, code_id, test_kinds::EFFICIENCY_ANALYSIS)?)
    })
    .await?;
    Ok(Json(reading))
}

/// Asks the assistant for a leaner version, measures it, and stores it as the
/// code's new script when the code exists.
pub async fn optimize(State(state): State<AppState>, body: Bytes) -> Result<Json<OptimizedCode>, ApiError> {
    let input: CodeInput = decode_json(&body)?;
    let code_id = input.require_code_id()?;
    let original = input.codigo.unwrap_or_default();

    let result = run_blocking(move || {
        let prompt = AssistProfile::Optimize.prompt(&original);
        let optimized = state.assistant.complete(&prompt, AssistProfile::Optimize);
        if is_error_text(&optimized) {
            return Err(ApiError::Assistant(optimized));
        }

        let reading = state
            .capture
            .measure_and_record(&state.pool, &optimized, code_id, test_kinds::AI_OPTIMIZATION)?;

        let mut conn = state.conn()?;
        transactional(&mut conn, "No se pudo guardar el código optimizado", |conn| {
            if store::get_code(conn, code_id).optional()?.is_some() {
                store::update_code_script(conn, code_id, &optimized)?;
                info!("Code {} replaced by optimized version", code_id);
            }
            Ok(())
        })?;

        Ok(OptimizedCode {
            nuevo_codigo: optimized,
            resultado: reading,
        })
    })
    .await?;
    Ok(Json(result))
}

pub async fn suggest(State(state): State<AppState>, body: Bytes) -> Result<Json<Suggestions>, ApiError> {
    let input: CodeInput = decode_json(&body)?;
    let code = input.codigo.unwrap_or_default();

    let answer = run_blocking(move || {
        let prompt = AssistProfile::Suggest.prompt(&code);
        Ok(state.assistant.complete(&prompt, AssistProfile::Suggest))
    })
    .await?;

    let sugerencias = parse_suggestions(&answer)
        .into_iter()
        .map(|sugerencia| Suggestion { sugerencia })
        .collect();
    Ok(Json(Suggestions { sugerencias }))
}
