use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use log::info;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::state::{AppState, run_blocking, transactional};
use crate::db::models as dbm;
use crate::db::store;
use crate::services::impact::{ComponentSuggestion, eco_alternatives, projected_kwh};
use crate::utils::decode_json;

#[derive(Debug, Deserialize)]
pub struct ImpactInput {
    #[serde(default)]
    pub componentes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ImpactResult {
    pub total_kwh_proyectado: f64,
    pub arquitectura_id: i64,
}

pub async fn suggest_components() -> Json<Vec<ComponentSuggestion>> {
    Json(eco_alternatives())
}

/// Prices the component list and stores it as a new architecture of the demo
/// project.
pub async fn calculate_impact(State(state): State<AppState>, body: Bytes) -> Result<Json<ImpactResult>, ApiError> {
    let input: ImpactInput = decode_json(&body)?;
    let total = projected_kwh(&state.rules, &input.componentes);
    let components = serde_json::to_string(&input.componentes)
        .map_err(|e| ApiError::Internal(format!("could not serialize components: {}", e)))?;

    let row = dbm::NewArchitecture {
        project_id: state.rules.demo_project_id,
        components,
        projected_impact_kwh: total,
    };
    let saved = run_blocking(move || {
        let mut conn = state.conn()?;
        transactional(&mut conn, "Error al guardar arquitectura", |conn| {
            Ok(store::insert_architecture(conn, &row)?)
        })
    })
    .await?;
    info!(
        "Architecture {} saved ({} component(s), {:.2} kWh)",
        saved.id,
        input.componentes.len(),
        total
    );

    Ok(Json(ImpactResult {
        total_kwh_proyectado: total,
        arquitectura_id: saved.id,
    }))
}
