//! Requirement CRUD. Energy estimates are always derived from the
//! description, never taken from the caller.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, not_found_as};
use crate::api::state::{AppState, run_blocking, transactional};
use crate::db::models as dbm;
use crate::db::store;
use crate::utils::decode_json;

#[derive(Debug, Deserialize)]
pub struct RequirementInput {
    pub descripcion: Option<String>,
    pub prioridad: Option<String>,
    pub proyecto_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequirementView {
    pub id: i64,
    pub descripcion: String,
    pub prioridad: Option<String>,
    pub kwh_estimado: f64,
}

impl From<dbm::Requirement> for RequirementView {
    fn from(r: dbm::Requirement) -> Self {
        RequirementView {
            id: r.id,
            descripcion: r.description,
            prioridad: r.priority,
            kwh_estimado: r.estimated_kwh,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RequirementsSummary {
    pub total_kwh_proyectado: f64,
    pub total_requisitos: usize,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub mensaje: &'static str,
}

pub async fn create(State(state): State<AppState>, body: Bytes) -> Result<(StatusCode, Json<RequirementView>), ApiError> {
    let input: RequirementInput = decode_json(&body)?;
    let description = input
        .descripcion
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ApiError::Validation("El campo \"Descripción\" es requerido.".to_string()))?;

    let row = dbm::NewRequirement {
        project_id: input.proyecto_id.unwrap_or(state.rules.demo_project_id),
        estimated_kwh: state.rules.requirement_kwh(&description),
        description,
        priority: input.prioridad,
    };
    let created = run_blocking(move || {
        let mut conn = state.conn()?;
        transactional(&mut conn, "Error al guardar requisito", |conn| {
            Ok(store::insert_requirement(conn, &row)?)
        })
    })
    .await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

pub async fn list_for_project(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<Json<Vec<RequirementView>>, ApiError> {
    let rows = run_blocking(move || {
        let mut conn = state.conn()?;
        Ok(store::list_requirements(&mut conn, project_id)?)
    })
    .await?;
    Ok(Json(rows.into_iter().map(RequirementView::from).collect()))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<RequirementView>, ApiError> {
    let input: RequirementInput = decode_json(&body)?;
    let updated = run_blocking(move || {
        let mut conn = state.conn()?;
        transactional(&mut conn, "Error al actualizar requisito", |conn| {
            let current = store::get_requirement(conn, id)
                .map_err(|e| not_found_as(e, "Requisito no encontrado"))?;
            let description = input
                .descripcion
                .filter(|d| !d.is_empty())
                .ok_or_else(|| ApiError::Validation("La descripción no puede estar vacía".to_string()))?;
            let priority = input.prioridad.or(current.priority);
            Ok(store::update_requirement(conn, &state.rules, id, &description, priority)?)
        })
    })
    .await?;
    Ok(Json(updated.into()))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Deleted>, ApiError> {
    run_blocking(move || {
        let mut conn = state.conn()?;
        transactional(&mut conn, "Error al eliminar requisito", |conn| {
            store::delete_requirement(conn, id).map_err(|e| not_found_as(e, "Requisito no encontrado"))
        })
    })
    .await?;
    Ok(Json(Deleted {
        mensaje: "Requisito eliminado",
    }))
}

pub async fn summary(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<Json<RequirementsSummary>, ApiError> {
    let rows = run_blocking(move || {
        let mut conn = state.conn()?;
        Ok(store::list_requirements(&mut conn, project_id)?)
    })
    .await?;
    Ok(Json(summarize(&rows)))
}

pub fn summarize(rows: &[dbm::Requirement]) -> RequirementsSummary {
    RequirementsSummary {
        total_kwh_proyectado: rows.iter().map(|r| r.estimated_kwh).sum(),
        total_requisitos: rows.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_of_no_requirements_is_zero() {
        let s = summarize(&[]);
        assert_eq!(s.total_kwh_proyectado, 0.0);
        assert_eq!(s.total_requisitos, 0);
    }

    #[test]
    fn summary_adds_estimates() {
        let rows = vec![
            dbm::Requirement {
                id: 1,
                project_id: 1,
                description: "ab".into(),
                priority: None,
                estimated_kwh: 0.1,
            },
            dbm::Requirement {
                id: 2,
                project_id: 1,
                description: "abcd".into(),
                priority: Some("Alta".into()),
                estimated_kwh: 0.2,
            },
        ];
        let s = summarize(&rows);
        assert!((s.total_kwh_proyectado - 0.3).abs() < 1e-12);
        assert_eq!(s.total_requisitos, 2);
    }

    #[test]
    fn view_uses_public_field_names() {
        let view = RequirementView::from(dbm::Requirement {
            id: 3,
            project_id: 1,
            description: "abc".into(),
            priority: Some("Media".into()),
            estimated_kwh: 0.15,
        });
        let v = serde_json::to_value(view).unwrap();
        assert_eq!(v["id"], 3);
        assert_eq!(v["descripcion"], "abc");
        assert_eq!(v["prioridad"], "Media");
        assert_eq!(v["kwh_estimado"], 0.15);
    }
}
