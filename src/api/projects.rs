use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use http::StatusCode;
use log::info;
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, not_found_as};
use crate::api::requirements::Deleted;
use crate::api::state::{AppState, run_blocking, transactional};
use crate::db::models as dbm;
use crate::db::store;
use crate::utils::{decode_json, provided_id};

const NOT_FOUND: &str = "Proyecto no encontrado";

#[derive(Debug, Deserialize)]
pub struct ProjectInput {
    pub nombre: Option<String>,
    pub estado: Option<String>,
    pub usuario_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ProjectView {
    pub id: i64,
    pub nombre: String,
    pub estado: Option<String>,
    pub usuario_id: i64,
}

impl From<dbm::Project> for ProjectView {
    fn from(p: dbm::Project) -> Self {
        ProjectView {
            id: p.id,
            nombre: p.name,
            estado: p.status,
            usuario_id: p.user_id,
        }
    }
}

pub async fn create(State(state): State<AppState>, body: Bytes) -> Result<(StatusCode, Json<ProjectView>), ApiError> {
    let input: ProjectInput = decode_json(&body)?;
    let name = input
        .nombre
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("El campo \"nombre\" es requerido.".to_string()))?;
    let user_id = provided_id(input.usuario_id).unwrap_or(state.rules.demo_user_id);

    let row = dbm::NewProject {
        user_id,
        name,
        status: Some(input.estado.unwrap_or_else(|| state.rules.demo_project_status.clone())),
    };
    let created = run_blocking(move || {
        let mut conn = state.conn()?;
        transactional(&mut conn, "Error al guardar proyecto", |conn| {
            store::get_user(conn, user_id).map_err(|e| not_found_as(e, "Usuario no encontrado"))?;
            Ok(store::insert_project(conn, &row)?)
        })
    })
    .await?;
    info!("Project {} created for user {}", created.id, created.user_id);
    Ok((StatusCode::CREATED, Json(created.into())))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<ProjectView>, ApiError> {
    let project = run_blocking(move || {
        let mut conn = state.conn()?;
        store::get_project(&mut conn, id).map_err(|e| not_found_as(e, NOT_FOUND))
    })
    .await?;
    Ok(Json(project.into()))
}

/// Removes the project and, through the schema's cascades, everything it owns.
pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Deleted>, ApiError> {
    run_blocking(move || {
        let mut conn = state.conn()?;
        transactional(&mut conn, "Error al eliminar proyecto", |conn| {
            store::delete_project(conn, id).map_err(|e| not_found_as(e, NOT_FOUND))
        })
    })
    .await?;
    info!("Project {} deleted", id);
    Ok(Json(Deleted {
        mensaje: "Proyecto eliminado",
    }))
}
