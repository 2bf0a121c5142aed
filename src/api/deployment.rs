use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use diesel::PgConnection;
use http::StatusCode;
use log::info;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::state::{AppState, run_blocking, transactional};
use crate::config::Rules;
use crate::db::models::{self as dbm, deployment_status};
use crate::db::store;
use crate::services::assessment::{IssueCorrelation, PreDeployCheck, correlate_issue, pre_deploy_check};

const NO_METRICS: &str = "Fallo en la revisión. No hay métricas registradas.";

#[derive(Debug, Serialize)]
pub struct DeploymentView {
    pub id: i64,
    pub fecha_despliegue: DateTime<Utc>,
    pub estado: Option<String>,
}

impl From<dbm::Deployment> for DeploymentView {
    fn from(d: dbm::Deployment) -> Self {
        DeploymentView {
            id: d.id,
            fecha_despliegue: d.created_at,
            estado: d.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecordedDeployment {
    #[serde(flatten)]
    pub deployment: DeploymentView,
    pub revision: PreDeployCheck,
}

pub fn status_for(check: &PreDeployCheck) -> &'static str {
    if check.pasa_revision {
        deployment_status::APPROVED
    } else {
        deployment_status::BLOCKED
    }
}

pub async fn pre_check(State(state): State<AppState>) -> Result<Json<PreDeployCheck>, ApiError> {
    let check = run_blocking(move || {
        let mut conn = state.conn()?;
        latest_check(&mut conn, &state.rules, state.rules.demo_project_id)
    })
    .await?;
    Ok(Json(check))
}

/// Pre-deployment check on a project's latest metric; 404 without metrics.
pub fn latest_check(conn: &mut PgConnection, rules: &Rules, project_id: i64) -> Result<PreDeployCheck, ApiError> {
    let latest = store::latest_metric_for_project(conn, project_id)?
        .ok_or_else(|| ApiError::NotFound(NO_METRICS.to_string()))?;
    Ok(pre_deploy_check(rules, &latest))
}

pub async fn simulate_issue(State(state): State<AppState>) -> Result<Json<IssueCorrelation>, ApiError> {
    let correlation = run_blocking(move || {
        let mut conn = state.conn()?;
        let latest = store::latest_metric_for_project(&mut conn, state.rules.demo_project_id)?;
        Ok(correlate_issue(&state.rules, latest.as_ref()))
    })
    .await?;
    Ok(Json(correlation))
}

/// Records a deployment of the demo project, approved or blocked by the
/// pre-deployment check on its latest metric.
pub async fn create(State(state): State<AppState>) -> Result<(StatusCode, Json<RecordedDeployment>), ApiError> {
    let recorded = run_blocking(move || {
        let mut conn = state.conn()?;
        record_deployment(&mut conn, &state.rules, state.rules.demo_project_id)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

pub fn record_deployment(conn: &mut PgConnection, rules: &Rules, project_id: i64) -> Result<RecordedDeployment, ApiError> {
    transactional(conn, "Error al registrar despliegue", |conn| {
        let check = latest_check(conn, rules, project_id)?;
        let row = dbm::NewDeployment {
            project_id,
            status: Some(status_for(&check).to_string()),
        };
        let saved = store::insert_deployment(conn, &row)?;
        info!(
            "Deployment {} of project {} recorded as {}",
            saved.id,
            project_id,
            status_for(&check)
        );
        Ok(RecordedDeployment {
            deployment: saved.into(),
            revision: check,
        })
    })
}

pub async fn list_for_project(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<Json<Vec<DeploymentView>>, ApiError> {
    let rows = run_blocking(move || {
        let mut conn = state.conn()?;
        Ok(store::list_deployments(&mut conn, project_id)?)
    })
    .await?;
    Ok(Json(rows.into_iter().map(DeploymentView::from).collect()))
}
