//! Metric history for charts and the environmental report.

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use diesel::PgConnection;
use log::{debug, info};
use serde::Serialize;

use crate::api::error::{ApiError, not_found_as};
use crate::api::state::{AppState, run_blocking, transactional};
use crate::config::Rules;
use crate::db::models as dbm;
use crate::db::store;
use crate::services::assessment::{EnvironmentalReport, environmental_report};

const REPORT_NAME: &str = "Reporte ambiental";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSeries {
    pub labels: Vec<String>,
    pub data_co2: Vec<f64>,
    pub data_cpu: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub struct StoredReport {
    pub id: i64,
    pub nombre: Option<String>,
    pub fecha: DateTime<Utc>,
    pub contenido: Option<String>,
}

impl From<dbm::Report> for StoredReport {
    fn from(r: dbm::Report) -> Self {
        StoredReport {
            id: r.id,
            nombre: r.name,
            fecha: r.created_at,
            contenido: r.content,
        }
    }
}

pub fn metric_series(metrics: &[dbm::Metric]) -> MetricSeries {
    MetricSeries {
        labels: metrics
            .iter()
            .map(|m| format!("Metrica {} (Prueba {})", m.id, m.test_run_id))
            .collect(),
        data_co2: metrics.iter().map(|m| m.co2_emissions_kg).collect(),
        data_cpu: metrics.iter().map(|m| m.cpu_usage).collect(),
    }
}

pub async fn project_metrics(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<Json<MetricSeries>, ApiError> {
    let metrics = run_blocking(move || {
        let mut conn = state.conn()?;
        Ok(store::metrics_for_project(&mut conn, project_id)?)
    })
    .await?;
    Ok(Json(metric_series(&metrics)))
}

/// Builds the demo project's environmental report and keeps a copy attached
/// to its latest metric.
pub async fn generate_report(State(state): State<AppState>) -> Result<Json<EnvironmentalReport>, ApiError> {
    let report = run_blocking(move || {
        let mut conn = state.conn()?;
        store_environmental_report(&mut conn, &state.rules, state.rules.demo_project_id)
    })
    .await?;
    Ok(Json(report))
}

/// Computes a project's environmental report and stores it under the latest
/// metric. Polling is idempotent: nothing is written while the latest metric
/// already carries a report with the same content, so the table only grows
/// when new metrics arrive.
pub fn store_environmental_report(
    conn: &mut PgConnection,
    rules: &Rules,
    project_id: i64,
) -> Result<EnvironmentalReport, ApiError> {
    let metrics = store::metrics_for_project(conn, project_id)?;
    let report = environmental_report(rules, &metrics)
        .ok_or_else(|| ApiError::NotFound("Reporte incompleto. No hay datos de métricas.".to_string()))?;
    let Some(latest) = metrics.last() else {
        return Ok(report);
    };
    let content = serde_json::to_string(&report)
        .map_err(|e| ApiError::Internal(format!("could not serialize report: {}", e)))?;

    transactional(conn, "Error al guardar reporte", |conn| {
        let previous = store::list_reports(conn, latest.id)?;
        if previous.last().and_then(|r| r.content.as_deref()) == Some(content.as_str()) {
            debug!("Report for metric {} unchanged, not stored again", latest.id);
            return Ok(());
        }
        let saved = store::insert_report(
            conn,
            &dbm::NewReport {
                metric_id: latest.id,
                name: Some(REPORT_NAME.to_string()),
                content: Some(content.clone()),
            },
        )?;
        info!(
            "Report {} stored for metric {} ({} analyses)",
            saved.id, latest.id, report.total_analisis_realizados
        );
        Ok(())
    })?;
    Ok(report)
}

pub async fn reports_for_metric(
    State(state): State<AppState>,
    Path(metric_id): Path<i64>,
) -> Result<Json<Vec<StoredReport>>, ApiError> {
    let rows = run_blocking(move || {
        let mut conn = state.conn()?;
        store::get_metric(&mut conn, metric_id).map_err(|e| not_found_as(e, "Métrica no encontrada"))?;
        Ok(store::list_reports(&mut conn, metric_id)?)
    })
    .await?;
    Ok(Json(rows.into_iter().map(StoredReport::from).collect()))
}
