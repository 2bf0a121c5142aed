//! Metric capture: run a snippet under an energy measurement session and
//! persist the resulting TestRun + Metric pair.

use diesel::PgConnection;
use diesel::prelude::*;
use log::{debug, info};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Rules;
use crate::db::models as dbm;
use crate::db::store::{self, DbPool};
use crate::services::energy::EnergyEstimator;
use crate::services::sandbox::{CodeSandbox, ExecutionError};

/// Values derived from one measured execution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub emissions_kg: f64,
    pub cpu_usage: f64,
    pub execution_secs: f64,
}

/// Public shape of a capture result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CaptureReading {
    pub emisiones_co2: f64,
    pub consumo_cpu: f64,
}

impl From<&Measurement> for CaptureReading {
    fn from(m: &Measurement) -> Self {
        CaptureReading {
            emisiones_co2: m.emissions_kg,
            consumo_cpu: m.cpu_usage,
        }
    }
}

#[derive(Debug)]
pub enum CaptureError {
    Execution(ExecutionError),
    Pool(String),
    Persistence(diesel::result::Error),
}

impl core::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CaptureError::Execution(e) => write!(f, "{}", e),
            CaptureError::Pool(e) => write!(f, "database unavailable: {}", e),
            CaptureError::Persistence(e) => write!(f, "Error al guardar la métrica: {}", e),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::Execution(e) => Some(e),
            CaptureError::Persistence(e) => Some(e),
            CaptureError::Pool(_) => None,
        }
    }
}

impl From<ExecutionError> for CaptureError {
    fn from(value: ExecutionError) -> Self {
        CaptureError::Execution(value)
    }
}

impl From<diesel::result::Error> for CaptureError {
    fn from(value: diesel::result::Error) -> Self {
        CaptureError::Persistence(value)
    }
}

/// Turns a raw estimator reading into (emissions, cpu proxy). Absent or zero
/// readings are replaced by the floors so no metric is ever stored as zero.
pub fn derive_reading(raw: Option<f64>, rules: &Rules) -> (f64, f64) {
    match raw {
        Some(e) if e != 0.0 => (e, e * rules.cpu_per_emission + rules.cpu_offset),
        _ => (rules.emissions_floor, rules.cpu_floor),
    }
}

#[derive(Clone)]
pub struct MetricCapture {
    sandbox: Arc<dyn CodeSandbox>,
    estimator: Arc<dyn EnergyEstimator>,
    rules: Arc<Rules>,
}

impl MetricCapture {
    pub fn new(sandbox: Arc<dyn CodeSandbox>, estimator: Arc<dyn EnergyEstimator>, rules: Arc<Rules>) -> Self {
        MetricCapture {
            sandbox,
            estimator,
            rules,
        }
    }

    /// Executes `code` inside a measurement session. The session is always
    /// stopped, including when execution fails.
    pub fn measure(&self, code: &str) -> Result<Measurement, ExecutionError> {
        let session = self.estimator.start();
        let started = Instant::now();
        let outcome = self.sandbox.execute(code);
        let execution_secs = started.elapsed().as_secs_f64();
        let raw = session.stop();

        if let Err(e) = outcome {
            debug!("Capture: execution failed after {:.3}s: {}", execution_secs, e);
            return Err(e);
        }

        let (emissions_kg, cpu_usage) = derive_reading(raw, &self.rules);
        Ok(Measurement {
            emissions_kg,
            cpu_usage,
            execution_secs,
        })
    }

    /// Stores one TestRun and its Metric atomically.
    pub fn record(
        &self,
        conn: &mut PgConnection,
        code_id: i64,
        test_kind: &str,
        m: &Measurement,
    ) -> QueryResult<dbm::Metric> {
        store::in_transaction(conn, "recording test run and metric", |conn| {
            let run = store::insert_test_run(
                conn,
                &dbm::NewTestRun {
                    code_id,
                    test_kind: test_kind.to_string(),
                },
            )?;
            store::insert_metric(
                conn,
                &dbm::NewMetric {
                    test_run_id: run.id,
                    cpu_usage: m.cpu_usage,
                    co2_emissions_kg: m.emissions_kg,
                    execution_time_secs: Some(m.execution_secs),
                },
            )
        })
    }

    /// Measure, then record. A database connection is only taken once the
    /// code has run successfully.
    pub fn measure_and_record(
        &self,
        pool: &DbPool,
        code: &str,
        code_id: i64,
        test_kind: &str,
    ) -> Result<CaptureReading, CaptureError> {
        let m = self.measure(code)?;
        let mut conn = pool.get().map_err(|e| CaptureError::Pool(e.to_string()))?;
        let metric = self.record(&mut conn, code_id, test_kind, &m)?;
        info!(
            "Capture: code {} '{}' -> metric {} ({:.6} kg CO2, {:.3}s)",
            code_id, test_kind, metric.id, m.emissions_kg, m.execution_secs
        );
        Ok(CaptureReading::from(&m))
    }
}
