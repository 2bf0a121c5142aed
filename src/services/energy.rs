//! Process-level energy/emissions estimation.
//!
//! A session samples global CPU usage between `start` and `stop` and converts
//! it to kg CO2: `tdp_watts * usage * seconds -> kWh -> kg CO2`.

use std::time::Instant;
use sysinfo::System;

use crate::config::Config;

pub trait EnergyEstimator: Send + Sync {
    fn start(&self) -> Box<dyn MeasurementSession>;
}

pub trait MeasurementSession: Send {
    /// Ends the session. `None` when no reading could be taken.
    fn stop(self: Box<Self>) -> Option<f64>;
}

#[derive(Debug, Clone, Copy)]
pub struct CpuEnergyEstimator {
    tdp_watts: f64,
    carbon_intensity: f64,
}

impl CpuEnergyEstimator {
    pub fn new(tdp_watts: f64, carbon_intensity: f64) -> Self {
        CpuEnergyEstimator {
            tdp_watts,
            carbon_intensity,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.cpu_tdp_watts, cfg.carbon_intensity)
    }
}

impl EnergyEstimator for CpuEnergyEstimator {
    fn start(&self) -> Box<dyn MeasurementSession> {
        let mut system = System::new();
        system.refresh_cpu_usage();
        Box::new(CpuSession {
            system,
            started: Instant::now(),
            tdp_watts: self.tdp_watts,
            carbon_intensity: self.carbon_intensity,
        })
    }
}

struct CpuSession {
    system: System,
    started: Instant,
    tdp_watts: f64,
    carbon_intensity: f64,
}

impl MeasurementSession for CpuSession {
    fn stop(mut self: Box<Self>) -> Option<f64> {
        let seconds = self.started.elapsed().as_secs_f64();
        self.system.refresh_cpu_usage();
        let usage_pct = self.system.global_cpu_usage() as f64;
        estimate_emissions(self.tdp_watts, self.carbon_intensity, usage_pct, seconds)
    }
}

/// kg CO2 for running at `usage_pct` of `tdp_watts` for `seconds`.
pub fn estimate_emissions(tdp_watts: f64, carbon_intensity: f64, usage_pct: f64, seconds: f64) -> Option<f64> {
    if !usage_pct.is_finite() || !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    let kwh = tdp_watts * (usage_pct.clamp(0.0, 100.0) / 100.0) * seconds / 3_600_000.0;
    Some(kwh * carbon_intensity)
}
