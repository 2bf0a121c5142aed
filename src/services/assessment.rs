//! Verdicts computed from captured metrics: test reports, the environmental
//! report and deployment checks.

use serde::Serialize;

use crate::config::Rules;
use crate::db::models::Metric;
use crate::services::capture::CaptureReading;

const INEFFICIENT_LOOP: &str = "for i in range";
const INEFFICIENT_APPEND: &str = "append";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestReport {
    pub pasaron: bool,
    pub mensaje: String,
    pub alerta_pico: Option<String>,
    pub metricas: CaptureReading,
    pub reduccion_comparativa: String,
}

/// Report for code that could not be measured.
pub fn failed_test_report(error: &str) -> TestReport {
    TestReport {
        pasaron: false,
        mensaje: "¡FALLO DE COMPILACIÓN! Las pruebas no se pudieron ejecutar.".to_string(),
        alerta_pico: Some(error.to_string()),
        metricas: CaptureReading {
            emisiones_co2: 0.0,
            consumo_cpu: 0.0,
        },
        reduccion_comparativa: "0%".to_string(),
    }
}

/// Report for a measured run. Code with a `for i in range` loop that also
/// calls `append` always fails, whatever was measured.
pub fn measured_test_report(rules: &Rules, code: &str, reading: CaptureReading) -> TestReport {
    if code.contains(INEFFICIENT_LOOP) && code.contains(INEFFICIENT_APPEND) {
        return TestReport {
            pasaron: false,
            mensaje: format!(
                "¡FALLO DETECTADO! Prueba de eficiencia energética falló. Impacto excesivo detectado: {:.6} kg CO2.",
                reading.emisiones_co2
            ),
            alerta_pico: Some("Se detectó un bucle ineficiente (for/append).".to_string()),
            metricas: reading,
            reduccion_comparativa: "0%".to_string(),
        };
    }
    TestReport {
        pasaron: true,
        mensaje: "¡Pruebas funcionales y de eficiencia energética PASARON!".to_string(),
        alerta_pico: None,
        metricas: reading,
        reduccion_comparativa: rules.simulated_test_reduction.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentalReport {
    pub total_co2_generado: f64,
    pub total_co2_tradicional_simulado: f64,
    pub reduccion_porcentaje: f64,
    pub total_analisis_realizados: usize,
}

/// `None` when there is nothing to report on.
pub fn environmental_report(rules: &Rules, metrics: &[Metric]) -> Option<EnvironmentalReport> {
    if metrics.is_empty() {
        return None;
    }
    let actual: f64 = metrics.iter().map(|m| m.co2_emissions_kg).sum();
    let traditional = actual * rules.traditional_multiplier;
    let reduction = if traditional == 0.0 {
        0.0
    } else {
        (1.0 - actual / traditional) * 100.0
    };
    Some(EnvironmentalReport {
        total_co2_generado: actual,
        total_co2_tradicional_simulado: traditional,
        reduccion_porcentaje: reduction.max(rules.min_reduction_pct),
        total_analisis_realizados: metrics.len(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreDeployCheck {
    pub metrica_actual_co2: f64,
    pub benchmark_co2: f64,
    pub pasa_revision: bool,
}

pub fn pre_deploy_check(rules: &Rules, latest: &Metric) -> PreDeployCheck {
    PreDeployCheck {
        metrica_actual_co2: latest.co2_emissions_kg,
        benchmark_co2: rules.co2_peak_threshold,
        pasa_revision: latest.co2_emissions_kg <= rules.co2_peak_threshold,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueCorrelation {
    pub correlacion_energetica: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrica_actual_co2: Option<f64>,
    pub mensaje: String,
}

pub fn correlate_issue(rules: &Rules, latest: Option<&Metric>) -> IssueCorrelation {
    let Some(metric) = latest else {
        return IssueCorrelation {
            correlacion_energetica: false,
            metrica_actual_co2: None,
            mensaje: "No hay métricas para correlacionar.".to_string(),
        };
    };
    let co2 = metric.co2_emissions_kg;
    if co2 > rules.co2_peak_threshold {
        IssueCorrelation {
            correlacion_energetica: true,
            metrica_actual_co2: Some(co2),
            mensaje: format!("¡CORRELACIÓN ENCONTRADA! El issue se debe a un pico de {:.6} kg CO2.", co2),
        }
    } else {
        IssueCorrelation {
            correlacion_energetica: false,
            metrica_actual_co2: Some(co2),
            mensaje: "No se encontró correlación. El issue no está relacionado con el consumo.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(id: i64, co2: f64) -> Metric {
        Metric {
            id,
            test_run_id: 1,
            cpu_usage: co2 * 100.0 + 0.01,
            co2_emissions_kg: co2,
            execution_time_secs: Some(0.01),
        }
    }

    fn reading(co2: f64) -> CaptureReading {
        CaptureReading {
            emisiones_co2: co2,
            consumo_cpu: co2 * 100.0 + 0.01,
        }
    }

    #[test]
    fn clean_code_passes_with_simulated_reduction() {
        let rules = Rules::default();
        let report = measured_test_report(&rules, "total = sum(range(10))", reading(0.0001));
        assert!(report.pasaron);
        assert_eq!(report.reduccion_comparativa, "92.5%");
        assert_eq!(report.alerta_pico, None);
    }

    #[test]
    fn for_append_pattern_always_fails() {
        let rules = Rules::default();
        let code = "out = []\nfor i in range(10):\n    out.append(i)";
        let report = measured_test_report(&rules, code, reading(0.000001));
        assert!(!report.pasaron);
        assert_eq!(report.reduccion_comparativa, "0%");
        assert!(report.mensaje.ends_with("Impacto excesivo detectado: 0.000001 kg CO2."));
        assert_eq!(
            report.alerta_pico.as_deref(),
            Some("Se detectó un bucle ineficiente (for/append).")
        );
    }

    #[test]
    fn loop_without_append_is_not_flagged() {
        let rules = Rules::default();
        assert!(measured_test_report(&rules, "for i in range(3): pass", reading(0.1)).pasaron);
    }

    #[test]
    fn failed_report_zeroes_metrics() {
        let report = failed_test_report("ERROR DE SINTAXIS: invalid syntax");
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["pasaron"], false);
        assert_eq!(v["metricas"]["emisiones_co2"], 0.0);
        assert_eq!(v["reduccion_comparativa"], "0%");
        assert_eq!(v["alerta_pico"], "ERROR DE SINTAXIS: invalid syntax");
    }

    #[test]
    fn environmental_report_is_clamped() {
        let rules = Rules::default();
        assert_eq!(environmental_report(&rules, &[]), None);

        let report = environmental_report(&rules, &[metric(1, 0.000001)]).unwrap();
        assert!(report.reduccion_porcentaje >= 70.0);
        assert!((report.total_co2_tradicional_simulado - 0.00001).abs() < 1e-15);
        assert_eq!(report.total_analisis_realizados, 1);

        let report = environmental_report(&rules, &[metric(1, 0.0), metric(2, 0.0)]).unwrap();
        assert_eq!(report.reduccion_porcentaje, 70.0);
    }

    #[test]
    fn environmental_report_sums_all_metrics() {
        let rules = Rules::default();
        let report = environmental_report(&rules, &[metric(1, 0.001), metric(2, 0.003)]).unwrap();
        assert!((report.total_co2_generado - 0.004).abs() < 1e-12);
        assert!((report.reduccion_porcentaje - 90.0).abs() < 1e-9);
    }

    #[test]
    fn pre_deploy_threshold_is_inclusive() {
        let rules = Rules::default();
        assert!(pre_deploy_check(&rules, &metric(1, 0.0003)).pasa_revision);
        assert!(!pre_deploy_check(&rules, &metric(1, 0.00031)).pasa_revision);
        assert_eq!(pre_deploy_check(&rules, &metric(1, 0.0)).benchmark_co2, 0.0003);
    }

    #[test]
    fn issue_correlation_messages() {
        let rules = Rules::default();
        let none = correlate_issue(&rules, None);
        assert!(!none.correlacion_energetica);
        assert!(serde_json::to_value(&none).unwrap().get("metrica_actual_co2").is_none());

        let hot = correlate_issue(&rules, Some(&metric(4, 0.0005)));
        assert!(hot.correlacion_energetica);
        assert_eq!(hot.mensaje, "¡CORRELACIÓN ENCONTRADA! El issue se debe a un pico de 0.000500 kg CO2.");

        let cool = correlate_issue(&rules, Some(&metric(5, 0.0002)));
        assert!(!cool.correlacion_energetica);
        assert_eq!(cool.metrica_actual_co2, Some(0.0002));
    }
}
