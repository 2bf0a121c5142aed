use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

use crate::api::state::AppState;
use crate::api::{architecture, code, dashboard, deployment, projects, requirements, testing};

pub fn router(state: AppState) -> Router {
    Router::new()
        // requirements
        .route("/api/requisitos", post(requirements::create))
        .route(
            "/api/requisitos/{id}",
            get(requirements::list_for_project)
                .put(requirements::update)
                .delete(requirements::delete),
        )
        .route("/api/requisitos/reporte/{proyecto_id}", get(requirements::summary))
        // design
        .route("/api/componentes/sugerir", get(architecture::suggest_components))
        .route("/api/arquitectura/calcular_impacto", post(architecture::calculate_impact))
        // code
        .route("/api/codigo/generar", post(code::generate))
        .route("/api/codigo/analizar", post(code::analyze))
        .route("/api/codigo/optimizar", post(code::optimize))
        .route("/api/codigo/sugerir", post(code::suggest))
        // testing and reporting
        .route("/api/pruebas/ejecutar", post(testing::run_tests))
        .route("/api/metricas/{proyecto_id}", get(dashboard::project_metrics))
        .route("/api/reportes/generar", get(dashboard::generate_report))
        .route("/api/reportes/{metrica_id}", get(dashboard::reports_for_metric))
        // deployment
        .route("/api/despliegue/pre-check", get(deployment::pre_check))
        .route("/api/despliegue/simular-issue", get(deployment::simulate_issue))
        .route("/api/despliegues", post(deployment::create))
        .route("/api/despliegues/{proyecto_id}", get(deployment::list_for_project))
        // projects
        .route("/api/proyectos", post(projects::create))
        .route("/api/proyectos/{id}", get(projects::get).delete(projects::delete))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{AssistProfile, Assistant};
    use crate::config::Rules;
    use crate::services::capture::fakes::capture_with;
    use crate::services::sandbox::ExecutionError;
    use axum_test::TestServer;
    use diesel::PgConnection;
    use diesel::r2d2::{ConnectionManager, Pool};
    use http::StatusCode;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::time::Duration;

    struct FakeAssistant(&'static str);

    impl Assistant for FakeAssistant {
        fn complete(&self, _prompt: &str, _profile: AssistProfile) -> String {
            self.0.to_string()
        }
    }

    /// State whose pool never connects; only paths that stop before the
    /// database are exercised here.
    fn state_with(outcome: Result<(), ExecutionError>, answer: &'static str) -> AppState {
        let pool = Pool::builder()
            .max_size(1)
            .min_idle(Some(0))
            .connection_timeout(Duration::from_millis(200))
            .build_unchecked(ConnectionManager::<PgConnection>::new("postgres://invalid@127.0.0.1:1/none"));
        let (capture, _) = capture_with(outcome, Some(0.0001));
        AppState {
            pool,
            rules: Arc::new(Rules::default()),
            capture,
            assistant: Arc::new(FakeAssistant(answer)),
        }
    }

    fn server(state: AppState) -> TestServer {
        TestServer::new(router(state)).unwrap()
    }

    fn default_server() -> TestServer {
        server(state_with(Ok(()), "- a"))
    }

    #[tokio::test]
    async fn requirement_without_description_is_rejected() {
        let response = default_server()
            .post("/api/requisitos")
            .json(&json!({ "prioridad": "Alta" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"], "El campo \"Descripción\" es requerido.");
    }

    #[tokio::test]
    async fn empty_description_is_rejected_too() {
        let response = default_server()
            .post("/api/requisitos")
            .json(&json!({ "descripcion": "" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_json_names_the_field() {
        let response = default_server()
            .post("/api/requisitos")
            .json(&json!({ "descripcion": 5 }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        let msg = body["error"].as_str().unwrap();
        assert!(msg.contains("descripcion"), "{}", msg);
    }

    #[tokio::test]
    async fn unparseable_body_is_a_bad_request() {
        let response = default_server().post("/api/codigo/analizar").text("{not json").await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn code_endpoints_require_a_code_id() {
        let s = default_server();
        for path in ["/api/codigo/analizar", "/api/codigo/optimizar", "/api/pruebas/ejecutar"] {
            let response = s.post(path).json(&json!({ "codigo": "print(1)" })).await;
            response.assert_status(StatusCode::BAD_REQUEST);
            let body: Value = response.json();
            assert_eq!(body["error"], "codigo_id es requerido", "{}", path);
        }
        let response = s.post("/api/codigo/analizar").json(&json!({ "codigo_id": 0 })).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn generate_requires_an_architecture() {
        let response = default_server()
            .post("/api/codigo/generar")
            .json(&json!({ "script": "<div></div>" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"], "arquitectura_id es requerido");
    }

    #[tokio::test]
    async fn project_needs_a_name() {
        let response = default_server().post("/api/proyectos").json(&json!({})).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn analyze_reports_runtime_failures() {
        let s = server(state_with(Err(ExecutionError::Runtime("ZeroDivisionError: division by zero".into())), ""));
        let response = s
            .post("/api/codigo/analizar")
            .json(&json!({ "codigo": "1/0", "codigo_id": 1 }))
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(
            body["error"],
            "Error en el código al ejecutarlo: ZeroDivisionError: division by zero"
        );
    }

    #[tokio::test]
    async fn failed_test_run_still_returns_a_report() {
        let s = server(state_with(Err(ExecutionError::Syntax("invalid syntax".into())), ""));
        let response = s
            .post("/api/pruebas/ejecutar")
            .json(&json!({ "codigo": "def (", "codigo_id": 1 }))
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body["pasaron"], false);
        assert_eq!(body["mensaje"], "¡FALLO DE COMPILACIÓN! Las pruebas no se pudieron ejecutar.");
        assert_eq!(body["alerta_pico"], "ERROR DE SINTAXIS: invalid syntax");
        assert_eq!(body["metricas"]["emisiones_co2"], 0.0);
        assert_eq!(body["reduccion_comparativa"], "0%");
    }

    #[tokio::test]
    async fn assistant_error_stops_optimization() {
        let s = server(state_with(Ok(()), "# ERROR: No se pudo conectar a Ollama."));
        let response = s
            .post("/api/codigo/optimizar")
            .json(&json!({ "codigo": "x = 1", "codigo_id": 3 }))
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body["error"], "# ERROR: No se pudo conectar a Ollama.");
    }

    #[tokio::test]
    async fn suggestions_are_split_into_items() {
        let s = server(state_with(Ok(()), "- Usa generadores\n\n- Evita copias\n"));
        let response = s.post("/api/codigo/sugerir").json(&json!({ "codigo": "x" })).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(
            body,
            json!({ "sugerencias": [{ "sugerencia": "Usa generadores" }, { "sugerencia": "Evita copias" }] })
        );
    }

    #[tokio::test]
    async fn component_catalog_is_static() {
        let response = default_server().get("/api/componentes/sugerir").await;
        response.assert_status_ok();
        let body: Value = response.json();
        let items = body.as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["tipo"], "eco-image-loader");
    }

    #[tokio::test]
    async fn unreachable_database_is_an_internal_error() {
        let response = default_server().get("/api/proyectos/1").await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    }
}
