pub mod api {
    pub mod architecture;
    pub mod code;
    pub mod dashboard;
    pub mod deployment;
    pub mod error;
    pub mod projects;
    pub mod requirements;
    pub mod routes;
    pub mod state;
    pub mod testing;
}

pub mod client;
pub mod config;
pub mod db {
    pub mod models;
    pub mod store;
}
pub mod env_file;
pub mod schema;
pub mod utils;
pub mod services {
    pub mod assessment;
    pub mod capture;
    pub mod energy;
    pub mod impact;
    pub mod sandbox;
}

use crate::api::state::AppState;
use crate::client::OllamaClient;
use crate::config::{Config, Rules};
use crate::db::store::{self, DbPool};
use crate::services::capture::MetricCapture;
use crate::services::energy::CpuEnergyEstimator;
use crate::services::sandbox::ProcessSandbox;
use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use log::{error, info};
use std::sync::Arc;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

fn apply_database_migrations(conn: &mut PgConnection) -> Result<(), String> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| format!("Applying database migrations failed: {}", e))?;
    if applied.is_empty() {
        info!("Database schema is up to date; no migrations were applied");
    } else {
        let names = applied.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
        info!("Applied {} database migration(s): {}", applied.len(), names);
    }
    Ok(())
}

fn build_pool(cfg: &Config) -> Result<DbPool, String> {
    Pool::builder()
        .max_size(cfg.db_pool_size.get())
        .build(ConnectionManager::<PgConnection>::new(&cfg.database_url))
        .map_err(|e| format!("DB connection failed: {}", e))
}

pub fn run() -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    let rules = Arc::new(Rules::default());
    info!(
        "Config loaded (bind={}, pool_size={}, ollama={}, ollama_timeout={}s, interpreter={}, cpu_tdp={}W, carbon_intensity={} kg/kWh)",
        cfg.bind_addr,
        cfg.db_pool_size,
        cfg.ollama_url,
        cfg.ollama_timeout.as_secs(),
        cfg.sandbox_interpreter,
        cfg.cpu_tdp_watts,
        cfg.carbon_intensity
    );

    // 2) Connect DB
    let pool = build_pool(&cfg)?;
    let mut conn = pool.get().map_err(|e| format!("DB connection failed: {}", e))?;
    info!("Connected to database");

    // 3) Schema and demo rows
    apply_database_migrations(&mut conn)?;
    store::seed_demo(&mut conn, &rules).map_err(|e| format!("Seeding demo data failed: {}", e))?;
    drop(conn);

    // 4) Collaborators
    let capture = MetricCapture::new(
        Arc::new(ProcessSandbox::new(cfg.sandbox_interpreter.clone())),
        Arc::new(CpuEnergyEstimator::from_config(&cfg)),
        rules.clone(),
    );
    let state = AppState {
        pool,
        rules,
        capture,
        assistant: Arc::new(OllamaClient::from_config(&cfg)),
    };

    // 5) Serve
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to start runtime: {}", e))?;
    runtime.block_on(serve(cfg, state))
}

async fn serve(cfg: Config, state: AppState) -> Result<(), String> {
    let listener = tokio::net::TcpListener::bind(cfg.bind_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {}", cfg.bind_addr, e))?;
    info!("Listening on http://{}", cfg.bind_addr);

    axum::serve(listener, api::routes::router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown requested");
        })
        .await
        .map_err(|e| format!("server error: {}", e))
}

fn main() {
    let loaded_env = match env_file::load_from_cli() {
        Ok(info) => info,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "CLI-specified" } else { "default" };
        info!("Environment loaded from {} .env file: {}", origin, info.path.display());
    }

    info!(
        "ecodev-backend {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run() {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
