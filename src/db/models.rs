//! Diesel model structs for the lifecycle entities.
//!
//! Ownership runs Project -> Architecture -> Code -> TestRun -> Metric -> Report,
//! with Requirement and Deployment hanging directly off Project. Cascading
//! deletes are declared in the migrations, not here.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema;

// Labels stored in `test_runs.test_kind`.
pub mod test_kinds {
    pub const EFFICIENCY_ANALYSIS: &str = "Análisis de Eficiencia";
    pub const AI_OPTIMIZATION: &str = "Optimización IA";
    pub const FUNCTIONAL: &str = "Prueba Funcional/Eficiencia";
}

pub mod deployment_status {
    pub const APPROVED: &str = "Aprobado";
    pub const BLOCKED: &str = "Bloqueado";
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::users)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::users)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::projects)]
#[diesel(belongs_to(User))]
pub struct Project {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::projects)]
pub struct NewProject {
    pub user_id: i64,
    pub name: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::requirements)]
#[diesel(belongs_to(Project))]
pub struct Requirement {
    pub id: i64,
    pub project_id: i64,
    pub description: String,
    pub priority: Option<String>,
    pub estimated_kwh: f64,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::requirements)]
pub struct NewRequirement {
    pub project_id: i64,
    pub description: String,
    pub priority: Option<String>,
    pub estimated_kwh: f64,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::deployments)]
#[diesel(belongs_to(Project))]
pub struct Deployment {
    pub id: i64,
    pub project_id: i64,
    pub created_at: DateTime<Utc>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::deployments)]
pub struct NewDeployment {
    pub project_id: i64,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::architectures)]
#[diesel(belongs_to(Project))]
pub struct Architecture {
    pub id: i64,
    pub project_id: i64,
    /// JSON array of component-type tags.
    pub components: String,
    pub projected_impact_kwh: f64,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::architectures)]
pub struct NewArchitecture {
    pub project_id: i64,
    pub components: String,
    pub projected_impact_kwh: f64,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::code_snippets)]
#[diesel(belongs_to(Architecture))]
pub struct Code {
    pub id: i64,
    pub architecture_id: i64,
    pub language: Option<String>,
    pub script: Option<String>,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::code_snippets)]
pub struct NewCode {
    pub architecture_id: i64,
    pub language: Option<String>,
    pub script: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::test_runs)]
#[diesel(belongs_to(Code))]
pub struct TestRun {
    pub id: i64,
    pub code_id: i64,
    pub test_kind: String,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::test_runs)]
pub struct NewTestRun {
    pub code_id: i64,
    pub test_kind: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::metrics)]
#[diesel(belongs_to(TestRun))]
pub struct Metric {
    pub id: i64,
    pub test_run_id: i64,
    pub cpu_usage: f64,
    pub co2_emissions_kg: f64,
    pub execution_time_secs: Option<f64>,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::metrics)]
pub struct NewMetric {
    pub test_run_id: i64,
    pub cpu_usage: f64,
    pub co2_emissions_kg: f64,
    pub execution_time_secs: Option<f64>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::reports)]
#[diesel(belongs_to(Metric))]
pub struct Report {
    pub id: i64,
    pub metric_id: i64,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::reports)]
pub struct NewReport {
    pub metric_id: i64,
    pub name: Option<String>,
    pub content: Option<String>,
}
