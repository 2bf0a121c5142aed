//! Entity store: CRUD and join queries over the lifecycle tables.
//!
//! Every function runs on the caller's connection so that handlers can group
//! several calls inside one transaction. Primary-key misses surface as
//! `diesel::result::Error::NotFound`.

use crate::config::Rules;
use crate::db::models as dbm;
use crate::schema;
use diesel::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use log::{info, warn};

pub type DbPool = Pool<ConnectionManager<PgConnection>>;
pub type DbConn = PooledConnection<ConnectionManager<PgConnection>>;

/// Runs `work` in one transaction: commit on success, roll back and log the
/// failure under `context` otherwise.
pub fn in_transaction<T, E, F>(conn: &mut PgConnection, context: &str, work: F) -> Result<T, E>
where
    E: From<diesel::result::Error> + core::fmt::Display,
    F: FnOnce(&mut PgConnection) -> Result<T, E>,
{
    conn.transaction(work).inspect_err(|e| warn!("Rolled back: {}: {}", context, e))
}

// --- users / projects ---

pub fn get_user(conn: &mut PgConnection, id: i64) -> QueryResult<dbm::User> {
    use schema::users::dsl as U;
    U::users.find(id).select(dbm::User::as_select()).first(conn)
}

pub fn insert_user(conn: &mut PgConnection, row: &dbm::NewUser) -> QueryResult<dbm::User> {
    use schema::users::dsl as U;
    diesel::insert_into(U::users)
        .values(row)
        .returning(dbm::User::as_returning())
        .get_result(conn)
}

pub fn get_project(conn: &mut PgConnection, id: i64) -> QueryResult<dbm::Project> {
    use schema::projects::dsl as P;
    P::projects.find(id).select(dbm::Project::as_select()).first(conn)
}

pub fn insert_project(conn: &mut PgConnection, row: &dbm::NewProject) -> QueryResult<dbm::Project> {
    use schema::projects::dsl as P;
    diesel::insert_into(P::projects)
        .values(row)
        .returning(dbm::Project::as_returning())
        .get_result(conn)
}

/// Deletes a project; the schema cascades to every project-scoped row.
pub fn delete_project(conn: &mut PgConnection, id: i64) -> QueryResult<()> {
    use schema::projects::dsl as P;
    match diesel::delete(P::projects.find(id)).execute(conn)? {
        0 => Err(diesel::result::Error::NotFound),
        _ => Ok(()),
    }
}

// --- requirements ---

pub fn insert_requirement(conn: &mut PgConnection, row: &dbm::NewRequirement) -> QueryResult<dbm::Requirement> {
    use schema::requirements::dsl as R;
    diesel::insert_into(R::requirements)
        .values(row)
        .returning(dbm::Requirement::as_returning())
        .get_result(conn)
}

pub fn list_requirements(conn: &mut PgConnection, project_id: i64) -> QueryResult<Vec<dbm::Requirement>> {
    use schema::requirements::dsl as R;
    R::requirements
        .filter(R::project_id.eq(project_id))
        .order(R::id.asc())
        .select(dbm::Requirement::as_select())
        .load(conn)
}

pub fn get_requirement(conn: &mut PgConnection, id: i64) -> QueryResult<dbm::Requirement> {
    use schema::requirements::dsl as R;
    R::requirements
        .find(id)
        .select(dbm::Requirement::as_select())
        .first(conn)
}

/// Rewrites description and priority; the energy estimate always follows the
/// new description.
pub fn update_requirement(
    conn: &mut PgConnection,
    rules: &Rules,
    id: i64,
    description: &str,
    priority: Option<String>,
) -> QueryResult<dbm::Requirement> {
    use schema::requirements::dsl as R;
    diesel::update(R::requirements.find(id))
        .set((
            R::description.eq(description),
            R::priority.eq(priority),
            R::estimated_kwh.eq(rules.requirement_kwh(description)),
        ))
        .returning(dbm::Requirement::as_returning())
        .get_result(conn)
}

pub fn delete_requirement(conn: &mut PgConnection, id: i64) -> QueryResult<()> {
    use schema::requirements::dsl as R;
    match diesel::delete(R::requirements.find(id)).execute(conn)? {
        0 => Err(diesel::result::Error::NotFound),
        _ => Ok(()),
    }
}

// --- deployments ---

pub fn insert_deployment(conn: &mut PgConnection, row: &dbm::NewDeployment) -> QueryResult<dbm::Deployment> {
    use schema::deployments::dsl as D;
    diesel::insert_into(D::deployments)
        .values(row)
        .returning(dbm::Deployment::as_returning())
        .get_result(conn)
}

pub fn list_deployments(conn: &mut PgConnection, project_id: i64) -> QueryResult<Vec<dbm::Deployment>> {
    use schema::deployments::dsl as D;
    D::deployments
        .filter(D::project_id.eq(project_id))
        .order(D::id.asc())
        .select(dbm::Deployment::as_select())
        .load(conn)
}

// --- architecture / code ---

pub fn insert_architecture(conn: &mut PgConnection, row: &dbm::NewArchitecture) -> QueryResult<dbm::Architecture> {
    use schema::architectures::dsl as A;
    diesel::insert_into(A::architectures)
        .values(row)
        .returning(dbm::Architecture::as_returning())
        .get_result(conn)
}

pub fn get_architecture(conn: &mut PgConnection, id: i64) -> QueryResult<dbm::Architecture> {
    use schema::architectures::dsl as A;
    A::architectures
        .find(id)
        .select(dbm::Architecture::as_select())
        .first(conn)
}

pub fn insert_code(conn: &mut PgConnection, row: &dbm::NewCode) -> QueryResult<dbm::Code> {
    use schema::code_snippets::dsl as C;
    diesel::insert_into(C::code_snippets)
        .values(row)
        .returning(dbm::Code::as_returning())
        .get_result(conn)
}

pub fn get_code(conn: &mut PgConnection, id: i64) -> QueryResult<dbm::Code> {
    use schema::code_snippets::dsl as C;
    C::code_snippets.find(id).select(dbm::Code::as_select()).first(conn)
}

pub fn update_code_script(conn: &mut PgConnection, id: i64, script: &str) -> QueryResult<dbm::Code> {
    use schema::code_snippets::dsl as C;
    diesel::update(C::code_snippets.find(id))
        .set(C::script.eq(script))
        .returning(dbm::Code::as_returning())
        .get_result(conn)
}

// --- tests / metrics / reports ---

pub fn insert_test_run(conn: &mut PgConnection, row: &dbm::NewTestRun) -> QueryResult<dbm::TestRun> {
    use schema::test_runs::dsl as T;
    diesel::insert_into(T::test_runs)
        .values(row)
        .returning(dbm::TestRun::as_returning())
        .get_result(conn)
}

pub fn insert_metric(conn: &mut PgConnection, row: &dbm::NewMetric) -> QueryResult<dbm::Metric> {
    use schema::metrics::dsl as M;
    diesel::insert_into(M::metrics)
        .values(row)
        .returning(dbm::Metric::as_returning())
        .get_result(conn)
}

pub fn get_metric(conn: &mut PgConnection, id: i64) -> QueryResult<dbm::Metric> {
    use schema::metrics::dsl as M;
    M::metrics.find(id).select(dbm::Metric::as_select()).first(conn)
}

pub fn insert_report(conn: &mut PgConnection, row: &dbm::NewReport) -> QueryResult<dbm::Report> {
    use schema::reports::dsl as RP;
    diesel::insert_into(RP::reports)
        .values(row)
        .returning(dbm::Report::as_returning())
        .get_result(conn)
}

pub fn list_reports(conn: &mut PgConnection, metric_id: i64) -> QueryResult<Vec<dbm::Report>> {
    use schema::reports::dsl as RP;
    RP::reports
        .filter(RP::metric_id.eq(metric_id))
        .order(RP::id.asc())
        .select(dbm::Report::as_select())
        .load(conn)
}

// --- project metric history ---

/// All metrics reachable from a project through
/// Project -> Architecture -> Code -> TestRun -> Metric, oldest first.
pub fn metrics_for_project(conn: &mut PgConnection, project_id: i64) -> QueryResult<Vec<dbm::Metric>> {
    use schema::{architectures, code_snippets, metrics, projects, test_runs};

    metrics::table
        .inner_join(
            test_runs::table
                .inner_join(code_snippets::table.inner_join(architectures::table.inner_join(projects::table))),
        )
        .filter(projects::id.eq(project_id))
        .order(metrics::id.asc())
        .select(dbm::Metric::as_select())
        .load(conn)
}

/// Most recently created metric of a project, by descending id.
pub fn latest_metric_for_project(conn: &mut PgConnection, project_id: i64) -> QueryResult<Option<dbm::Metric>> {
    use schema::{architectures, code_snippets, metrics, projects, test_runs};

    metrics::table
        .inner_join(
            test_runs::table
                .inner_join(code_snippets::table.inner_join(architectures::table.inner_join(projects::table))),
        )
        .filter(projects::id.eq(project_id))
        .order(metrics::id.desc())
        .select(dbm::Metric::as_select())
        .first(conn)
        .optional()
}

// --- bootstrap ---

/// Creates the demo user and project when absent. Safe to run on every boot.
pub fn seed_demo(conn: &mut PgConnection, rules: &Rules) -> QueryResult<()> {
    use schema::projects::dsl as P;
    use schema::users::dsl as U;

    in_transaction(conn, "seeding demo data", |conn| {
        let users_added = diesel::insert_into(U::users)
            .values((
                U::id.eq(rules.demo_user_id),
                U::name.eq(&rules.demo_user_name),
                U::email.eq(&rules.demo_user_email),
            ))
            .on_conflict_do_nothing()
            .execute(conn)?;
        if users_added > 0 {
            info!(
                "Seed: user '{}' created with id {}",
                rules.demo_user_email, rules.demo_user_id
            );
        }

        let projects_added = diesel::insert_into(P::projects)
            .values((
                P::id.eq(rules.demo_project_id),
                P::user_id.eq(rules.demo_user_id),
                P::name.eq(&rules.demo_project_name),
                P::status.eq(Some(rules.demo_project_status.clone())),
            ))
            .on_conflict_do_nothing()
            .execute(conn)?;
        if projects_added > 0 {
            info!(
                "Seed: project '{}' created with id {}",
                rules.demo_project_name, rules.demo_project_id
            );
        }

        // Explicit ids do not advance the serial sequences.
        for table in ["users", "projects"] {
            diesel::sql_query(format!(
                "SELECT setval(pg_get_serial_sequence('{table}', 'id'), GREATEST((SELECT MAX(id) FROM {table}), 1))"
            ))
            .execute(conn)?;
        }
        Ok(())
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Shared setup for tests that run against a real PostgreSQL named by
    //! `TEST_DATABASE_URL`.

    use super::*;
    use crate::MIGRATIONS;
    use diesel_migrations::MigrationHarness;

    pub fn connect() -> PgConnection {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set for database tests");
        let mut conn = PgConnection::establish(&url).expect("connect to test database");
        conn.run_pending_migrations(MIGRATIONS).expect("apply migrations");
        conn
    }

    /// A fresh user and project with one architecture and one code row.
    pub fn project_with_code(conn: &mut PgConnection, tag: &str) -> (dbm::Project, dbm::Code) {
        let user = insert_user(
            conn,
            &dbm::NewUser {
                name: "Fixture".into(),
                email: format!("fixture-{}@example.com", tag),
            },
        )
        .unwrap();
        let project = insert_project(
            conn,
            &dbm::NewProject {
                user_id: user.id,
                name: format!("Fixture {}", tag),
                status: Some("Activo".into()),
            },
        )
        .unwrap();
        let arch = insert_architecture(
            conn,
            &dbm::NewArchitecture {
                project_id: project.id,
                components: "[\"div\"]".into(),
                projected_impact_kwh: 0.01,
            },
        )
        .unwrap();
        let code = insert_code(
            conn,
            &dbm::NewCode {
                architecture_id: arch.id,
                language: Some("HTML/CSS".into()),
                script: Some("x = 1".into()),
            },
        )
        .unwrap();
        (project, code)
    }

    /// One test run with one metric of `co2` kg under `code_id`.
    pub fn metric_for_code(conn: &mut PgConnection, code_id: i64, co2: f64) -> dbm::Metric {
        let run = insert_test_run(
            conn,
            &dbm::NewTestRun {
                code_id,
                test_kind: dbm::test_kinds::FUNCTIONAL.into(),
            },
        )
        .unwrap();
        insert_metric(
            conn,
            &dbm::NewMetric {
                test_run_id: run.id,
                cpu_usage: co2 * 100.0 + 0.01,
                co2_emissions_kg: co2,
                execution_time_secs: Some(0.1),
            },
        )
        .unwrap()
    }

    pub fn count_rows_for_code(conn: &mut PgConnection, code_id: i64) -> (i64, i64) {
        use schema::{metrics, test_runs};
        let runs = test_runs::table
            .filter(test_runs::code_id.eq(code_id))
            .count()
            .get_result(conn)
            .unwrap();
        let metrics = metrics::table
            .inner_join(test_runs::table)
            .filter(test_runs::code_id.eq(code_id))
            .count()
            .get_result(conn)
            .unwrap();
        (runs, metrics)
    }
}
