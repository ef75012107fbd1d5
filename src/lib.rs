#[macro_use]
extern crate rocket;

pub mod auth;
pub mod config;
pub mod cycles;
pub mod db;
pub mod error;
pub mod models;
pub mod request_logger;
pub mod routes;

use crate::auth::{AllowAllAuthorizer, AuthState, SharedWorkspaceAuthorizer};
use crate::config::ServiceConfig;
use crate::cycles::{PgCycleStatsReader, SharedCycleStatsReader};
use crate::db::CyclesDb;
use crate::request_logger::RequestLogger;
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket, Route};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use rocket_okapi::{
    openapi_get_routes,
    rapidoc::{GeneralConfig, HideShowConfig, RapiDocConfig, make_rapidoc},
    settings::UrlObject,
    swagger_ui::{SwaggerUIConfig, make_swagger_ui},
};
use std::sync::{Arc, Once};

static LOGGER: Once = Once::new();

pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

/// Routes served under `/api/v1`, including the generated `openapi.json`.
pub fn api_routes() -> Vec<Route> {
    openapi_get_routes![
        routes::health::health_check,
        routes::health::live_health,
        routes::health::ready_health,
        routes::cycles::list_workspace_cycles,
    ]
}

pub fn rocket() -> Rocket<Build> {
    init_logger();

    let config = ServiceConfig::from_env();
    let run_migrations = config.run_migrations;
    let auth_state = AuthState {
        principal_header: config.principal_header.clone(),
    };
    let authorizer: SharedWorkspaceAuthorizer = Arc::new(AllowAllAuthorizer);

    log::info!(
        "cycle stats api configured (default order: {}, principal header: {})",
        config.default_ordering,
        config.principal_header
    );

    // Read-only API; browsers only need GET.
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![Method::Get, Method::Options]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .allow_credentials(true)
        .to_cors()
        .expect("Error creating CORS");

    rocket::build()
        .attach(RequestLogger)
        .attach(CyclesDb::init())
        .attach(cors)
        .attach(AdHoc::try_on_ignite(
            "Run Migrations",
            move |rocket| async move {
                if !run_migrations {
                    log::info!("skipping database migrations (CYCLES_RUN_MIGRATIONS disabled)");
                    return Ok(rocket);
                }
                match CyclesDb::fetch(&rocket) {
                    Some(db) => match db::run_migrations(db).await {
                        Ok(()) => {
                            log::info!("database migrations successful");
                            Ok(rocket)
                        }
                        Err(e) => {
                            log::error!("database migrations failed: {}", e);
                            Err(rocket)
                        }
                    },
                    None => {
                        log::error!("database pool not available for migrations");
                        Err(rocket)
                    }
                }
            },
        ))
        // Share the pool with the stats reader and the readiness probe
        .attach(AdHoc::try_on_ignite(
            "Manage DB Pool and Cycle Reader",
            |rocket| async move {
                match CyclesDb::fetch(&rocket) {
                    Some(db) => {
                        let pool = (**db).clone();
                        let reader: SharedCycleStatsReader =
                            Arc::new(PgCycleStatsReader::new(pool.clone()));
                        Ok(rocket.manage(pool).manage(reader))
                    }
                    None => Err(rocket),
                }
            },
        ))
        .manage(config)
        .manage(auth_state)
        .manage(authorizer)
        .mount("/api/v1", api_routes())
        .mount(
            "/api/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../../v1/openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .mount(
            "/api/docs/rapidoc/",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("Cycle Stats API", "../../v1/openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use chrono::{DateTime, Utc};
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use rocket_db_pools::sqlx::{self, PgPool};
    use std::sync::Arc;
    use uuid::Uuid;

    use crate::auth::{AllowAllAuthorizer, AuthState, SharedWorkspaceAuthorizer};
    use crate::config::ServiceConfig;
    use crate::cycles::{PgCycleStatsReader, SharedCycleStatsReader};
    use crate::models::StateGroup;

    pub use database::{TestDatabase, TestDatabaseError};

    /// Issue columns a test cares about; everything else gets a default.
    #[derive(Debug, Clone, Default)]
    pub struct IssueSeed {
        pub state_id: Option<Uuid>,
        pub estimate_point: Option<i32>,
        pub is_draft: bool,
        pub archived: bool,
    }

    impl IssueSeed {
        /// Published, active issue in `state_id`.
        pub fn in_state(state_id: Uuid, estimate_point: Option<i32>) -> Self {
            Self {
                state_id: Some(state_id),
                estimate_point,
                ..Default::default()
            }
        }
    }

    /// Convenience helpers for seeding workspace, issue and cycle tables in tests.
    pub struct TestFixtures<'a> {
        pool: &'a PgPool,
    }

    impl<'a> TestFixtures<'a> {
        /// Create a fixture helper bound to the provided pool.
        pub fn new(pool: &'a PgPool) -> Self {
            Self { pool }
        }

        pub async fn insert_user(&self, email: &str, display_name: &str) -> Result<Uuid, sqlx::Error> {
            sqlx::query_scalar(
                "INSERT INTO users (id, email, display_name) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(Uuid::new_v4())
            .bind(email)
            .bind(display_name)
            .fetch_one(self.pool)
            .await
        }

        pub async fn insert_workspace(
            &self,
            slug: &str,
            name: &str,
            owner_id: Uuid,
        ) -> Result<Uuid, sqlx::Error> {
            sqlx::query_scalar(
                "INSERT INTO workspaces (id, slug, name, owner_id) VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(Uuid::new_v4())
            .bind(slug)
            .bind(name)
            .bind(owner_id)
            .fetch_one(self.pool)
            .await
        }

        pub async fn insert_project(
            &self,
            workspace_id: Uuid,
            name: &str,
            identifier: &str,
        ) -> Result<Uuid, sqlx::Error> {
            sqlx::query_scalar(
                "INSERT INTO projects (id, workspace_id, name, identifier) VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(Uuid::new_v4())
            .bind(workspace_id)
            .bind(name)
            .bind(identifier)
            .fetch_one(self.pool)
            .await
        }

        pub async fn insert_state(
            &self,
            project_id: Uuid,
            group: StateGroup,
        ) -> Result<Uuid, sqlx::Error> {
            sqlx::query_scalar(
                "INSERT INTO states (id, project_id, name, state_group) VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(Uuid::new_v4())
            .bind(project_id)
            .bind(group.to_string())
            .bind(group.as_str())
            .fetch_one(self.pool)
            .await
        }

        pub async fn insert_issue(
            &self,
            workspace_id: Uuid,
            project_id: Uuid,
            seed: IssueSeed,
        ) -> Result<Uuid, sqlx::Error> {
            let archived_at = seed.archived.then(Utc::now);
            sqlx::query_scalar(
                "INSERT INTO issues (id, workspace_id, project_id, state_id, name, estimate_point, is_draft, archived_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
            )
            .bind(Uuid::new_v4())
            .bind(workspace_id)
            .bind(project_id)
            .bind(seed.state_id)
            .bind("fixture issue")
            .bind(seed.estimate_point)
            .bind(seed.is_draft)
            .bind(archived_at)
            .fetch_one(self.pool)
            .await
        }

        pub async fn insert_cycle(
            &self,
            workspace_id: Uuid,
            project_id: Uuid,
            owner_id: Uuid,
            name: &str,
            created_at: DateTime<Utc>,
            archived: bool,
        ) -> Result<Uuid, sqlx::Error> {
            let archived_at = archived.then(Utc::now);
            sqlx::query_scalar(
                "INSERT INTO cycles (id, workspace_id, project_id, owned_by_id, name, created_at, updated_at, archived_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $6, $7) RETURNING id",
            )
            .bind(Uuid::new_v4())
            .bind(workspace_id)
            .bind(project_id)
            .bind(owner_id)
            .bind(name)
            .bind(created_at)
            .bind(archived_at)
            .fetch_one(self.pool)
            .await
        }

        pub async fn link_issue(&self, cycle_id: Uuid, issue_id: Uuid) -> Result<(), sqlx::Error> {
            sqlx::query("INSERT INTO cycle_issues (id, cycle_id, issue_id) VALUES ($1, $2, $3)")
                .bind(Uuid::new_v4())
                .bind(cycle_id)
                .bind(issue_id)
                .execute(self.pool)
                .await?;

            Ok(())
        }
    }

    pub mod database {
        use log::LevelFilter;
        use rocket_db_pools::sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use rocket_db_pools::sqlx::{self, ConnectOptions, PgPool};
        use testcontainers::ImageExt;
        use testcontainers_modules::postgres::Postgres;
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;
        use tokio::runtime::Handle;
        use uuid::Uuid;

        use crate::db::MIGRATOR;

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migration(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Ephemeral database factory for integration tests.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            admin_options: PgConnectOptions,
            database_name: String,
            container: Option<ContainerAsync<Postgres>>,
        }

        impl TestDatabase {
            /// Provision a fresh database on `TEST_DATABASE_URL` when set,
            /// otherwise inside a disposable Postgres container.
            pub async fn new_from_env() -> Result<Self, TestDatabaseError> {
                match std::env::var("TEST_DATABASE_URL") {
                    Ok(url) => Self::with_admin_url(&url, None).await,
                    Err(_) => Self::new().await,
                }
            }

            /// Provision a fresh database by launching a disposable Postgres container.
            pub async fn new() -> Result<Self, TestDatabaseError> {
                let container = Postgres::default().with_tag("16-alpine").start().await?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let admin_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

                Self::with_admin_url(&admin_url, Some(container)).await
            }

            async fn with_admin_url(
                admin_url: &str,
                container: Option<ContainerAsync<Postgres>>,
            ) -> Result<Self, TestDatabaseError> {
                let base_options: PgConnectOptions =
                    admin_url.parse().map_err(TestDatabaseError::Sqlx)?;
                let base_options = base_options.log_statements(LevelFilter::Off);

                let base_name = base_options
                    .get_database()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "postgres".to_string());

                let admin_options = base_options.clone().database("postgres");
                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(admin_options.clone())
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                let new_db_name = format!("{}_{}", base_name, Uuid::new_v4().simple());
                let create_sql = format!("CREATE DATABASE \"{}\" TEMPLATE template0", new_db_name);
                sqlx::query(&create_sql)
                    .execute(&admin_pool)
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;
                admin_pool.close().await;

                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect_with(base_options.clone().database(&new_db_name))
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                MIGRATOR.run(&pool).await?;

                Ok(Self {
                    pool: Some(pool),
                    admin_options,
                    database_name: new_db_name,
                    container,
                })
            }

            /// Cloneable connection pool for use in tests and Rocket state.
            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            /// Convenience method returning a clone of the pooled connection handle.
            pub fn pool_clone(&self) -> PgPool {
                self.pool().clone()
            }

            /// Close pool connections and drop the ephemeral database.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }

                drop_database_with_fallback(self.admin_options.clone(), &self.database_name)
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                if let Some(container) = self.container.take() {
                    drop(container);
                }

                Ok(())
            }
        }

        async fn drop_database_with_fallback(
            admin_options: PgConnectOptions,
            database_name: &str,
        ) -> Result<(), sqlx::Error> {
            let admin_pool = PgPoolOptions::new()
                .max_connections(1)
                .connect_with(admin_options)
                .await?;

            let drop_force = format!("DROP DATABASE \"{}\" WITH (FORCE)", database_name);
            match sqlx::query(&drop_force).execute(&admin_pool).await {
                Ok(_) => Ok(()),
                Err(err) if force_drop_unsupported(&err) => {
                    let drop_sql = format!("DROP DATABASE \"{}\"", database_name);
                    sqlx::query(&drop_sql).execute(&admin_pool).await?;
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }

        fn force_drop_unsupported(err: &sqlx::Error) -> bool {
            matches!(
                err,
                sqlx::Error::Database(db_err)
                    if db_err
                        .code()
                        .map(|code| code == "42601" || code == "0A000")
                        .unwrap_or(false)
            )
        }

        impl Drop for TestDatabase {
            fn drop(&mut self) {
                if let Some(pool) = self.pool.take() {
                    let admin_options = self.admin_options.clone();
                    let db_name = self.database_name.clone();
                    if let Ok(handle) = Handle::try_current() {
                        handle.spawn(async move {
                            pool.close().await;
                            let _ =
                                drop_database_with_fallback(admin_options.clone(), &db_name).await;
                        });
                    } else {
                        std::thread::spawn(move || {
                            if let Ok(rt) = tokio::runtime::Runtime::new() {
                                rt.block_on(async move {
                                    pool.close().await;
                                    let _ = drop_database_with_fallback(
                                        admin_options.clone(),
                                        &db_name,
                                    )
                                    .await;
                                });
                            }
                        });
                    }
                }

                if let Some(container) = self.container.take() {
                    drop(container);
                }
            }
        }
    }

    /// Builder for constructing Rocket instances tailored for integration tests.
    #[derive(Default)]
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        pg_pool: Option<PgPool>,
        reader: Option<SharedCycleStatsReader>,
        authorizer: Option<SharedWorkspaceAuthorizer>,
        config: Option<ServiceConfig>,
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging disabled.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                ..Default::default()
            }
        }

        /// Mount routes under `/api/v1`.
        pub fn mount_api_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push(("/api/v1".to_string(), routes));
            self
        }

        /// Manage a `PgPool`; unless a reader is supplied, the cycle listing
        /// reads from this pool too.
        pub fn manage_pg_pool(mut self, pool: PgPool) -> Self {
            self.pg_pool = Some(pool);
            self
        }

        /// Serve the cycle listing from `reader`.
        pub fn manage_reader(mut self, reader: SharedCycleStatsReader) -> Self {
            self.reader = Some(reader);
            self
        }

        /// Replace the allow-all authorizer.
        pub fn manage_authorizer(mut self, authorizer: SharedWorkspaceAuthorizer) -> Self {
            self.authorizer = Some(authorizer);
            self
        }

        pub fn manage_config(mut self, config: ServiceConfig) -> Self {
            self.config = Some(config);
            self
        }

        /// Finish building the Rocket instance.
        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment);

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            let reader = self.reader.or_else(|| {
                self.pg_pool.clone().map(|pool| {
                    Arc::new(PgCycleStatsReader::new(pool)) as SharedCycleStatsReader
                })
            });
            if let Some(reader) = reader {
                rocket = rocket.manage(reader);
            }

            if let Some(pool) = self.pg_pool {
                rocket = rocket.manage(pool);
            }

            let config = self.config.unwrap_or_default();
            let authorizer = self
                .authorizer
                .unwrap_or_else(|| Arc::new(AllowAllAuthorizer));

            rocket
                .manage(AuthState {
                    principal_header: config.principal_header.clone(),
                })
                .manage(config)
                .manage(authorizer)
        }

        /// Convenience helper to produce a blocking local client.
        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        /// Convenience helper to produce an asynchronous local client.
        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}
