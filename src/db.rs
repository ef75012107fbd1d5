use rocket_db_pools::sqlx::migrate::{MigrateError, Migrator};
use rocket_db_pools::sqlx::{self, PgPool};
use rocket_db_pools::Database;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Database)]
#[database("cycles_db")]
pub struct CyclesDb(sqlx::PgPool);

/// Apply pending embedded migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}
