//! Database initialization and migration runner.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Connect to Postgres with at most `max_connections` pooled connections,
/// then apply pending migrations.
///
/// # Errors
///
/// Returns an error if the connection or a migration fails.
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    sqlx::migrate!("src/db/migrations").run(&pool).await?;

    Ok(pool)
}
