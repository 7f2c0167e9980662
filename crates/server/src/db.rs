use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use runq_core::config::PostgresConfig;
use runq_queue::PgQueue;

/// Create a PostgreSQL connection pool and run migrations.
pub async fn init_pg_pool(config: &PostgresConfig) -> anyhow::Result<PgPool> {
    if !config.is_configured() {
        anyhow::bail!("QUEUE_BACKEND=postgres but PG_USERNAME is not set");
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url())
        .await?;
    info!(host = %config.host, database = %config.database, "PostgreSQL connected");

    PgQueue::run_migrations(&pool).await?;
    Ok(pool)
}
