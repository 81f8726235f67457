use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create the Postgres connection pool the whole service shares.
///
/// Allocation queries hold row locks briefly, so the acquire timeout is kept
/// short to surface a saturated pool instead of queueing indefinitely.
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;
    Ok(pool)
}
