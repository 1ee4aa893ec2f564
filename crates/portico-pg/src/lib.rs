//! Postgres backends for the Portico stores.
//!
//! Implements [`portico_auth::AuthStore`] and [`portico_audit::AuditStore`]
//! against a shared connection pool. Schema management lives here too:
//! [`connect`] runs the embedded migrations before handing the pool out.

use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::Arguments;

pub mod audit;
pub mod auth;

pub use audit::PgAuditStore;
pub use auth::PgAuthStore;

/// Open a pool against `database_url` and bring the schema up to date.
pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<sqlx::PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!(max_connections, "connected to postgres");
    Ok(pool)
}

pub(crate) fn args_add<T>(args: &mut PgArguments, v: T) -> anyhow::Result<()>
where
    T: Send + Sync + 'static,
    for<'q> T: sqlx::Encode<'q, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    args.add(v).map_err(|e| anyhow::anyhow!(e))
}
