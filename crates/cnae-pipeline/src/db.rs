//! PostgreSQL connection helpers

use crate::config::DatabaseConfig;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::{debug, info};

fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.name)
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.connect_timeout())
}

/// Open a connection pool for the gold database
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    info!(
        "Connecting to PostgreSQL at {}:{}/{}",
        config.host, config.port, config.name
    );
    pool_options(config)
        .connect_with(connect_options(config))
        .await
}

/// Pool that opens its first connection on first use
///
/// Lets object-storage-only stages run without a reachable database.
pub fn connect_lazy(config: &DatabaseConfig) -> PgPool {
    debug!(
        "PostgreSQL pool for {}:{}/{} will connect on first use",
        config.host, config.port, config.name
    );
    pool_options(config).connect_lazy_with(connect_options(config))
}

/// Round-trip a trivial query
pub async fn check_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await?;
    info!("Connection to PostgreSQL successful");
    Ok(())
}

/// Double-quote an identifier, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("dim_cnaes"), "\"dim_cnaes\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
