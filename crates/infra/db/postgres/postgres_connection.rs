use anyhow::{Context, Result};
use diesel::{
    Connection, PgConnection,
    connection::CacheSize,
    r2d2::{ConnectionManager, CustomizeConnection, Error as R2d2Error, Pool},
};
use std::time::Duration;

/// Requests waiting on the pool give up after this long instead of queueing behind a stall.
const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(5);

/// Transaction-mode poolers (pgbouncer, Supavisor) reject named prepared statements.
#[derive(Debug)]
struct DisablePreparedStatements;

impl CustomizeConnection<PgConnection, R2d2Error> for DisablePreparedStatements {
    fn on_acquire(&self, conn: &mut PgConnection) -> std::result::Result<(), R2d2Error> {
        conn.set_prepared_statement_cache_size(CacheSize::Disabled);
        Ok(())
    }
}

pub type PgPoolSquad = Pool<ConnectionManager<PgConnection>>;

pub fn establish_connection(database_url: &str, max_connections: u32) -> Result<PgPoolSquad> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(max_connections.max(1))
        .connection_timeout(CHECKOUT_TIMEOUT)
        .connection_customizer(Box::new(DisablePreparedStatements))
        .build(manager)
        .context("failed to build the Postgres connection pool")?;
    Ok(pool)
}
