//! Database connection pool, migrations, and health check.
//!
//! The pool is shared by the store adapter and the pgmq notifier.

pub mod pgmq;
pub mod store;

use crate::error::Result;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

pub use self::pgmq::PgmqNotifier;
pub use self::store::PgStore;

/// Database handle. Owns the connection pool shared across all modules.
#[derive(Debug, Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Connect to Postgres and create a connection pool.
    ///
    /// With a `schema`, every new connection sets its `search_path` to it.
    pub async fn connect(url: &str, max_connections: u32, schema: Option<&str>) -> Result<Self> {
        let mut options = PgPoolOptions::new().max_connections(max_connections);

        if let Some(schema) = schema {
            let schema = schema.to_string();
            options = options.after_connect(move |conn, _meta| {
                let schema = schema.clone();
                Box::pin(async move {
                    sqlx::query("SELECT set_config('search_path', $1, false)")
                        .bind(&schema)
                        .execute(conn)
                        .await?;
                    Ok(())
                })
            });
        }

        let pool = options.connect(url).await?;
        info!(max_connections, "database connection established");
        Ok(Self { pool })
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Simple health check: run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Store adapter over this pool.
    pub fn store(&self) -> PgStore {
        PgStore::new(self.pool.clone())
    }

    /// Raw pool, for seeding and ad-hoc queries.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
