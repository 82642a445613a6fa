//! Postgres implementation of the store capabilities.

use async_trait::async_trait;
use sqlx::{PgPool, QueryBuilder};

use crate::error::Result;
use crate::model::{Dealer, LinkRecord, Product, StagingMarker};
use crate::ports::{DealerLookup, IntegrationCommit, LinkStore, ProductLookup, StagingQuery};

/// Rows per INSERT statement; keeps bind parameters well under the protocol limit.
const INSERT_CHUNK: usize = 100;

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DealerLookup for PgStore {
    async fn resolve_dealer(&self, external_key: &str) -> Result<Option<Dealer>> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, external_key FROM dealers WHERE external_key = $1")
                .bind(external_key)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.map(|(id, external_key)| Dealer { id, external_key }))
    }
}

#[async_trait]
impl ProductLookup for PgStore {
    async fn find_products(&self, external_key: &str) -> Result<Vec<Product>> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT DISTINCT p.id, b.barcode
             FROM products p
             JOIN product_barcodes b ON b.product_id = p.id
             WHERE b.barcode = $1
             ORDER BY p.id",
        )
        .bind(external_key)
        .fetch_all(self.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, external_key)| Product { id, external_key })
            .collect())
    }
}

#[async_trait]
impl LinkStore for PgStore {
    async fn link_exists(&self, product_id: i64, dealer_id: i64) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM product_dealers WHERE product_id = $1 AND dealer_id = $2)",
        )
        .bind(product_id)
        .bind(dealer_id)
        .fetch_one(self.pool())
        .await?;
        Ok(exists)
    }

    /// All chunks go through one transaction, so a failure writes nothing.
    async fn create_links(&self, records: &[LinkRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool().begin().await?;
        for chunk in records.chunks(INSERT_CHUNK) {
            let mut qb = QueryBuilder::<sqlx::Postgres>::new("INSERT INTO product_dealers (product_id, dealer_id, active) ");
            qb.push_values(chunk, |mut row, record| {
                row.push_bind(record.product_id)
                    .push_bind(record.dealer_id)
                    .push_bind(record.active);
            });
            qb.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl IntegrationCommit for PgStore {
    async fn commit(&self, dealer_id: i64, product_id: i64) -> Result<()> {
        sqlx::query("SELECT record_product_integration($1, $2)")
            .bind(dealer_id)
            .bind(product_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StagingQuery for PgStore {
    async fn find_staging(&self, product_id: i64, dealer_id: i64) -> Result<Option<StagingMarker>> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            "SELECT product_id, dealer_id FROM product_integration_staging
             WHERE product_id = $1 AND dealer_id = $2
             LIMIT 1",
        )
        .bind(product_id)
        .bind(dealer_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|(product_id, dealer_id)| StagingMarker {
            product_id,
            dealer_id,
        }))
    }
}
