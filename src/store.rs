use std::str::FromStr;

use log::debug;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tokio::sync::RwLock;

use crate::error::{DashboardError, Result};
use crate::record::{NewSalesRecord, SalesRecord};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS venda (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        produto TEXT NOT NULL CHECK (length(produto) <= 100),
        quantidade INTEGER NOT NULL CHECK (quantidade BETWEEN 0 AND 2147483647),
        categoria TEXT NOT NULL CHECK (length(categoria) <= 50)
    );
"#;

/// The relational table of sales records.
///
/// Writes go through `gate`: single-record mutations hold the shared side, a
/// full replace holds the exclusive side, so two imports never interleave and
/// no mutation lands between an import's delete and its inserts.
pub struct RecordStore {
    pool: SqlitePool,
    gate: RwLock<()>,
}

impl RecordStore {
    /// Opens (creating if needed) the database at `url` and ensures the schema.
    pub async fn connect(url: &str) -> Result<Self> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let mut options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // Every connection to an in-memory database is a separate database,
        // so the pool must hold exactly one connection for its whole life.
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            options = options.journal_mode(SqliteJournalMode::Wal);
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let store = RecordStore::from_pool(pool);
        store.init_schema().await?;
        Ok(store)
    }

    /// Convenience for tests and one-shot tools.
    pub async fn in_memory() -> Result<Self> {
        RecordStore::connect("sqlite::memory:").await
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        RecordStore {
            pool,
            gate: RwLock::new(()),
        }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    /// All records ordered by id.
    pub async fn all(&self) -> Result<Vec<SalesRecord>> {
        let records = sqlx::query_as::<_, SalesRecord>(
            "SELECT id, produto, quantidade, categoria FROM venda ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM venda")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn insert(&self, record: &NewSalesRecord) -> Result<SalesRecord> {
        let _shared = self.gate.read().await;
        let id = sqlx::query("INSERT INTO venda (produto, quantidade, categoria) VALUES (?, ?, ?)")
            .bind(&record.product)
            .bind(record.quantity)
            .bind(&record.category)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        Ok(SalesRecord {
            id,
            product: record.product.clone(),
            quantity: record.quantity,
            category: record.category.clone(),
        })
    }

    /// Removes the record with `id`, returning what was removed.
    pub async fn delete(&self, id: i64) -> Result<SalesRecord> {
        let _shared = self.gate.read().await;
        let mut tx = self.pool.begin().await?;

        let record = sqlx::query_as::<_, SalesRecord>(
            "SELECT id, produto, quantidade, categoria FROM venda WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DashboardError::NotFound(format!("no sale with id {}", id)))?;

        sqlx::query("DELETE FROM venda WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(record)
    }

    /// Removes the first record (lowest id) whose product equals `product`.
    pub async fn delete_first_by_product(&self, product: &str) -> Result<SalesRecord> {
        let _shared = self.gate.read().await;
        let mut tx = self.pool.begin().await?;

        let record = sqlx::query_as::<_, SalesRecord>(
            "SELECT id, produto, quantidade, categoria FROM venda WHERE produto = ? ORDER BY id LIMIT 1",
        )
        .bind(product)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DashboardError::NotFound(format!("no sale for product {:?}", product)))?;

        sqlx::query("DELETE FROM venda WHERE id = ?")
            .bind(record.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(record)
    }

    /// Replaces the whole table with `records` in one transaction.
    ///
    /// Either every row is swapped or, on any failure, the transaction rolls
    /// back on drop and the previous contents stay in place.
    pub async fn replace_all(&self, records: &[NewSalesRecord]) -> Result<u64> {
        let _exclusive = self.gate.write().await;
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM venda")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let mut inserted = 0;
        for record in records {
            inserted += sqlx::query(
                "INSERT INTO venda (produto, quantidade, categoria) VALUES (?, ?, ?)",
            )
            .bind(&record.product)
            .bind(record.quantity)
            .bind(&record.category)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        debug!("Replaced venda: {} deleted, {} inserted", deleted, inserted);

        Ok(inserted)
    }

    /// Round-trips a trivial query to prove the database answers.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(product: &str, quantity: i64, category: &str) -> NewSalesRecord {
        NewSalesRecord {
            product: product.to_string(),
            quantity,
            category: category.to_string(),
        }
    }

    #[tokio::test]
    async fn insert_then_list_in_id_order() {
        let store = RecordStore::in_memory().await.unwrap();
        let a = store.insert(&sale("Teclado", 4, "Periféricos")).await.unwrap();
        let b = store.insert(&sale("Monitor", 2, "Monitores")).await.unwrap();
        assert!(a.id < b.id);

        let all = store.all().await.unwrap();
        assert_eq!(all, vec![a, b]);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn delete_missing_id_is_not_found() {
        let store = RecordStore::in_memory().await.unwrap();
        store.insert(&sale("Teclado", 4, "Periféricos")).await.unwrap();

        let err = store.delete(999).await.unwrap_err();
        assert!(matches!(err, DashboardError::NotFound(_)));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_by_product_takes_lowest_id() {
        let store = RecordStore::in_memory().await.unwrap();
        let first = store.insert(&sale("Mouse", 10, "Periféricos")).await.unwrap();
        let second = store.insert(&sale("Mouse", 5, "Periféricos")).await.unwrap();

        let removed = store.delete_first_by_product("Mouse").await.unwrap();
        assert_eq!(removed, first);
        assert_eq!(store.all().await.unwrap(), vec![second]);
    }

    #[tokio::test]
    async fn replace_all_swaps_contents_and_ids_keep_growing() {
        let store = RecordStore::in_memory().await.unwrap();
        let old = store.insert(&sale("Velho", 1, "Antigos")).await.unwrap();

        let inserted = store
            .replace_all(&[sale("Mouse", 10, "Periféricos"), sale("Cabo", 0, "Acessórios")])
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let all = store.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|r| r.id > old.id));
        assert_eq!(all[0].product, "Mouse");
        assert_eq!(all[1].quantity, 0);
    }

    #[tokio::test]
    async fn failed_replace_keeps_previous_rows() {
        let store = RecordStore::in_memory().await.unwrap();
        store.insert(&sale("Teclado", 4, "Periféricos")).await.unwrap();

        // Violates the quantidade >= 0 check on the second insert.
        let err = store
            .replace_all(&[sale("Mouse", 1, "Periféricos"), sale("Cabo", -1, "Acessórios")])
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::Persistence(_)));

        let all = store.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].product, "Teclado");
    }

    #[tokio::test]
    async fn quantity_above_cap_is_rejected_by_the_table() {
        let store = RecordStore::in_memory().await.unwrap();
        let err = store
            .insert(&sale("Mouse", crate::record::QUANTITY_MAX + 1, "Periféricos"))
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::Persistence(_)));
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
