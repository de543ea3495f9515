use std::sync::Arc;

use log::{info, warn};
use tokio::sync::RwLock;

use crate::config::Config;
use crate::error::{DashboardError, Result};
use crate::export::{self, ExportTable};
use crate::reconciler::{self, ImportReport};
use crate::record::{NewSalesRecord, SalesRecord};
use crate::source::{self, SpreadsheetSource};
use crate::store::RecordStore;

/// Application context: the store, the configured spreadsheet source and the
/// outcome of the last reload. Built once at startup and shared behind `Arc`.
pub struct Dashboard {
    config: Config,
    store: RecordStore,
    source: Arc<dyn SpreadsheetSource>,
    last_import: RwLock<Option<ImportReport>>,
}

impl Dashboard {
    /// Connects the store and builds the source named by `config`.
    pub async fn new(config: Config) -> Result<Self> {
        let store = RecordStore::connect(&config.database_url).await?;
        let source = source::from_config(&config)?;
        info!(
            "Dashboard ready: database {}, source {}",
            config.database_url,
            source.describe()
        );
        Ok(Dashboard::with_parts(config, store, source))
    }

    pub fn with_parts(config: Config, store: RecordStore, source: Arc<dyn SpreadsheetSource>) -> Self {
        Dashboard {
            config,
            store,
            source,
            last_import: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    pub async fn records(&self) -> Result<Vec<SalesRecord>> {
        self.store.all().await
    }

    pub async fn last_import(&self) -> Option<ImportReport> {
        self.last_import.read().await.clone()
    }

    /// Re-imports the whole spreadsheet. On failure the store keeps its
    /// previous contents.
    pub async fn reload(&self) -> Result<ImportReport> {
        let report = reconciler::reload(&self.store, self.source.as_ref()).await?;
        *self.last_import.write().await = Some(report.clone());
        Ok(report)
    }

    /// Validates and inserts one record from raw form input.
    pub async fn add_record(&self, product: &str, quantity: &str, category: &str) -> Result<SalesRecord> {
        let record = NewSalesRecord::validated(product, quantity, category)?;
        let created = self.store.insert(&record).await?;
        info!(
            "Added sale {} ({} x {}, {})",
            created.id, created.product, created.quantity, created.category
        );
        self.sync_back().await;
        Ok(created)
    }

    /// Deletes by the key from the URL: a product name when legacy
    /// addressing is on, a record id otherwise.
    pub async fn delete(&self, key: &str) -> Result<SalesRecord> {
        if self.config.delete_by_product {
            return self.delete_by_product(key).await;
        }
        match key.trim().parse::<i64>() {
            Ok(id) => self.delete_by_id(id).await,
            Err(_) => Err(DashboardError::NotFound(format!("no sale with id {:?}", key))),
        }
    }

    pub async fn delete_by_id(&self, id: i64) -> Result<SalesRecord> {
        let removed = self.store.delete(id).await?;
        info!("Deleted sale {} ({})", removed.id, removed.product);
        self.sync_back().await;
        Ok(removed)
    }

    pub async fn delete_by_product(&self, product: &str) -> Result<SalesRecord> {
        let removed = self.store.delete_first_by_product(product).await?;
        info!("Deleted sale {} ({})", removed.id, removed.product);
        self.sync_back().await;
        Ok(removed)
    }

    pub async fn export(&self) -> Result<ExportTable> {
        export::export_table(&self.store).await
    }

    /// Fails when the store does not answer.
    pub async fn health(&self) -> Result<()> {
        self.store.ping().await
    }

    /// Mirrors the store into the source after a mutation. The mutation has
    /// already committed, so failures are only logged.
    async fn sync_back(&self) {
        if !self.config.write_back {
            return;
        }
        let outcome = match self.export().await {
            Ok(table) => self.source.write_back(&table).await,
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            warn!("Write-back to {} failed: {}", self.source.describe(), e);
        }
    }
}
