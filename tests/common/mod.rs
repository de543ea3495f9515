#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use salesboard::config::Config;
use salesboard::dashboard::Dashboard;
use salesboard::error::{DashboardError, Result};
use salesboard::export::ExportTable;
use salesboard::record::{RawTable, RawValue};
use salesboard::source::SpreadsheetSource;
use salesboard::store::RecordStore;

/// In-memory spreadsheet that records every write-back it receives.
pub struct StubSource {
    table: Mutex<Option<RawTable>>,
    fail_writes: bool,
    pub writes: Mutex<Vec<ExportTable>>,
}

impl StubSource {
    pub fn with_table(table: RawTable) -> Self {
        StubSource {
            table: Mutex::new(Some(table)),
            fail_writes: false,
            writes: Mutex::new(Vec::new()),
        }
    }

    /// A source whose every fetch fails with `SourceUnavailable`.
    pub fn offline() -> Self {
        StubSource {
            table: Mutex::new(None),
            fail_writes: false,
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn set_table(&self, table: RawTable) {
        *self.table.lock().unwrap() = Some(table);
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub fn last_write(&self) -> Option<ExportTable> {
        self.writes.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl SpreadsheetSource for StubSource {
    fn describe(&self) -> String {
        "stub spreadsheet".to_string()
    }

    async fn fetch(&self) -> Result<RawTable> {
        self.table
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| DashboardError::SourceUnavailable("stub is offline".to_string()))
    }

    async fn write_back(&self, table: &ExportTable) -> Result<()> {
        self.writes.lock().unwrap().push(table.clone());
        if self.fail_writes {
            return Err(DashboardError::SourceUnavailable("stub rejects writes".to_string()));
        }
        Ok(())
    }
}

pub fn text(s: &str) -> RawValue {
    RawValue::Text(s.to_string())
}

pub fn num(n: f64) -> RawValue {
    RawValue::Number(n)
}

pub fn header() -> Vec<String> {
    vec!["Produto".into(), "Quantidade".into(), "Categoria".into()]
}

/// A table with the required header and the given `(product, quantity, category)` rows.
pub fn sales_table(rows: &[(&str, f64, &str)]) -> RawTable {
    RawTable::from_grid(
        header(),
        rows.iter()
            .map(|(p, q, c)| vec![text(p), num(*q), text(c)])
            .collect::<Vec<_>>(),
    )
}

pub async fn dashboard_with(source: Arc<StubSource>, write_back: bool, delete_by_product: bool) -> Dashboard {
    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        write_back,
        delete_by_product,
        ..Config::default()
    };
    let store = RecordStore::in_memory().await.unwrap();
    Dashboard::with_parts(config, store, source)
}

/// `(product, quantity, category)` of every stored record, in id order.
pub async fn fields(dashboard: &Dashboard) -> Vec<(String, i64, String)> {
    dashboard
        .records()
        .await
        .unwrap()
        .into_iter()
        .map(|r| (r.product, r.quantity, r.category))
        .collect()
}

/// Serves `router` on an ephemeral local port and returns its base URL.
#[cfg(feature = "web")]
pub async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
