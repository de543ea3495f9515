//! Spreadsheet backends.
//!
//! Every backend reads the same shape (`RawTable`) and accepts the same
//! write-back payload (`ExportTable`), so the rest of the dashboard never
//! knows where the spreadsheet lives.

pub mod auth;
pub mod decode;
pub mod local;
pub mod sheets;
pub mod storage;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::config::Config;
use crate::config::SourceConfig;
use crate::error::{DashboardError, Result};
use crate::export::ExportTable;
use crate::record::RawTable;

pub use decode::FileFormat;
pub use local::LocalFileSource;
pub use sheets::SheetsApiSource;
pub use storage::ObjectStorageSource;

#[async_trait]
pub trait SpreadsheetSource: Send + Sync {
    /// Human-readable location, used in logs and on the dashboard.
    fn describe(&self) -> String;

    /// Reads the spreadsheet. Must not modify it.
    async fn fetch(&self) -> Result<RawTable>;

    /// Overwrites the spreadsheet with `table`.
    async fn write_back(&self, table: &ExportTable) -> Result<()>;
}

/// Builds the backend selected by the configuration.
pub fn from_config(config: &Config) -> Result<Arc<dyn SpreadsheetSource>> {
    let source: Arc<dyn SpreadsheetSource> = match &config.source {
        SourceConfig::LocalFile { path } => Arc::new(LocalFileSource::new(path.clone())),
        SourceConfig::SheetsApi {
            spreadsheet_id,
            sheet,
            api_base,
        } => Arc::new(SheetsApiSource::new(
            api_base,
            spreadsheet_id,
            sheet.clone(),
            &config.credentials,
            http_client(config)?,
        )),
        SourceConfig::ObjectStorage {
            bucket,
            object,
            api_base,
        } => Arc::new(ObjectStorageSource::new(
            api_base,
            bucket,
            object,
            &config.credentials,
            http_client(config)?,
        )?),
    };
    Ok(source)
}

fn http_client(config: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.fetch_timeout)
        .build()
        .map_err(|e| DashboardError::Config(format!("cannot build HTTP client: {}", e)))
}

pub(crate) fn transport_error(what: &str, e: reqwest::Error) -> DashboardError {
    if e.is_timeout() {
        DashboardError::SourceUnavailable(format!("{} timed out", what))
    } else {
        DashboardError::SourceUnavailable(format!("{} failed: {}", what, e))
    }
}

/// Maps a non-success HTTP status onto the source error taxonomy.
pub(crate) fn check_status(what: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::NOT_FOUND => Err(DashboardError::SourceNotFound(what.to_string())),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(DashboardError::SourceUnavailable(
            format!("access to {} denied ({})", what, response.status()),
        )),
        status => Err(DashboardError::SourceUnavailable(format!(
            "{} answered {}",
            what, status
        ))),
    }
}
