use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::info;

use super::SpreadsheetSource;
use super::decode::{self, FileFormat};
use crate::error::{DashboardError, Result};
use crate::export::ExportTable;
use crate::record::RawTable;

/// A CSV or workbook file on the local filesystem.
pub struct LocalFileSource {
    path: PathBuf,
}

impl LocalFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LocalFileSource { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SpreadsheetSource for LocalFileSource {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    async fn fetch(&self) -> Result<RawTable> {
        let format = FileFormat::from_name(&self.path)?;
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => DashboardError::SourceNotFound(self.path.display().to_string()),
            _ => DashboardError::SourceUnavailable(format!(
                "cannot read {}: {}",
                self.path.display(),
                e
            )),
        })?;

        tokio::task::spawn_blocking(move || decode::decode(bytes, format))
            .await
            .map_err(|e| DashboardError::SourceFormat(format!("decoder task failed: {}", e)))?
    }

    /// Replaces the file atomically: the new content is written to a
    /// temporary file next to it and renamed over the existing one.
    async fn write_back(&self, table: &ExportTable) -> Result<()> {
        let bytes = match FileFormat::from_name(&self.path)? {
            FileFormat::Csv => table.to_csv()?,
            FileFormat::Xlsx => table.to_xlsx()?,
            other => {
                return Err(DashboardError::SourceFormat(format!(
                    "cannot write {:?} files, only csv and xlsx",
                    other
                )));
            }
        };

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || replace_file(&path, &bytes))
            .await
            .map_err(|e| DashboardError::SourceUnavailable(format!("writer task failed: {}", e)))??;

        info!("Wrote {} rows back to {}", table.rows.len(), self.path.display());
        Ok(())
    }
}

fn replace_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let unavailable = |e: std::io::Error| {
        DashboardError::SourceUnavailable(format!("cannot write {}: {}", path.display(), e))
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut staged = tempfile::NamedTempFile::new_in(&dir).map_err(unavailable)?;
    staged.write_all(bytes).map_err(unavailable)?;
    staged.as_file().sync_all().map_err(unavailable)?;
    staged.persist(path).map_err(|e| unavailable(e.error))?;

    Ok(())
}
