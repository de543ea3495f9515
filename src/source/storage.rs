use async_trait::async_trait;
use log::info;

use super::auth::{SCOPE_STORAGE, TokenProvider};
use super::decode::{self, FileFormat};
use super::{SpreadsheetSource, check_status, transport_error};
use crate::config::CredentialsConfig;
use crate::error::{DashboardError, Result};
use crate::export::ExportTable;
use crate::record::RawTable;

/// A spreadsheet file kept as an object in Google Cloud Storage.
pub struct ObjectStorageSource {
    api_base: String,
    bucket: String,
    object: String,
    format: FileFormat,
    tokens: TokenProvider,
    client: reqwest::Client,
}

impl ObjectStorageSource {
    /// Fails with `SourceFormat` when the object name has no readable extension.
    pub fn new(
        api_base: &str,
        bucket: &str,
        object: &str,
        credentials: &CredentialsConfig,
        client: reqwest::Client,
    ) -> Result<Self> {
        Ok(ObjectStorageSource {
            api_base: api_base.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            object: object.to_string(),
            format: FileFormat::from_name(object)?,
            tokens: TokenProvider::new(credentials, SCOPE_STORAGE, client.clone()),
            client,
        })
    }

    fn uri(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.object)
    }
}

#[async_trait]
impl SpreadsheetSource for ObjectStorageSource {
    fn describe(&self) -> String {
        self.uri()
    }

    async fn fetch(&self) -> Result<RawTable> {
        let token = self.tokens.token().await?;
        let what = self.uri();
        let url = format!(
            "{}/storage/v1/b/{}/o/{}",
            self.api_base,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(&self.object)
        );

        let response = self
            .client
            .get(url)
            .query(&[("alt", "media")])
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| transport_error(&what, e))?;
        let bytes = check_status(&what, response)?
            .bytes()
            .await
            .map_err(|e| transport_error(&what, e))?
            .to_vec();

        let format = self.format;
        tokio::task::spawn_blocking(move || decode::decode(bytes, format))
            .await
            .map_err(|e| DashboardError::SourceFormat(format!("decoder task failed: {}", e)))?
    }

    async fn write_back(&self, table: &ExportTable) -> Result<()> {
        let bytes = match self.format {
            FileFormat::Csv => table.to_csv()?,
            FileFormat::Xlsx => table.to_xlsx()?,
            other => {
                return Err(DashboardError::SourceFormat(format!(
                    "cannot write {:?} objects, only csv and xlsx",
                    other
                )));
            }
        };

        let token = self.tokens.token().await?;
        let what = self.uri();
        let url = format!(
            "{}/upload/storage/v1/b/{}/o",
            self.api_base,
            urlencoding::encode(&self.bucket)
        );

        let response = self
            .client
            .post(url)
            .query(&[("uploadType", "media"), ("name", self.object.as_str())])
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, self.format.content_type())
            .body(bytes)
            .send()
            .await
            .map_err(|e| transport_error(&what, e))?;
        check_status(&what, response)?;

        info!("Wrote {} rows back to {}", table.rows.len(), what);
        Ok(())
    }
}
