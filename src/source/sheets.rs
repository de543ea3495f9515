use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;

use super::auth::{SCOPE_SPREADSHEETS, TokenProvider};
use super::{SpreadsheetSource, check_status, decode, transport_error};
use crate::config::CredentialsConfig;
use crate::error::{DashboardError, Result};
use crate::export::ExportTable;
use crate::record::RawTable;

/// A worksheet read through the Google Sheets v4 REST API.
pub struct SheetsApiSource {
    api_base: String,
    spreadsheet_id: String,
    sheet: Option<String>,
    tokens: TokenProvider,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

impl SheetsApiSource {
    pub fn new(
        api_base: &str,
        spreadsheet_id: &str,
        sheet: Option<String>,
        credentials: &CredentialsConfig,
        client: reqwest::Client,
    ) -> Self {
        SheetsApiSource {
            api_base: api_base.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet,
            tokens: TokenProvider::new(credentials, SCOPE_SPREADSHEETS, client.clone()),
            client,
        }
    }

    fn spreadsheet_url(&self) -> String {
        format!(
            "{}/v4/spreadsheets/{}",
            self.api_base,
            urlencoding::encode(&self.spreadsheet_id)
        )
    }

    /// The configured worksheet, or the first one in the spreadsheet.
    async fn sheet_title(&self, token: &str) -> Result<String> {
        if let Some(sheet) = &self.sheet {
            return Ok(sheet.clone());
        }

        let what = format!("spreadsheet {}", self.spreadsheet_id);
        let response = self
            .client
            .get(self.spreadsheet_url())
            .query(&[("fields", "sheets.properties.title")])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport_error(&what, e))?;
        let meta: SpreadsheetMeta = check_status(&what, response)?
            .json()
            .await
            .map_err(|e| transport_error(&what, e))?;

        meta.sheets
            .into_iter()
            .next()
            .map(|s| s.properties.title)
            .ok_or_else(|| DashboardError::SourceNotFound(format!("{} has no worksheets", what)))
    }

    /// A1 range naming a whole worksheet; titles are always quoted.
    fn range_url(&self, title: &str) -> String {
        let range = format!("'{}'", title.replace('\'', "''"));
        format!("{}/values/{}", self.spreadsheet_url(), urlencoding::encode(&range))
    }
}

#[async_trait]
impl SpreadsheetSource for SheetsApiSource {
    fn describe(&self) -> String {
        match &self.sheet {
            Some(sheet) => format!("Google Sheets {} ({})", self.spreadsheet_id, sheet),
            None => format!("Google Sheets {}", self.spreadsheet_id),
        }
    }

    async fn fetch(&self) -> Result<RawTable> {
        let token = self.tokens.token().await?;
        let title = self.sheet_title(&token).await?;
        let what = format!("worksheet {:?} of {}", title, self.spreadsheet_id);

        let response = self
            .client
            .get(self.range_url(&title))
            .query(&[
                ("majorDimension", "ROWS"),
                ("valueRenderOption", "UNFORMATTED_VALUE"),
            ])
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| transport_error(&what, e))?;
        let range: ValueRange = check_status(&what, response)?
            .json()
            .await
            .map_err(|e| transport_error(&what, e))?;

        debug!("Read {} rows from {}", range.values.len(), what);
        Ok(decode::from_sheet_values(range.values))
    }

    async fn write_back(&self, table: &ExportTable) -> Result<()> {
        let token = self.tokens.token().await?;
        let title = self.sheet_title(&token).await?;
        let what = format!("worksheet {:?} of {}", title, self.spreadsheet_id);
        let url = self.range_url(&title);

        let cleared = self
            .client
            .post(format!("{}:clear", url))
            .bearer_auth(&token)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| transport_error(&what, e))?;
        check_status(&what, cleared)?;

        let body = serde_json::json!({
            "majorDimension": "ROWS",
            "values": table.to_sheet_values(),
        });
        let updated = self
            .client
            .put(url)
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&what, e))?;
        check_status(&what, updated)?;

        info!("Wrote {} rows back to {}", table.rows.len(), what);
        Ok(())
    }
}
