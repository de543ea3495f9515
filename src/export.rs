use std::error::Error;

use crate::error::{DashboardError, Result};
use crate::record::{RawTable, RawValue, REQUIRED_COLUMNS, SalesRecord};
use crate::store::RecordStore;

/// One exported row, in the spreadsheet's column order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportRow {
    pub product: String,
    pub quantity: i64,
    pub category: String,
}

/// The store projected back into the `Produto, Quantidade, Categoria` shape.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportTable {
    pub rows: Vec<ExportRow>,
}

impl ExportTable {
    pub fn header(&self) -> [&'static str; 3] {
        REQUIRED_COLUMNS
    }

    /// Projects records, which must already be ordered by id.
    pub fn from_records(records: Vec<SalesRecord>) -> Self {
        let rows = records
            .into_iter()
            .map(|r| ExportRow {
                product: r.product,
                quantity: r.quantity,
                category: r.category,
            })
            .collect();
        ExportTable { rows }
    }

    /// Feeds the export back in as if a source had delivered it.
    pub fn to_raw_table(&self) -> RawTable {
        RawTable::from_grid(
            REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            self.rows.iter().map(|row| {
                vec![
                    RawValue::Text(row.product.clone()),
                    RawValue::Number(row.quantity as f64),
                    RawValue::Text(row.category.clone()),
                ]
            }),
        )
    }

    /// Header plus rows as a Sheets API `values` grid.
    pub fn to_sheet_values(&self) -> Vec<Vec<serde_json::Value>> {
        let mut values = Vec::with_capacity(self.rows.len() + 1);
        values.push(
            REQUIRED_COLUMNS
                .iter()
                .map(|c| serde_json::Value::from(*c))
                .collect(),
        );
        for row in &self.rows {
            values.push(vec![
                serde_json::Value::from(row.product.as_str()),
                serde_json::Value::from(row.quantity),
                serde_json::Value::from(row.category.as_str()),
            ]);
        }
        values
    }

    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(REQUIRED_COLUMNS)
            .map_err(export_failure)?;
        for row in &self.rows {
            let quantity = row.quantity.to_string();
            writer
                .write_record([row.product.as_str(), quantity.as_str(), row.category.as_str()])
                .map_err(export_failure)?;
        }
        writer
            .into_inner()
            .map_err(|e| export_failure(e.into_error()))
    }

    /// Writes the table to an XLSX workbook with a single `Vendas` sheet.
    pub fn to_xlsx(&self) -> Result<Vec<u8>> {
        self.build_xlsx().map_err(export_failure)
    }

    fn build_xlsx(&self) -> std::result::Result<Vec<u8>, Box<dyn Error>> {
        use rust_xlsxwriter::{Format, Workbook, Worksheet};

        let mut workbook = Workbook::new();
        let mut worksheet = Worksheet::new();
        worksheet.set_name("Vendas")?;

        let bold = Format::new().set_bold();
        for (c, name) in REQUIRED_COLUMNS.iter().enumerate() {
            worksheet.write_string_with_format(0, c as u16, *name, &bold)?;
        }

        for (r, row) in self.rows.iter().enumerate() {
            let line = (r + 1) as u32;
            worksheet.write_string(line, 0, &row.product)?;
            worksheet.write_number(line, 1, row.quantity as f64)?;
            worksheet.write_string(line, 2, &row.category)?;
        }

        workbook.push_worksheet(worksheet);
        let buffer = workbook.save_to_buffer()?;

        Ok(buffer)
    }
}

/// Reads the current store in id order and projects it.
pub async fn export_table(store: &RecordStore) -> Result<ExportTable> {
    Ok(ExportTable::from_records(store.all().await?))
}

fn export_failure<E: std::fmt::Display>(e: E) -> DashboardError {
    DashboardError::SourceFormat(format!("could not encode export: {}", e))
}
