use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Ods, Reader, Xls, Xlsx};

use crate::error::{DashboardError, Result};
use crate::record::{RawTable, RawValue};

/// File formats a spreadsheet can arrive in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xlsx,
    Xls,
    Ods,
}

impl FileFormat {
    /// Picks the format from a file or object name's extension.
    pub fn from_name(name: impl AsRef<Path>) -> Result<Self> {
        let path = name.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("csv") => Ok(FileFormat::Csv),
            Some("xlsx") | Some("xlsm") => Ok(FileFormat::Xlsx),
            Some("xls") => Ok(FileFormat::Xls),
            Some("ods") => Ok(FileFormat::Ods),
            Some(ext) => Err(DashboardError::SourceFormat(format!(
                "unsupported file extension: {}",
                ext
            ))),
            None => Err(DashboardError::SourceFormat(format!(
                "{} has no extension",
                path.display()
            ))),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            FileFormat::Csv => "text/csv; charset=utf-8",
            FileFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            FileFormat::Xls => "application/vnd.ms-excel",
            FileFormat::Ods => "application/vnd.oasis.opendocument.spreadsheet",
        }
    }
}

/// Decodes raw file bytes into a table; the first row is the header.
pub fn decode(bytes: Vec<u8>, format: FileFormat) -> Result<RawTable> {
    match format {
        FileFormat::Csv => decode_csv(&bytes),
        FileFormat::Xlsx => decode_workbook::<Xlsx<_>>(bytes),
        FileFormat::Xls => decode_workbook::<Xls<_>>(bytes),
        FileFormat::Ods => decode_workbook::<Ods<_>>(bytes),
    }
}

fn decode_csv(bytes: &[u8]) -> Result<RawTable> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    // Spreadsheets saved with a pt-BR locale separate fields with ';'.
    let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    let delimiter = if first_line.contains(&b';') && !first_line.contains(&b',') {
        b';'
    } else {
        b','
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let header = reader
        .headers()
        .map_err(|e| DashboardError::SourceFormat(format!("invalid CSV header: {}", e)))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut grid = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| DashboardError::SourceFormat(format!("invalid CSV row: {}", e)))?;
        grid.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        RawValue::Empty
                    } else {
                        RawValue::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(RawTable::from_grid(header, grid))
}

fn decode_workbook<W>(bytes: Vec<u8>) -> Result<RawTable>
where
    W: Reader<Cursor<Vec<u8>>>,
    W::Error: std::fmt::Display,
{
    let mut workbook = W::new(Cursor::new(bytes))
        .map_err(|e| DashboardError::SourceFormat(format!("unreadable workbook: {}", e)))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| DashboardError::SourceFormat("workbook has no sheets".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| DashboardError::SourceFormat(format!("unreadable sheet {}: {}", sheet_name, e)))?;

    let mut rows = range.rows();
    let header = match rows.next() {
        Some(cells) => cells.iter().map(|c| cell_value(c).to_text()).collect(),
        None => Vec::new(),
    };
    let grid: Vec<Vec<RawValue>> = rows
        .map(|cells| cells.iter().map(cell_value).collect())
        .collect();

    Ok(RawTable::from_grid(header, grid))
}

fn cell_value(cell: &Data) -> RawValue {
    match cell {
        Data::Empty | Data::Error(_) => RawValue::Empty,
        Data::Int(i) => RawValue::Number(*i as f64),
        Data::Float(f) => RawValue::Number(*f),
        Data::String(s) => RawValue::Text(s.clone()),
        Data::Bool(b) => RawValue::Text(b.to_string()),
        other => RawValue::Text(other.to_string()),
    }
}

/// Converts a Sheets API `values` grid (first row header) into a table.
pub fn from_sheet_values(values: Vec<Vec<serde_json::Value>>) -> RawTable {
    let mut rows = values.into_iter();
    let header = match rows.next() {
        Some(cells) => cells.iter().map(|c| json_value(c).to_text()).collect(),
        None => Vec::new(),
    };
    RawTable::from_grid(header, rows.map(|cells| cells.iter().map(json_value).collect()))
}

fn json_value(value: &serde_json::Value) -> RawValue {
    match value {
        serde_json::Value::Null => RawValue::Empty,
        serde_json::Value::String(s) if s.is_empty() => RawValue::Empty,
        serde_json::Value::String(s) => RawValue::Text(s.clone()),
        serde_json::Value::Number(n) => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Empty),
        other => RawValue::Text(other.to_string()),
    }
}
