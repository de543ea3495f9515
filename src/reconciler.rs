//! Spreadsheet import: schema check, row normalization and the atomic swap
//! of the store's contents.

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;

use crate::error::{DashboardError, Result};
use crate::record::{CATEGORY_MAX_CHARS, NewSalesRecord, PRODUCT_MAX_CHARS, RawTable, RawValue, clip};
use crate::source::SpreadsheetSource;
use crate::store::RecordStore;

/// Outcome of a completed reload.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImportReport {
    pub inserted: u64,
    pub source: String,
    pub finished_at: DateTime<Utc>,
}

/// Fails with `SchemaInvalid` unless every required column is in the header.
pub fn check_schema(table: &RawTable) -> Result<()> {
    let missing = table.missing_columns();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(DashboardError::SchemaInvalid { missing })
    }
}

/// Coerces every row into a storable record. Never fails: text is trimmed
/// and clipped, and quantities that do not read as a non-negative number
/// become 0.
pub fn normalize(table: &RawTable) -> Vec<NewSalesRecord> {
    let text = |v: Option<&RawValue>| v.map(RawValue::to_text).unwrap_or_default();

    table
        .rows
        .iter()
        .map(|row| NewSalesRecord {
            product: clip(&text(row.product()), PRODUCT_MAX_CHARS),
            quantity: row.quantity().map_or(0, RawValue::to_quantity),
            category: clip(&text(row.category()), CATEGORY_MAX_CHARS),
        })
        .collect()
}

/// Validates `table` and swaps it into the store, returning the row count.
///
/// The store is untouched when the schema check fails.
pub async fn import_table(store: &RecordStore, table: &RawTable) -> Result<u64> {
    check_schema(table)?;
    let records = normalize(table);
    store.replace_all(&records).await
}

/// Fetches the spreadsheet from `source` and replaces the store with it.
pub async fn reload(store: &RecordStore, source: &dyn SpreadsheetSource) -> Result<ImportReport> {
    let described = source.describe();
    let table = source.fetch().await?;
    let inserted = import_table(store, &table).await?;

    info!("Imported {} sales from {}", inserted, described);
    Ok(ImportReport {
        inserted,
        source: described,
        finished_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RawImportRow;

    fn header() -> Vec<String> {
        vec!["Produto".into(), "Quantidade".into(), "Categoria".into()]
    }

    #[test]
    fn schema_check_names_missing_columns() {
        let table = RawTable::from_grid(vec!["Produto".into(), "Qtd".into()], Vec::new());
        match check_schema(&table).unwrap_err() {
            DashboardError::SchemaInvalid { missing } => {
                assert_eq!(missing, vec!["Quantidade", "Categoria"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let empty_but_valid = RawTable::from_grid(header(), Vec::new());
        assert!(check_schema(&empty_but_valid).is_ok());
    }

    #[test]
    fn normalization_coerces_and_clips() {
        let table = RawTable {
            columns: header(),
            rows: vec![
                RawImportRow::new(
                    Some(RawValue::Text("  Mouse ".into())),
                    Some(RawValue::Text("abc".into())),
                    Some(RawValue::Text("Periféricos".into())),
                ),
                RawImportRow::new(
                    Some(RawValue::Number(4021.0)),
                    Some(RawValue::Number(3.7)),
                    Some(RawValue::Text("c".repeat(80))),
                ),
                RawImportRow::new(
                    Some(RawValue::Text("p".repeat(150))),
                    None,
                    Some(RawValue::Empty),
                ),
            ],
        };

        let records = normalize(&table);
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].product, "Mouse");
        assert_eq!(records[0].quantity, 0);

        assert_eq!(records[1].product, "4021");
        assert_eq!(records[1].quantity, 3);
        assert_eq!(records[1].category.chars().count(), CATEGORY_MAX_CHARS);

        assert_eq!(records[2].product.chars().count(), PRODUCT_MAX_CHARS);
        assert_eq!(records[2].quantity, 0);
        assert_eq!(records[2].category, "");
    }

    #[tokio::test]
    async fn schema_failure_leaves_store_alone() {
        let store = RecordStore::in_memory().await.unwrap();
        store
            .insert(&NewSalesRecord::validated("Teclado", "4", "Periféricos").unwrap())
            .await
            .unwrap();

        let table = RawTable::from_grid(vec!["Produto".into()], Vec::new());
        let err = import_table(&store, &table).await.unwrap_err();
        assert!(matches!(err, DashboardError::SchemaInvalid { .. }));
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
