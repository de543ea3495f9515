use serde::Serialize;

use crate::error::{DashboardError, Result};

pub const COLUMN_PRODUCT: &str = "Produto";
pub const COLUMN_QUANTITY: &str = "Quantidade";
pub const COLUMN_CATEGORY: &str = "Categoria";

/// Columns every import source must carry, in export order.
pub const REQUIRED_COLUMNS: [&str; 3] = [COLUMN_PRODUCT, COLUMN_QUANTITY, COLUMN_CATEGORY];

pub const PRODUCT_MAX_CHARS: usize = 100;
pub const CATEGORY_MAX_CHARS: usize = 50;

/// Largest quantity a single sale may carry.
pub const QUANTITY_MAX: i64 = i32::MAX as i64;

/// A persisted sales row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct SalesRecord {
    pub id: i64,
    #[sqlx(rename = "produto")]
    pub product: String,
    #[sqlx(rename = "quantidade")]
    pub quantity: i64,
    #[sqlx(rename = "categoria")]
    pub category: String,
}

/// A normalized row waiting for the store to assign it an id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NewSalesRecord {
    pub product: String,
    pub quantity: i64,
    pub category: String,
}

impl NewSalesRecord {
    /// Validates user input for a single-record add.
    ///
    /// Product and category must be non-empty after trimming and fit their
    /// column limits; quantity must parse as a positive integer no larger
    /// than [`QUANTITY_MAX`].
    pub fn validated(product: &str, quantity: &str, category: &str) -> Result<Self> {
        let product = product.trim();
        let category = category.trim();

        if product.is_empty() {
            return Err(DashboardError::Validation(
                "product must not be empty".to_string(),
            ));
        }
        if product.chars().count() > PRODUCT_MAX_CHARS {
            return Err(DashboardError::Validation(format!(
                "product must be at most {} characters",
                PRODUCT_MAX_CHARS
            )));
        }
        if category.is_empty() {
            return Err(DashboardError::Validation(
                "category must not be empty".to_string(),
            ));
        }
        if category.chars().count() > CATEGORY_MAX_CHARS {
            return Err(DashboardError::Validation(format!(
                "category must be at most {} characters",
                CATEGORY_MAX_CHARS
            )));
        }

        let quantity = match quantity.trim().parse::<i64>() {
            Ok(q) if (1..=QUANTITY_MAX).contains(&q) => q,
            _ => {
                return Err(DashboardError::Validation(format!(
                    "quantity must be an integer between 1 and {}, got {:?}",
                    QUANTITY_MAX, quantity
                )));
            }
        };

        Ok(NewSalesRecord {
            product: product.to_string(),
            quantity,
            category: category.to_string(),
        })
    }
}

impl From<SalesRecord> for NewSalesRecord {
    fn from(record: SalesRecord) -> Self {
        NewSalesRecord {
            product: record.product,
            quantity: record.quantity,
            category: record.category,
        }
    }
}

/// An untyped cell value as delivered by a source backend.
#[derive(Clone, Debug, PartialEq)]
pub enum RawValue {
    Empty,
    Text(String),
    Number(f64),
}

impl RawValue {
    pub fn is_blank(&self) -> bool {
        match self {
            RawValue::Empty => true,
            RawValue::Text(s) => s.trim().is_empty(),
            RawValue::Number(_) => false,
        }
    }

    /// Renders the value as text. Whole numbers drop their fractional part so
    /// a product code typed as `1234` does not come back as `1234.0`.
    pub fn to_text(&self) -> String {
        match self {
            RawValue::Empty => String::new(),
            RawValue::Text(s) => s.clone(),
            RawValue::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                format!("{}", *n as i64)
            }
            RawValue::Number(n) => n.to_string(),
        }
    }

    /// Coerces the value to a stored quantity. Anything that is not a finite
    /// number between 0 and [`QUANTITY_MAX`] becomes 0.
    pub fn to_quantity(&self) -> i64 {
        let number = match self {
            RawValue::Empty => return 0,
            RawValue::Number(n) => *n,
            RawValue::Text(s) => {
                let s = s.trim();
                match s.parse::<i64>() {
                    Ok(q) if (0..=QUANTITY_MAX).contains(&q) => return q,
                    Ok(_) => return 0,
                    Err(_) => match s.parse::<f64>() {
                        Ok(n) => n,
                        Err(_) => return 0,
                    },
                }
            }
        };

        if !number.is_finite() || number <= 0.0 || number > QUANTITY_MAX as f64 {
            return 0;
        }
        number.trunc() as i64
    }
}

/// One data row of an import, reduced to the three columns the store cares about.
///
/// An accessor returns `None` when the source has no such column at all, and
/// `Some(RawValue::Empty)` when the column exists but the cell is blank.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawImportRow {
    product: Option<RawValue>,
    quantity: Option<RawValue>,
    category: Option<RawValue>,
}

impl RawImportRow {
    pub fn new(
        product: Option<RawValue>,
        quantity: Option<RawValue>,
        category: Option<RawValue>,
    ) -> Self {
        RawImportRow {
            product,
            quantity,
            category,
        }
    }

    pub fn product(&self) -> Option<&RawValue> {
        self.product.as_ref()
    }

    pub fn quantity(&self) -> Option<&RawValue> {
        self.quantity.as_ref()
    }

    pub fn category(&self) -> Option<&RawValue> {
        self.category.as_ref()
    }
}

/// The header a source exposed plus its rows, in source order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<RawImportRow>,
}

impl RawTable {
    /// Builds a table from a header row and a grid of cells.
    ///
    /// Header names are trimmed. Rows shorter than the header read as blank
    /// cells. Only rows with no data in any column are dropped; a row with
    /// blank required cells but data elsewhere still imports.
    pub fn from_grid<I>(header: Vec<String>, grid: I) -> Self
    where
        I: IntoIterator<Item = Vec<RawValue>>,
    {
        let columns: Vec<String> = header.into_iter().map(|h| h.trim().to_string()).collect();
        let position = |name: &str| columns.iter().position(|c| c == name);
        let (product_at, quantity_at, category_at) = (
            position(COLUMN_PRODUCT),
            position(COLUMN_QUANTITY),
            position(COLUMN_CATEGORY),
        );

        let pick = |cells: &[RawValue], at: Option<usize>| {
            at.map(|i| cells.get(i).cloned().unwrap_or(RawValue::Empty))
        };

        let rows = grid
            .into_iter()
            .filter(|cells| !cells.iter().all(RawValue::is_blank))
            .map(|cells| {
                RawImportRow::new(
                    pick(&cells, product_at),
                    pick(&cells, quantity_at),
                    pick(&cells, category_at),
                )
            })
            .collect();

        RawTable { columns, rows }
    }

    /// Required columns absent from the header, in canonical order.
    pub fn missing_columns(&self) -> Vec<String> {
        REQUIRED_COLUMNS
            .iter()
            .filter(|required| !self.columns.iter().any(|c| c == *required))
            .map(|c| c.to_string())
            .collect()
    }
}

/// Trims and truncates a text field to `max` characters.
pub(crate) fn clip(text: &str, max: usize) -> String {
    let clipped: String = text.trim().chars().take(max).collect();
    clipped.trim_end().to_string()
}
