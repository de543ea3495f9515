use handlebars::Handlebars;
use serde::Serialize;

use crate::error::{DashboardError, Result};
use crate::graph::{ChartImage, ChartSet, NOT_GENERATED};
use crate::reconciler::ImportReport;
use crate::record::SalesRecord;

const INDEX_TEMPLATE: &str = "index";

/// Renders the dashboard page from the embedded handlebars template.
pub struct PageRenderer {
    registry: Handlebars<'static>,
}

impl PageRenderer {
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry
            .register_template_string(INDEX_TEMPLATE, include_str!("./static/index.html"))
            .map_err(|e| DashboardError::Render(format!("invalid page template: {}", e)))?;
        Ok(PageRenderer { registry })
    }

    pub fn render(&self, page: &IndexPage) -> Result<String> {
        self.registry
            .render(INDEX_TEMPLATE, page)
            .map_err(|e| DashboardError::Render(format!("cannot render page: {}", e)))
    }
}

#[derive(Serialize)]
struct RecordRow {
    id: i64,
    product: String,
    quantity: i64,
    category: String,
    delete_href: String,
}

#[derive(Serialize)]
struct ChartView {
    title: &'static str,
    src: Option<String>,
    placeholder: &'static str,
}

impl ChartView {
    fn new(title: &'static str, image: &ChartImage) -> Self {
        ChartView {
            title,
            src: image.data_uri(),
            placeholder: NOT_GENERATED,
        }
    }
}

#[derive(Serialize)]
struct ImportView {
    inserted: u64,
    source: String,
    finished_at: String,
}

/// Everything the index template shows.
#[derive(Serialize)]
pub struct IndexPage {
    source: String,
    records: Vec<RecordRow>,
    record_count: usize,
    total_quantity: i64,
    charts: Vec<ChartView>,
    last_import: Option<ImportView>,
    error: Option<String>,
}

impl IndexPage {
    /// `delete_by_product` switches the delete links to legacy product addressing.
    pub fn new(
        source: String,
        records: &[SalesRecord],
        charts: &ChartSet,
        last_import: Option<&ImportReport>,
        delete_by_product: bool,
    ) -> Self {
        let rows = records
            .iter()
            .map(|r| {
                let key = if delete_by_product {
                    urlencoding::encode(&r.product).into_owned()
                } else {
                    r.id.to_string()
                };
                RecordRow {
                    id: r.id,
                    product: r.product.clone(),
                    quantity: r.quantity,
                    category: r.category.clone(),
                    delete_href: format!("/excluir/{}", key),
                }
            })
            .collect::<Vec<_>>();

        IndexPage {
            source,
            record_count: rows.len(),
            total_quantity: records
                .iter()
                .fold(0i64, |acc, r| acc.saturating_add(r.quantity)),
            records: rows,
            charts: vec![
                ChartView::new("Quantidade por produto", &charts.by_product),
                ChartView::new("Quantidade por categoria", &charts.by_category),
                ChartView::new("Quantidade por venda", &charts.by_record),
            ],
            last_import: last_import.map(|report| ImportView {
                inserted: report.inserted,
                source: report.source.clone(),
                finished_at: report.finished_at.format("%d/%m/%Y %H:%M:%S UTC").to_string(),
            }),
            error: None,
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }
}
