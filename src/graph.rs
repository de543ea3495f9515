use std::collections::HashMap;

use serde::Serialize;

use crate::record::SalesRecord;

/// Text shown in place of a chart that has nothing to draw.
pub const NOT_GENERATED: &str = "Não gerado";

/// Chart kinds drawn on the dashboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphType {
    /// One bar per label.
    Bar,
    /// Share of the total per label.
    Pie,
    /// Values connected in order.
    Line,
}

/// Configuration options for chart generation
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Title displayed at the top of the chart
    pub title: String,

    /// Label for the X-axis (ignored by pie charts)
    pub x_label: String,

    /// Label for the Y-axis (ignored by pie charts)
    pub y_label: String,

    /// Width of the chart in pixels
    pub width: u32,

    /// Height of the chart in pixels
    pub height: u32,

    /// Type of chart to generate
    pub graph_type: GraphType,
}

impl Default for GraphOptions {
    /// A 800x600 bar chart with generic labels.
    fn default() -> Self {
        Self {
            title: "Graph".to_string(),
            x_label: "X Axis".to_string(),
            y_label: "Y Axis".to_string(),
            width: 800,
            height: 600,
            graph_type: GraphType::Bar,
        }
    }
}

impl GraphOptions {
    pub fn bar_by_product() -> Self {
        GraphOptions {
            title: "Quantidade por produto".to_string(),
            x_label: "Produto".to_string(),
            y_label: "Quantidade".to_string(),
            graph_type: GraphType::Bar,
            ..GraphOptions::default()
        }
    }

    pub fn pie_by_category() -> Self {
        GraphOptions {
            title: "Quantidade por categoria".to_string(),
            x_label: String::new(),
            y_label: String::new(),
            graph_type: GraphType::Pie,
            ..GraphOptions::default()
        }
    }

    pub fn line_by_record() -> Self {
        GraphOptions {
            title: "Quantidade por venda".to_string(),
            x_label: "Venda".to_string(),
            y_label: "Quantidade".to_string(),
            graph_type: GraphType::Line,
            ..GraphOptions::default()
        }
    }
}

/// Labelled totals, in the order each label first appeared.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Series {
    pub labels: Vec<String>,
    pub values: Vec<i64>,
}

impl Series {
    /// Sum of all values, saturating at `i64::MAX`.
    pub fn total(&self) -> i64 {
        self.values.iter().fold(0i64, |acc, v| acc.saturating_add(*v))
    }

    /// True when a chart of this series would show nothing.
    pub fn is_blank(&self) -> bool {
        self.values.is_empty() || self.total() == 0
    }

    /// Upper bound of the value axis: the largest value plus a tenth of headroom.
    pub fn axis_top(&self) -> i64 {
        let max_y = self.values.iter().copied().max().unwrap_or(0).max(1);
        max_y.saturating_add(max_y / 10).saturating_add(1)
    }

    pub fn get(&self, label: &str) -> Option<i64> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| self.values[i])
    }

    fn accumulate<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, i64)>,
    {
        let mut index: HashMap<&'a str, usize> = HashMap::new();
        let mut series = Series::default();
        for (label, value) in pairs {
            match index.get(label) {
                Some(&i) => series.values[i] = series.values[i].saturating_add(value),
                None => {
                    index.insert(label, series.labels.len());
                    series.labels.push(label.to_string());
                    series.values.push(value);
                }
            }
        }
        series
    }
}

/// Total quantity per product.
pub fn quantity_by_product(records: &[SalesRecord]) -> Series {
    Series::accumulate(records.iter().map(|r| (r.product.as_str(), r.quantity)))
}

/// Total quantity per category.
pub fn quantity_by_category(records: &[SalesRecord]) -> Series {
    Series::accumulate(records.iter().map(|r| (r.category.as_str(), r.quantity)))
}

/// One point per record in store order, labelled by id.
pub fn quantity_by_record(records: &[SalesRecord]) -> Series {
    Series {
        labels: records.iter().map(|r| r.id.to_string()).collect(),
        values: records.iter().map(|r| r.quantity).collect(),
    }
}

/// A rendered chart, or the marker that there was nothing to draw.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChartImage {
    /// Base64-encoded PNG.
    Png(String),
    NotGenerated,
}

impl ChartImage {
    /// `data:` URI for an `<img>` tag, if a chart was drawn.
    pub fn data_uri(&self) -> Option<String> {
        match self {
            ChartImage::Png(encoded) => Some(format!("data:image/png;base64,{}", encoded)),
            ChartImage::NotGenerated => None,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, ChartImage::Png(_))
    }
}

/// The three dashboard charts.
#[derive(Clone, Debug)]
pub struct ChartSet {
    pub by_product: ChartImage,
    pub by_category: ChartImage,
    pub by_record: ChartImage,
}

#[cfg(feature = "web")]
pub use render::{create_graph, render_png};

/// Draws every dashboard chart for `records`.
///
/// A chart that fails to draw (for example when no system font is
/// available) is logged and shown as not generated; the page still renders.
#[cfg(feature = "web")]
pub fn render_all(records: &[SalesRecord]) -> ChartSet {
    let draw = |series: Series, options: GraphOptions| {
        let title = options.title.clone();
        create_graph(&series, &options).unwrap_or_else(|e| {
            log::warn!("Chart {:?} not generated: {}", title, e);
            ChartImage::NotGenerated
        })
    };

    ChartSet {
        by_product: draw(quantity_by_product(records), GraphOptions::bar_by_product()),
        by_category: draw(quantity_by_category(records), GraphOptions::pie_by_category()),
        by_record: draw(quantity_by_record(records), GraphOptions::line_by_record()),
    }
}

#[cfg(feature = "web")]
mod render {
    use std::error::Error;
    use std::io::Cursor;

    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use image::{DynamicImage, ImageOutputFormat, RgbImage};
    use plotters::coord::Shift;
    use plotters::element::Pie;
    use plotters::prelude::*;

    use super::{ChartImage, GraphOptions, GraphType, Series};
    use crate::error::{DashboardError, Result};

    type DrawResult = std::result::Result<(), Box<dyn Error>>;

    /// Creates a chart from a series
    ///
    /// This is the main entry point for the dashboard. It draws the chart
    /// selected by `options.graph_type` and base64-encodes the PNG.
    ///
    /// # Returns
    /// * `ChartImage::NotGenerated` when the series is empty or sums to zero
    /// * `DashboardError::Render` when drawing or encoding fails
    pub fn create_graph(series: &Series, options: &GraphOptions) -> Result<ChartImage> {
        Ok(match render_png(series, options)? {
            Some(png) => ChartImage::Png(STANDARD.encode(png)),
            None => ChartImage::NotGenerated,
        })
    }

    /// Draws the chart into memory and encodes it as PNG
    ///
    /// # Arguments
    /// * `series` - Labels and values to plot
    /// * `options` - Chart styling and type options
    ///
    /// # Returns
    /// * `Ok(None)` if there is nothing to draw, otherwise the PNG bytes
    pub fn render_png(series: &Series, options: &GraphOptions) -> Result<Option<Vec<u8>>> {
        if series.is_blank() {
            return Ok(None);
        }

        let (width, height) = (options.width, options.height);
        let mut pixels = vec![0u8; (width as usize) * (height as usize) * 3];
        {
            let root = BitMapBackend::with_buffer(&mut pixels, (width, height)).into_drawing_area();
            let drawn = match options.graph_type {
                GraphType::Bar => draw_bar(&root, series, options),
                GraphType::Pie => draw_pie(&root, series, options),
                GraphType::Line => draw_line(&root, series, options),
            };
            drawn.map_err(|e| DashboardError::Render(e.to_string()))?;
        }

        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| DashboardError::Render("pixel buffer has the wrong size".to_string()))?;
        let mut png = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut png, ImageOutputFormat::Png)
            .map_err(|e| DashboardError::Render(e.to_string()))?;

        Ok(Some(png.into_inner()))
    }

    fn draw_bar(
        root: &DrawingArea<BitMapBackend<'_>, Shift>,
        series: &Series,
        options: &GraphOptions,
    ) -> DrawResult {
        root.fill(&WHITE)?;

        let max_y = series.axis_top();
        let labels = &series.labels;

        let mut chart = ChartBuilder::on(root)
            .caption(&options.title, ("sans-serif", 30).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d((0..labels.len()).into_segmented(), 0i64..max_y)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .x_label_formatter(&|v| match v {
                SegmentValue::CenterOf(i) => labels.get(*i).cloned().unwrap_or_default(),
                _ => String::new(),
            })
            .draw()?;

        chart.draw_series(series.values.iter().enumerate().map(|(i, value)| {
            Rectangle::new(
                [(SegmentValue::Exact(i), 0), (SegmentValue::Exact(i + 1), *value)],
                Palette99::pick(i).filled(),
            )
        }))?;

        root.present()?;
        Ok(())
    }

    fn draw_pie(
        root: &DrawingArea<BitMapBackend<'_>, Shift>,
        series: &Series,
        options: &GraphOptions,
    ) -> DrawResult {
        root.fill(&WHITE)?;
        let root = root.titled(&options.title, ("sans-serif", 30).into_font())?;

        let (width, height) = root.dim_in_pixel();
        let center = ((width / 2) as i32, (height / 2) as i32);
        let radius = f64::from(width.min(height)) * 0.35;

        let sizes: Vec<f64> = series.values.iter().map(|v| *v as f64).collect();
        let colors: Vec<RGBColor> = (0..sizes.len())
            .map(|i| {
                let (r, g, b) = Palette99::pick(i).rgb();
                RGBColor(r, g, b)
            })
            .collect();

        let mut pie = Pie::new(&center, &radius, &sizes, &colors, &series.labels);
        pie.start_angle(90.0);
        pie.label_style(("sans-serif", 16).into_font().color(&BLACK));
        pie.percentages(("sans-serif", 14).into_font().color(&WHITE));
        root.draw(&pie)?;

        root.present()?;
        Ok(())
    }

    fn draw_line(
        root: &DrawingArea<BitMapBackend<'_>, Shift>,
        series: &Series,
        options: &GraphOptions,
    ) -> DrawResult {
        root.fill(&WHITE)?;

        let count = series.values.len() as i64;
        let max_y = series.axis_top();
        let points: Vec<(i64, i64)> = series
            .values
            .iter()
            .enumerate()
            .map(|(i, v)| (i as i64 + 1, *v))
            .collect();

        let mut chart = ChartBuilder::on(root)
            .caption(&options.title, ("sans-serif", 30).into_font())
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(50)
            .build_cartesian_2d(0i64..count + 1, 0i64..max_y)?;

        chart
            .configure_mesh()
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()?;

        chart.draw_series(LineSeries::new(points.iter().copied(), &BLUE))?;
        chart.draw_series(
            points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 4, BLUE.filled())),
        )?;

        root.present()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(id: i64, product: &str, quantity: i64, category: &str) -> SalesRecord {
        SalesRecord {
            id,
            product: product.to_string(),
            quantity,
            category: category.to_string(),
        }
    }

    #[test]
    fn totals_merge_repeated_labels() {
        let records = vec![
            sale(1, "Mouse", 10, "Peripherals"),
            sale(2, "Mouse", 5, "Peripherals"),
        ];

        let by_product = quantity_by_product(&records);
        assert_eq!(by_product.labels, vec!["Mouse"]);
        assert_eq!(by_product.get("Mouse"), Some(15));

        let by_category = quantity_by_category(&records);
        assert_eq!(by_category.get("Peripherals"), Some(15));
        assert_eq!(by_category.get("Monitores"), None);
    }

    #[test]
    fn labels_keep_first_appearance_order() {
        let records = vec![
            sale(1, "Teclado", 1, "Periféricos"),
            sale(2, "Monitor", 2, "Monitores"),
            sale(3, "Teclado", 3, "Periféricos"),
        ];
        let series = quantity_by_product(&records);
        assert_eq!(series.labels, vec!["Teclado", "Monitor"]);
        assert_eq!(series.values, vec![4, 2]);

        let line = quantity_by_record(&records);
        assert_eq!(line.labels, vec!["1", "2", "3"]);
        assert_eq!(line.values, vec![1, 2, 3]);
    }

    #[test]
    fn blank_series() {
        assert!(Series::default().is_blank());
        assert!(quantity_by_product(&[sale(1, "Cabo", 0, "Acessórios")]).is_blank());
        assert!(!quantity_by_product(&[sale(1, "Cabo", 2, "Acessórios")]).is_blank());
    }

    #[test]
    fn huge_quantities_saturate_instead_of_overflowing() {
        let records = vec![
            sale(1, "Mouse", i64::MAX, "Periféricos"),
            sale(2, "Mouse", 1, "Periféricos"),
        ];
        let series = quantity_by_product(&records);
        assert_eq!(series.get("Mouse"), Some(i64::MAX));
        assert_eq!(quantity_by_record(&records).total(), i64::MAX);
        assert_eq!(series.axis_top(), i64::MAX);
        assert_eq!(Series::default().axis_top(), 2);
    }

    #[cfg(feature = "web")]
    #[test]
    fn capped_quantities_render_without_panicking() {
        use crate::record::QUANTITY_MAX;

        let records = vec![
            sale(1, "Mouse", QUANTITY_MAX, "Periféricos"),
            sale(2, "Mouse", QUANTITY_MAX, "Periféricos"),
            sale(3, "Cabo", 1, "Acessórios"),
        ];
        // Drawing may still fail without system fonts; it must not panic.
        let charts = render_all(&records);
        if let Some(uri) = charts.by_product.data_uri() {
            assert!(uri.starts_with("data:image/png;base64,"));
        }
    }

    #[cfg(feature = "web")]
    #[test]
    fn empty_store_is_not_generated() {
        for options in [
            GraphOptions::bar_by_product(),
            GraphOptions::pie_by_category(),
            GraphOptions::line_by_record(),
        ] {
            assert_eq!(
                create_graph(&Series::default(), &options).unwrap(),
                ChartImage::NotGenerated
            );
        }

        let charts = render_all(&[]);
        assert!(!charts.by_product.is_generated());
        assert!(!charts.by_category.is_generated());
        assert!(!charts.by_record.is_generated());
        assert_eq!(charts.by_record.data_uri(), None);
    }
}
