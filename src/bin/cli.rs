//! `salesboard-cli`: runs dashboard operations without the web server.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use salesboard::config::Config;
use salesboard::dashboard::Dashboard;

/// Sales dashboard command-line tool.
#[derive(Parser, Debug)]
#[command(name = "salesboard-cli", about = "Sales dashboard maintenance tool")]
struct Cli {
    /// Database URL (overrides DATABASE_URL).
    #[arg(long = "database", global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replace the store with the contents of the configured spreadsheet.
    Reload,

    /// Print every stored sale.
    List,

    /// Add one sale.
    Add {
        product: String,
        quantity: String,
        category: String,
    },

    /// Delete a sale by id (or by product with DELETE_BY_PRODUCT set).
    Delete { key: String },

    /// Write the store as a spreadsheet file.
    Export {
        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,
        /// Output file.
        output: PathBuf,
    },

    /// Render the dashboard charts as PNG files.
    #[cfg(feature = "web")]
    Charts {
        /// Output directory.
        #[arg(default_value = "charts")]
        dir: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExportFormat {
    Csv,
    Xlsx,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info,sqlx=warn"))
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(database) = cli.database {
        config.database_url = database;
    }
    let dashboard = Dashboard::new(config).await?;

    match cli.command {
        Commands::Reload => {
            let report = dashboard.reload().await?;
            println!(
                "Imported {} sales from {} at {}",
                report.inserted,
                report.source,
                report.finished_at.to_rfc3339()
            );
        }
        Commands::List => {
            let records = dashboard.records().await?;
            println!("{:>6}  {:<40} {:>10}  {}", "ID", "Produto", "Quantidade", "Categoria");
            for r in &records {
                println!("{:>6}  {:<40} {:>10}  {}", r.id, r.product, r.quantity, r.category);
            }
            println!("{} sales", records.len());
        }
        Commands::Add {
            product,
            quantity,
            category,
        } => {
            let created = dashboard.add_record(&product, &quantity, &category).await?;
            println!("Added sale {}", created.id);
        }
        Commands::Delete { key } => {
            let removed = dashboard.delete(&key).await?;
            println!("Deleted sale {} ({})", removed.id, removed.product);
        }
        Commands::Export { format, output } => {
            let table = dashboard.export().await?;
            let bytes = match format {
                ExportFormat::Csv => table.to_csv()?,
                ExportFormat::Xlsx => table.to_xlsx()?,
            };
            std::fs::write(&output, bytes)?;
            println!("Wrote {} rows to {}", table.rows.len(), output.display());
        }
        #[cfg(feature = "web")]
        Commands::Charts { dir } => write_charts(&dashboard, &dir).await?,
    }

    Ok(())
}

#[cfg(feature = "web")]
async fn write_charts(
    dashboard: &Dashboard,
    dir: &std::path::Path,
) -> Result<(), Box<dyn std::error::Error>> {
    use salesboard::graph::{self, GraphOptions, NOT_GENERATED};

    let records = dashboard.records().await?;
    std::fs::create_dir_all(dir)?;

    let charts = [
        ("produtos.png", graph::quantity_by_product(&records), GraphOptions::bar_by_product()),
        ("categorias.png", graph::quantity_by_category(&records), GraphOptions::pie_by_category()),
        ("vendas.png", graph::quantity_by_record(&records), GraphOptions::line_by_record()),
    ];
    for (name, series, options) in charts {
        match graph::render_png(&series, &options)? {
            Some(png) => {
                let path = dir.join(name);
                std::fs::write(&path, png)?;
                println!("{}: {}", options.title, path.display());
            }
            None => println!("{}: {}", options.title, NOT_GENERATED),
        }
    }
    Ok(())
}
