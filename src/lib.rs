/*!
# Sales Dashboard

An internal sales-reporting dashboard, built in Rust.

## Overview

Sales records (product, quantity, category) live in a spreadsheet that the
sales team maintains. The dashboard imports that spreadsheet into a SQLite
table, draws summary charts over it and lets users add or delete single
records from the browser. Changes can optionally be written back so the
spreadsheet keeps mirroring the table.

## Architecture

### Import pipeline
- **Source adapters** - read the spreadsheet from a local file, the Google
  Sheets API or Google Cloud Storage into a typed `RawTable`
- **Reconciler** - checks the required columns, coerces every row and swaps
  the whole table in one transaction
- **Export** - dumps the table back into spreadsheet shape (CSV, XLSX or
  Sheets values) for downloads and write-back

### Storage Layer
- SQLite through sqlx, table `venda(id, produto, quantidade, categoria)`
- Full replaces are serialised against single-record writes

### Web Layer (feature `web`)
- axum routes, handlebars page template, plotters charts embedded as base64 PNG

## Modules

- **config**: environment configuration
- **error**: the `DashboardError` taxonomy
- **record**: sales records and raw import rows
- **store**: the SQLite record store
- **source**: spreadsheet backends and file decoding
- **reconciler**: the import pipeline
- **export**: spreadsheet-shaped dumps of the store
- **dashboard**: the application context behind every operation
- **graph**: chart aggregation and rendering
- **view**: page rendering
- **app**: routing and middleware

## HTTP Endpoints

- `/` - records table and charts
- `/carregar` - reload from the spreadsheet
- `/excluir/{key}` - delete a record
- `/adicionar` - add a record (form post)
- `/exportar?formato=csv|xlsx` - download the table
- `/healthz` - liveness and database check
*/

pub mod config;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod graph;
pub mod reconciler;
pub mod record;
pub mod source;
pub mod store;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod view;

pub use dashboard::Dashboard;
pub use error::{DashboardError, Result};
pub use record::{NewSalesRecord, SalesRecord};
