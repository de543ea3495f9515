use std::sync::Arc;
use std::time::Instant;

use axum::{
    Form, Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::error::{DashboardError, Result};
use crate::graph;
use crate::view::{IndexPage, PageRenderer};

pub struct AppState {
    pub dashboard: Dashboard,
    pages: PageRenderer,
}

impl AppState {
    pub fn new(dashboard: Dashboard) -> Result<Self> {
        Ok(AppState {
            dashboard,
            pages: PageRenderer::new()?,
        })
    }

    /// Renders the index page, optionally with an error banner.
    async fn render_index(&self, banner: Option<String>) -> Result<String> {
        let records = self.dashboard.records().await?;
        let charts = {
            let records = records.clone();
            tokio::task::spawn_blocking(move || graph::render_all(&records))
                .await
                .map_err(|e| DashboardError::Render(format!("chart task failed: {}", e)))?
        };
        let last_import = self.dashboard.last_import().await;

        let mut page = IndexPage::new(
            self.dashboard.source_description(),
            &records,
            &charts,
            last_import.as_ref(),
            self.dashboard.config().delete_by_product,
        );
        if let Some(message) = banner {
            page = page.with_error(message);
        }
        self.pages.render(&page)
    }
}

#[derive(Deserialize)]
struct AddForm {
    #[serde(default)]
    produto: String,
    #[serde(default)]
    quantidade: String,
    #[serde(default)]
    categoria: String,
}

#[derive(Deserialize)]
struct ExportQuery {
    formato: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

/// Starts the dashboard on the configured address and serves until shutdown.
pub async fn run(config: Config) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let addr = config.listen_addr();
    let dashboard = Dashboard::new(config).await?;
    let state = Arc::new(AppState::new(dashboard)?);

    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, router(state)).await?;

    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    let static_dir = state.dashboard.config().static_dir.clone();

    Router::new()
        .route("/", get(index))
        .route("/carregar", get(reload))
        .route("/excluir/:key", get(delete))
        .route("/adicionar", post(add))
        .route("/healthz", get(health))
        .route("/exportar", get(export))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(middleware::from_fn(request_logger))
        .with_state(state)
}

async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>> {
    Ok(Html(state.render_index(None).await?))
}

async fn reload(State(state): State<Arc<AppState>>) -> Response {
    match state.dashboard.reload().await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(e) => {
            error!("Reload failed: {}", e);
            let banner = format!("Erro ao carregar a planilha: {}", e);
            match state.render_index(Some(banner)).await {
                Ok(page) => (StatusCode::INTERNAL_SERVER_ERROR, Html(page)).into_response(),
                Err(_) => e.into_response(),
            }
        }
    }
}

async fn delete(State(state): State<Arc<AppState>>, Path(key): Path<String>) -> Result<Redirect> {
    state.dashboard.delete(&key).await?;
    Ok(Redirect::to("/"))
}

async fn add(State(state): State<Arc<AppState>>, Form(form): Form<AddForm>) -> Result<Redirect> {
    state
        .dashboard
        .add_record(&form.produto, &form.quantidade, &form.categoria)
        .await?;
    Ok(Redirect::to("/"))
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    match state.dashboard.health().await {
        Ok(()) => Json(HealthResponse {
            status: "ok",
            detail: None,
        })
        .into_response(),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthResponse {
                    status: "error",
                    detail: Some(e.to_string()),
                }),
            )
                .into_response()
        }
    }
}

async fn export(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExportQuery>,
) -> Result<Response> {
    let format = query.formato.unwrap_or_else(|| "csv".to_string());
    let table = state.dashboard.export().await?;

    let (bytes, content_type, filename) = match format.to_ascii_lowercase().as_str() {
        "csv" => (table.to_csv()?, "text/csv; charset=utf-8", "vendas.csv"),
        "xlsx" => (
            table.to_xlsx()?,
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "vendas.xlsx",
        ),
        other => {
            return Err(DashboardError::Validation(format!(
                "unknown export format {:?} (expected csv or xlsx)",
                other
            )));
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Logs method, path, status and latency of every request.
async fn request_logger(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;
    let status = response.status();
    let elapsed = start.elapsed().as_millis();

    if status.is_server_error() {
        warn!("{} {} {} {}ms", method, path, status.as_u16(), elapsed);
    } else {
        info!("{} {} {} {}ms", method, path, status.as_u16(), elapsed);
    }
    response
}
