//! On-demand HTTP surface: trigger a cycle, read stored vacancies.

use std::sync::Arc;

use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info};
use vacantes_core::{format_civil_date, VacancyRecord};
use vacantes_storage::VacancyStore;
use vacantes_sync::Pipeline;

pub const CRATE_NAME: &str = "vacantes-web";

pub const DEFAULT_WEB_PORT: u16 = 8000;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

struct VacancyRow {
    code: String,
    title: String,
    location: String,
    vacancy_count: u32,
    application_count: u32,
    closing: String,
    days_remaining: String,
    url: String,
}

impl From<VacancyRecord> for VacancyRow {
    fn from(record: VacancyRecord) -> Self {
        Self {
            closing: record
                .closing_date
                .map(format_civil_date)
                .unwrap_or_else(|| "sin fecha".to_string()),
            days_remaining: record
                .days_remaining
                .map(|d| d.to_string())
                .unwrap_or_default(),
            url: record.url.unwrap_or_default(),
            code: record.code,
            title: record.title,
            location: record.location,
            vacancy_count: record.vacancy_count,
            application_count: record.application_count,
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    today: String,
    rows: Vec<VacancyRow>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/sync", get(sync_handler).post(sync_handler))
        .route("/vacantes", get(vacantes_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(Arc::new(state))
}

pub fn port_from_env() -> u16 {
    std::env::var("VACANTES_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_WEB_PORT)
}

pub async fn serve(pipeline: Arc<Pipeline>, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "web surface listening");
    axum::serve(listener, app(AppState::new(pipeline))).await?;
    Ok(())
}

pub async fn serve_from_env(pipeline: Arc<Pipeline>) -> anyhow::Result<()> {
    serve(pipeline, port_from_env()).await
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Response {
    let records = match state.pipeline.store().list_vacancies().await {
        Ok(records) => records,
        Err(err) => return server_error(anyhow::Error::new(err)),
    };
    render_html(IndexTemplate {
        today: state.pipeline.today().format("%d/%m/%Y").to_string(),
        rows: records.into_iter().map(VacancyRow::from).collect(),
    })
}

/// Runs one cycle, waiting for a scheduled one already in flight.
async fn sync_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.pipeline.run_cycle().await {
        Ok(summary) => Json(summary).into_response(),
        Err(err) => server_error(err),
    }
}

async fn vacantes_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.pipeline.store().list_vacancies().await {
        Ok(records) => Json(records).into_response(),
        Err(err) => server_error(anyhow::Error::new(err)),
    }
}

async fn healthz_handler() -> &'static str {
    "ok"
}

fn render_html<T: Template>(tpl: T) -> Response {
    match tpl.render() {
        Ok(html) => Html(html).into_response(),
        Err(err) => server_error(anyhow::anyhow!(err.to_string())),
    }
}

fn server_error(err: anyhow::Error) -> Response {
    let message = format!("{err:#}");
    error!(error = %message, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}
