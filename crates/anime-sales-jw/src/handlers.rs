use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chart_db::{ExportError, LookupError, SalesDb};
use chart_types::{Field, SalesRecord};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SalesDb>,
    pub max_find_results: usize,
}

#[derive(Deserialize)]
pub struct TitlesQuery {
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct SeriesQuery {
    pub title: Option<String>,
}

#[derive(Deserialize)]
pub struct ExportQuery {
    pub fields: Option<String>,
}

#[derive(Serialize)]
pub struct TitlesResponse {
    query: String,
    total: usize,
    items: Vec<TitleItem>,
}

#[derive(Serialize)]
struct TitleItem {
    title: String,
    id: u32,
}

#[derive(Serialize)]
pub struct SeriesResponse {
    id: u32,
    title: String,
    total_sales: u64,
    records: Vec<RecordItem>,
}

#[derive(Serialize)]
struct RecordItem {
    date: String,
    rank: Option<u32>,
    prev_rank: Option<u32>,
    unknown: Option<u64>,
    sales: Option<u64>,
    cumulative_sales: Option<u64>,
    weeks: Option<u32>,
    raw_title: String,
    season: Option<u32>,
    volume: Option<u32>,
    part: Option<u32>,
    rule: &'static str,
}

impl From<&SalesRecord> for RecordItem {
    fn from(record: &SalesRecord) -> Self {
        RecordItem {
            date: record.date_stamp(),
            rank: record.fields.rank,
            prev_rank: record.fields.prev_rank,
            unknown: record.fields.unknown,
            sales: record.fields.sales,
            cumulative_sales: record.fields.cumulative_sales,
            weeks: record.fields.weeks,
            raw_title: record.fields.raw_title.clone(),
            season: record.title.season,
            volume: record.title.volume,
            part: record.title.part,
            rule: record.title.rule.name(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/titles", get(titles))
        .route("/v1/series", get(series))
        .route("/v1/export/titles.csv", get(export_titles))
        .route("/v1/export/sales.csv", get(export_sales))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    "ok"
}

async fn titles(
    State(state): State<AppState>,
    Query(params): Query<TitlesQuery>,
) -> Json<TitlesResponse> {
    let query = params.q.unwrap_or_default();
    let matches: Vec<_> = state
        .db
        .titles()
        .filter(|(title, _)| title.contains(query.as_str()))
        .collect();
    let total = matches.len();
    let items = matches
        .into_iter()
        .take(state.max_find_results)
        .map(|(title, id)| TitleItem {
            title: title.to_string(),
            id: id.0,
        })
        .collect();

    Json(TitlesResponse {
        query,
        total,
        items,
    })
}

async fn series(
    State(state): State<AppState>,
    Query(params): Query<SeriesQuery>,
) -> Result<Json<SeriesResponse>, ApiError> {
    let title = params
        .title
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request("title is required"))?;
    let history = state.db.series_of(&title)?;

    Ok(Json(SeriesResponse {
        id: history.id.0,
        title: history.title.to_string(),
        total_sales: history.total_sales(),
        records: history.records.iter().map(RecordItem::from).collect(),
    }))
}

async fn export_titles(State(state): State<AppState>) -> Result<Response, ApiError> {
    if state.db.is_empty() {
        return Err(ExportError::NoRecords.into());
    }
    let mut body = Vec::new();
    state
        .db
        .titles_table()
        .write_to(&mut body)
        .map_err(|_| ApiError::Internal)?;
    Ok(csv(body))
}

async fn export_sales(
    State(state): State<AppState>,
    Query(params): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let fields = parse_fields(params.fields.as_deref().unwrap_or_default())?;
    let table = state.db.export(&fields)?;
    let mut body = Vec::new();
    table.write_to(&mut body).map_err(|_| ApiError::Internal)?;
    Ok(csv(body))
}

/// Comma-separated field names; an empty list selects the default columns.
pub fn parse_fields(raw: &str) -> Result<Vec<Field>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            Field::from_name(name)
                .ok_or_else(|| ApiError::bad_request(format!("unknown field: {name}")))
        })
        .collect()
}

fn csv(body: Vec<u8>) -> Response {
    (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/csv; charset=utf-8"),
        )],
        body,
    )
        .into_response()
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        ApiError::BadRequest(msg.into())
    }
}

impl From<LookupError> for ApiError {
    fn from(err: LookupError) -> Self {
        ApiError::NotFound(err.to_string())
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::NoRecords => ApiError::Conflict(err.to_string()),
            ExportError::Io(_) => ApiError::Internal,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal => {
                let body = Json(json!({ "error": "internal server error" }));
                return (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
            }
        };
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}
