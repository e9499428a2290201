//! HTTP server for the query API.
//!
//! # API Endpoints
//!
//! | Method | Path                   | Description                          |
//! |--------|------------------------|--------------------------------------|
//! | GET    | `/`, `/api/status`     | Liveness and whether data is loaded  |
//! | GET    | `/api/data`            | Paginated records                    |
//! | GET    | `/api/data/{id}`       | Record by position                   |
//! | GET    | `/api/data/search`     | Case-insensitive substring search    |
//! | GET    | `/api/data/filter`     | Case-insensitive field equality      |
//! | GET    | `/api/fields`          | Field metadata                       |
//! | GET    | `/api/stats`           | Dataset statistics                   |
//! | GET    | `/api/csv-format`      | Records as string rows               |
//! | GET    | `/api/export`          | Whole artifact                       |
//! | POST   | `/api/upload`          | Raw CSV upload, no type inference    |
//! | POST   | `/api/ingest`          | Schedule a full ingest of a file     |
//! | GET    | `/api/events`          | SSE stream of ingest events          |

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Multipart, Path, Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, sse::KeepAlive, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use std::any::Any;
use std::{convert::Infallible, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};

use super::events::EVENTS;
use super::types::{
    error_response, FilterParams, IngestAccepted, IngestRequest, PageParams, SearchParams, Success,
};
use crate::config::ServerConfig;
use crate::error::{QueryError, ServerResult};
use crate::query::QueryEngine;
use crate::transform::pipeline::IngestWorker;

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: QueryEngine,
    pub worker: IngestWorker,
}

impl AppState {
    pub fn new(engine: QueryEngine) -> Self {
        let worker = IngestWorker::new(engine.store().clone());
        Self { engine, worker }
    }
}

/// Build the router with CORS and panic recovery.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(status))
        .route("/api/status", get(status))
        .route("/api/data", get(paginate))
        .route("/api/data/search", get(search))
        .route("/api/data/filter", get(filter))
        .route("/api/data/{id}", get(get_by_id))
        .route("/api/fields", get(fields))
        .route("/api/stats", get(stats))
        .route("/api/csv-format", get(csv_format))
        .route("/api/export", get(export))
        .route("/api/upload", post(upload))
        .route("/api/ingest", post(ingest))
        .route("/api/events", get(events))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn start_server(config: &ServerConfig, state: AppState) -> ServerResult<()> {
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening on http://{}", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "handler panicked");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, detail)
}

fn bad_query(rejection: QueryRejection) -> QueryError {
    QueryError::BadRequest(rejection.body_text())
}

// =============================================================================
// Handlers
// =============================================================================

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.status())
}

async fn paginate(
    State(state): State<AppState>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<impl IntoResponse, QueryError> {
    let Query(params) = params.map_err(bad_query)?;
    Ok(Success::new(state.engine.paginate(params.page, params.limit)?))
}

async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, QueryError> {
    Ok(Success::new(state.engine.get_by_position(&id)?))
}

async fn search(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<impl IntoResponse, QueryError> {
    let Query(params) = params.map_err(bad_query)?;
    Ok(Success::new(state.engine.search(&params.q)?))
}

async fn filter(
    State(state): State<AppState>,
    params: Result<Query<FilterParams>, QueryRejection>,
) -> Result<impl IntoResponse, QueryError> {
    let Query(params) = params.map_err(bad_query)?;
    Ok(Success::new(state.engine.filter(&params.field, &params.value)?))
}

async fn fields(State(state): State<AppState>) -> Result<impl IntoResponse, QueryError> {
    Ok(Success::new(state.engine.field_info()?))
}

async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, QueryError> {
    Ok(Success::new(state.engine.stats()?))
}

async fn csv_format(State(state): State<AppState>) -> Result<impl IntoResponse, QueryError> {
    Ok(Success::new(state.engine.csv_format()?))
}

async fn export(State(state): State<AppState>) -> Result<impl IntoResponse, QueryError> {
    let artifact = state.engine.export()?;
    Ok(Json(&*artifact).into_response())
}

/// Raw CSV upload from the `file` multipart field.
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, QueryError> {
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| QueryError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            let name = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| QueryError::BadRequest(format!("Read error: {}", e)))?;
            file = Some((name, bytes.to_vec()));
        }
    }

    let (name, bytes) = file.map_or((None, Vec::new()), |(name, bytes)| (Some(name), bytes));
    tracing::info!(
        file = name.as_deref().unwrap_or("-"),
        bytes = bytes.len(),
        "upload received"
    );

    let engine = state.engine.clone();
    let summary = tokio::task::spawn_blocking(move || engine.upload_fallback(name.as_deref(), &bytes))
        .await
        .map_err(|e| QueryError::Internal(e.to_string()))??;

    Ok(Success::new(summary))
}

/// Schedule a background ingest; progress goes to `/api/events`.
async fn ingest(
    State(state): State<AppState>,
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<impl IntoResponse, QueryError> {
    let Json(request) = body.map_err(|e| QueryError::BadRequest(e.body_text()))?;
    request.options.validate().map_err(QueryError::BadRequest)?;
    if !request.path.is_file() {
        return Err(QueryError::BadRequest(format!(
            "File not found: {}",
            request.path.display()
        )));
    }

    let job = state.worker.spawn(request.path.clone(), request.options);
    let accepted = IngestAccepted {
        job_id: job.id,
        message: format!("Ingest of {} scheduled", request.path.display()),
    };
    Ok((StatusCode::ACCEPTED, Success::new(accepted)))
}

/// SSE endpoint for ingest events
async fn events() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = EVENTS.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let json = serde_json::to_string(&event).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        // Lagged subscriber: skip what was missed.
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ArtifactStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> (Router, QueryEngine) {
        let engine = QueryEngine::new(Arc::new(ArtifactStore::new()));
        (router(AppState::new(engine.clone())), engine)
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn multipart(file_name: &str, content: &str) -> Request<Body> {
        let boundary = "XBOUNDARY";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: text/csv\r\n\r\n{c}\r\n--{b}--\r\n",
            b = boundary,
            f = file_name,
            c = content
        );
        Request::post("/api/upload")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_status_without_data() {
        let (app, _) = app();
        let (status, body) = call(app, get("/api/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["data_loaded"], false);
    }

    #[tokio::test]
    async fn test_panic_reports_message() {
        async fn explode() -> &'static str {
            panic!("index out of range at row 7")
        }

        async fn explode_formatted() -> &'static str {
            let row = 9;
            panic!("bad cell at row {}", row)
        }

        let app = Router::new()
            .route("/boom", axum::routing::get(explode))
            .route("/boom-fmt", axum::routing::get(explode_formatted))
            .layer(CatchPanicLayer::custom(panic_response));

        let (status, body) = call(app.clone(), get("/boom")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "index out of range at row 7");

        let (status, body) = call(app, get("/boom-fmt")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "bad cell at row 9");
    }

    #[tokio::test]
    async fn test_data_not_loaded() {
        let (app, _) = app();
        let (status, body) = call(app, get("/api/data")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "No data loaded");
    }

    #[tokio::test]
    async fn test_upload_then_query() {
        let (app, _) = app();

        let (status, body) = call(app.clone(), multipart("codes.csv", "code,name\n007,Bond\n")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["records"], 1);
        assert_eq!(body["fields"], 2);

        let (status, body) = call(app.clone(), get("/api/data/0")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["code"], "007");
        assert_eq!(body["id"], 0);

        let (status, body) = call(app.clone(), get("/api/data/search?q=BOND")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["results"][0]["_id"], 0);

        let (status, _) = call(app.clone(), get("/api/data/search")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(app.clone(), get("/api/data?page=1&limit=10")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["pages"], 1);

        let (status, body) = call(app.clone(), get("/api/data?page=abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _) = call(app, get("/api/data/5")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_rejects_non_csv() {
        let (app, _) = app();
        let (status, body) = call(app, multipart("sheet.xlsx", "a\n1\n")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Only CSV files are supported for upload");
    }

    #[tokio::test]
    async fn test_ingest_missing_file() {
        let (app, _) = app();
        let request = Request::post("/api/ingest")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"path": "/nonexistent/people.csv"}"#))
            .unwrap();
        let (status, body) = call(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_ingest_accepted() {
        use std::io::Write;
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "Name,Age\nBob,30\n").unwrap();

        let (app, engine) = app();
        let body = serde_json::json!({ "path": file.path() }).to_string();
        let request = Request::post("/api/ingest")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        let (status, body) = call(app, request).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(body["job_id"].is_string());

        for _ in 0..200 {
            if engine.store().is_loaded() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(engine.store().is_loaded());
    }
}
