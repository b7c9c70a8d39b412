//! HTTP upload surface for summit.
//!
//! Accepts multipart PDF uploads and returns either a compressed copy or a
//! copy annotated with section summaries in the page margins.

mod upload;

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Json, Multipart, State};
use axum::http::header::{
    CONTENT_DISPOSITION, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use serde::Serialize;
use summit_core::{ControlError, SummitControlPlane};
use summit_model::defaults::{MAX_UPLOAD_BYTES, PDF_CONTENT_TYPE};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

pub use upload::UploadError;

const INDEX_HTML: &str = include_str!("../assets/index.html");
const API_HTML: &str = include_str!("../assets/api.html");

/// Extra room above the upload limit for multipart framing.
const TRANSPORT_SLACK_BYTES: usize = 1024 * 1024;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const ORIGINAL_SIZE_HEADER: &str = "x-original-size";
pub const COMPRESSED_SIZE_HEADER: &str = "x-compressed-size";
pub const SECTIONS_HEADER: &str = "x-sections";
pub const SUMMARIZED_SECTIONS_HEADER: &str = "x-summarized-sections";

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub addr: SocketAddr,
    pub max_upload_bytes: usize,
    pub request_timeout: Duration,
    pub debug: bool,
    pub cors_origins: Vec<String>,
}

impl HttpServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            request_timeout: Duration::from_secs(120),
            debug: false,
            cors_origins: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn with_cors_origins(mut self, cors_origins: Vec<String>) -> Self {
        self.cors_origins = cors_origins;
        self
    }

    const fn transport_limit(&self) -> usize {
        self.max_upload_bytes.saturating_add(TRANSPORT_SLACK_BYTES)
    }
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([0, 0, 0, 0], 8000)))
    }
}

/// HTTP server wrapper.
pub struct SummitServer {
    config: HttpServerConfig,
    control: SummitControlPlane,
}

impl SummitServer {
    #[must_use]
    pub const fn new(control: SummitControlPlane, config: HttpServerConfig) -> Self {
        Self { config, control }
    }

    /// Runs the HTTP server until shutdown.
    ///
    /// # Errors
    /// Returns any listener or server error.
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.config.addr;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let app = build_router(self.control, &self.config);

        info!("summit listening on {addr}");
        axum::serve(listener, app).await?;
        Ok(())
    }
}

#[derive(Clone)]
struct AppState {
    control: SummitControlPlane,
    max_upload_bytes: usize,
    request_timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn timeout() -> Self {
        Self {
            status: StatusCode::REQUEST_TIMEOUT,
            message: "processing the PDF took too long".to_string(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        Self {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        if err.is_client_error() {
            Self::bad_request(err.to_string())
        } else {
            Self::internal(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = %self.status, error = %self.message, "request failed");
        }
        let payload = Json(ErrorResponse { error: self.message });
        (self.status, payload).into_response()
    }
}

/// Builds the application router.
#[must_use]
pub fn build_router(control: SummitControlPlane, config: &HttpServerConfig) -> Router {
    let state = AppState {
        control,
        max_upload_bytes: config.max_upload_bytes,
        request_timeout: config.request_timeout,
    };

    Router::new()
        .route("/", get(index))
        .route("/api/", get(api_docs))
        .route("/health", get(health))
        .route("/api/compress/", post(compress))
        .route("/api/compress", post(compress))
        .route("/api/summarize/", post(summarize))
        .route("/api/summarize", post(summarize))
        .layer(DefaultBodyLimit::max(config.transport_limit()))
        .layer(cors_layer(config))
        .layer(SetResponseHeaderLayer::if_not_present(
            X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &HttpServerConfig) -> CorsLayer {
    if config.debug {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .expose_headers([
            CONTENT_DISPOSITION,
            HeaderName::from_static(REQUEST_ID_HEADER),
            HeaderName::from_static(ORIGINAL_SIZE_HEADER),
            HeaderName::from_static(COMPRESSED_SIZE_HEADER),
            HeaderName::from_static(SECTIONS_HEADER),
            HeaderName::from_static(SUMMARIZED_SECTIONS_HEADER),
        ])
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn api_docs() -> Html<&'static str> {
    Html(API_HTML)
}

async fn health() -> &'static str {
    "ok"
}

async fn compress(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let upload = upload::read_pdf(multipart, state.max_upload_bytes).await?;
    let request_id = Uuid::new_v4();
    let span = info_span!("compress", %request_id, file = %upload.file_name, bytes = upload.bytes.len());

    let compressed = tokio::time::timeout(state.request_timeout, state.control.compress(upload))
        .instrument(span)
        .await
        .map_err(|_| ApiError::timeout())??;

    let mut headers = pdf_headers(&compressed.file_name, request_id);
    insert_header(&mut headers, ORIGINAL_SIZE_HEADER, compressed.report.original_bytes);
    insert_header(&mut headers, COMPRESSED_SIZE_HEADER, compressed.report.compressed_bytes);
    Ok((StatusCode::OK, headers, compressed.bytes).into_response())
}

async fn summarize(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let upload = upload::read_pdf(multipart, state.max_upload_bytes).await?;
    let request_id = Uuid::new_v4();
    let span = info_span!("summarize", %request_id, file = %upload.file_name, bytes = upload.bytes.len());

    let summarized = tokio::time::timeout(state.request_timeout, state.control.summarize(upload))
        .instrument(span)
        .await
        .map_err(|_| ApiError::timeout())??;

    let mut headers = pdf_headers(&summarized.file_name, request_id);
    insert_header(&mut headers, SECTIONS_HEADER, summarized.report.section_count);
    insert_header(
        &mut headers,
        SUMMARIZED_SECTIONS_HEADER,
        summarized.report.summarized_count,
    );
    Ok((StatusCode::OK, headers, summarized.bytes).into_response())
}

fn pdf_headers(file_name: &str, request_id: Uuid) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(PDF_CONTENT_TYPE));
    let ascii_name: String = file_name
        .chars()
        .map(|ch| if ch.is_ascii_graphic() || ch == ' ' { ch } else { '_' })
        .collect();
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{ascii_name}\"")) {
        headers.insert(CONTENT_DISPOSITION, value);
    }
    insert_header(&mut headers, REQUEST_ID_HEADER, request_id);
    headers
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: impl ToString) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        headers.insert(HeaderName::from_static(name), value);
    }
}
