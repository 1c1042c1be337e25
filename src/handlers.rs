// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers and router for the file drop service.

use crate::admission::AdmissionPipeline;
use crate::config::Config;
use crate::error::UploadError;
use crate::metrics::Metrics;
use crate::negotiate::{base_url, link_list, negotiate, ResponseFormat, UploadView, Views};
use crate::sniff::{detect_content_type, SNIFF_LEN};
use axum::{
    body::Body,
    extract::{
        multipart::MultipartRejection, ConnectInfo, DefaultBodyLimit, Multipart, Path, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use serde::Serialize;
use std::io::SeekFrom;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Shared application state.
pub struct AppState {
    pub pipeline: AdmissionPipeline,
    pub views: Views,
    pub metrics: Metrics,
    pub config: Config,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    let csp = state
        .config
        .csp_header
        .as_deref()
        .and_then(|value| match HeaderValue::from_str(value) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(value, "Ignoring invalid CSP header value");
                None
            }
        });
    let body_limit = state.config.upload.max_request_bytes;

    let router = Router::new()
        .route("/", get(index).post(upload))
        .route("/upload", post(upload))
        .route("/f/:id/:filename", get(serve_file))
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    match csp {
        Some(value) => router.layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            value,
        )),
        None => router,
    }
}

/// Client address used for bans and quota.
///
/// The first `X-Forwarded-For` entry wins over the TCP peer.
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string())
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "anon-file-drop",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Prometheus metrics endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.encode() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Landing page.
pub async fn index(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let host = base_url(&headers, state.config.public_base_url.as_deref());
    match state.views.render_index(
        &host,
        state.config.upload.max_files,
        state.config.upload.max_total_bytes,
    ) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render landing page");
            UploadError::Render(e).into_response()
        }
    }
}

/// Upload endpoint: admission, persistence and reply negotiation.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    mut body: Result<Multipart, MultipartRejection>,
) -> Response {
    let started = Instant::now();
    let ip = client_ip(&headers, peer);

    let stored = match state.pipeline.upload(&ip, Local::now(), &mut body).await {
        Ok(stored) => stored,
        Err(e) => return failure(&state, &ip, e),
    };
    state.metrics.record_accepted(&stored);

    let base = base_url(&headers, state.config.public_base_url.as_deref());
    match negotiate(&headers) {
        ResponseFormat::PlainText => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            link_list(&base, &stored),
        )
            .into_response(),
        ResponseFormat::Html => {
            let view = UploadView::new(&base, &ip, &stored, started.elapsed());
            match state.views.render_upload(&view) {
                Ok(html) => Html(html).into_response(),
                Err(e) => failure(&state, &ip, e.into()),
            }
        }
    }
}

fn failure(state: &AppState, ip: &str, err: UploadError) -> Response {
    match err.rejection() {
        Some(rejection) => state.metrics.record_rejection(rejection),
        None => {
            error!(%ip, stage = err.stage(), error = %err, "Upload failed");
            state.metrics.record_internal(err.stage());
        }
    }
    err.into_response()
}

/// Serve a stored file with a content type sniffed from its bytes.
pub async fn serve_file(
    State(state): State<Arc<AppState>>,
    Path((id, filename)): Path<(String, String)>,
) -> Response {
    let Some(path) = state.pipeline.store().locate(&id, &filename) else {
        return not_found(State(state)).await;
    };

    let mut file = match File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return not_found(State(state)).await;
        }
        Err(e) => return read_failure(&path, e),
    };
    let len = match file.metadata().await {
        Ok(meta) if meta.is_file() => meta.len(),
        Ok(_) => return not_found(State(state)).await,
        Err(e) => return read_failure(&path, e),
    };

    let mut head = Vec::with_capacity(SNIFF_LEN);
    if let Err(e) = (&mut file).take(SNIFF_LEN as u64).read_to_end(&mut head).await {
        return read_failure(&path, e);
    }
    if let Err(e) = file.seek(SeekFrom::Start(0)).await {
        return read_failure(&path, e);
    }

    (
        [
            (header::CONTENT_TYPE, detect_content_type(&head)),
            (header::CONTENT_LENGTH, len.to_string()),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response()
}

fn read_failure(path: &std::path::Path, e: std::io::Error) -> Response {
    error!(path = %path.display(), error = %e, "Failed to read stored file");
    UploadError::Storage(e).into_response()
}

/// Fallback for unknown routes and missing files.
pub async fn not_found(State(state): State<Arc<AppState>>) -> Response {
    match state.views.render_not_found() {
        Ok(html) => (StatusCode::NOT_FOUND, Html(html)).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render not-found page");
            (StatusCode::NOT_FOUND, "Not found").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, peer), "127.0.0.1");

        headers.insert(
            FORWARDED_FOR,
            HeaderValue::from_static("203.0.113.5, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers, peer), "203.0.113.5");
    }

    #[test]
    fn test_client_ip_ignores_empty_forwarded_for() {
        let peer: SocketAddr = "[2001:db8::7]:443".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR, HeaderValue::from_static(" , 10.0.0.1"));
        assert_eq!(client_ip(&headers, peer), "2001:db8::7");
    }
}
