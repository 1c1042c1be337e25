// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the upload path and their HTTP mapping.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// A terminal, user-facing admission rejection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Your IP address has been banned")]
    Banned { ip: String },

    #[error("IP address listed as a spam source: {reason}")]
    Blocklisted { reason: String },

    #[error("Daily upload limit reached")]
    RateLimited { retry_after: Duration },

    #[error("You must wait {} seconds between uploads", .cooldown.as_secs())]
    Cooldown {
        cooldown: Duration,
        retry_after: Duration,
    },

    #[error("Malformed multipart data: {0}")]
    MalformedBody(String),

    #[error("No files were uploaded")]
    NoFiles,

    #[error("Too many files: at most {max} files per upload, got {count}")]
    TooManyFiles { count: usize, max: usize },

    #[error("File type not allowed: {mime}")]
    BadMime { mime: String },

    #[error("Max size exceeded: at most {max} bytes per upload, got {total}")]
    TooLarge { total: u64, max: u64 },
}

impl Rejection {
    /// HTTP status for this rejection.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Banned { .. } | Self::Blocklisted { .. } => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } | Self::Cooldown { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::MalformedBody(_)
            | Self::NoFiles
            | Self::TooManyFiles { .. }
            | Self::BadMime { .. }
            | Self::TooLarge { .. } => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable machine-readable code, also used as the metrics label.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Banned { .. } => "BANNED",
            Self::Blocklisted { .. } => "BLOCKLISTED",
            Self::RateLimited { .. } => "DAILY_QUOTA",
            Self::Cooldown { .. } => "COOLDOWN",
            Self::MalformedBody(_) => "MALFORMED_MULTIPART",
            Self::NoFiles => "NO_FILES",
            Self::TooManyFiles { .. } => "TOO_MANY_FILES",
            Self::BadMime { .. } => "FORBIDDEN_MIME",
            Self::TooLarge { .. } => "MAX_SIZE_EXCEEDED",
        }
    }

    /// Time until the client may retry, for rate-limit rejections.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } | Self::Cooldown { retry_after, .. } => {
                Some(*retry_after)
            }
            _ => None,
        }
    }
}

/// Error type for the upload path.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("failed to reload ban lists: {0}")]
    BanListReload(#[source] std::io::Error),

    #[error("failed to persist upload: {0}")]
    Storage(#[source] std::io::Error),

    #[error("failed to render view: {0}")]
    Render(#[from] tera::Error),
}

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Rejected(rejection) => rejection.status(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Pipeline stage an internal fault happened in.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Rejected(_) => "admission",
            Self::BanListReload(_) => "reputation",
            Self::Storage(_) => "storage",
            Self::Render(_) => "render",
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
}

impl From<&Rejection> for ErrorResponse {
    fn from(rejection: &Rejection) -> Self {
        let mut body = ErrorResponse {
            error: rejection.to_string(),
            code: rejection.code(),
            retry_after_secs: rejection.retry_after().map(retry_secs),
            ip: None,
            reason: None,
            mime: None,
        };
        match rejection {
            Rejection::Banned { ip } => body.ip = Some(ip.clone()),
            Rejection::Blocklisted { reason } => body.reason = Some(reason.clone()),
            Rejection::BadMime { mime } => body.mime = Some(mime.clone()),
            _ => {}
        }
        body
    }
}

/// Whole seconds for `Retry-After`, rounded up so clients never retry early.
fn retry_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        match self {
            UploadError::Rejected(rejection) => {
                let status = rejection.status();
                let body = ErrorResponse::from(&rejection);
                match body.retry_after_secs {
                    Some(secs) => (
                        status,
                        [(header::RETRY_AFTER, secs.to_string())],
                        Json(body),
                    )
                        .into_response(),
                    None => (status, Json(body)).into_response(),
                }
            }
            // Detail stays in the log, never in the response
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "internal error".to_string(),
                    code: "INTERNAL",
                    retry_after_secs: None,
                    ip: None,
                    reason: None,
                    mime: None,
                }),
            )
                .into_response(),
        }
    }
}
