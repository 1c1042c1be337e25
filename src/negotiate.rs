// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Reply shape selection and page rendering.
//!
//! Scripts and first-party apps get a plain-text list of links, one per
//! line. Browsers get a rendered confirmation page.

use crate::storage::StoredFile;
use axum::http::{header, HeaderMap};
use serde::Serialize;
use std::time::Duration;
use tera::{Context, Tera};
use url::Url;

/// User-agent substrings of command-line clients.
const CLI_AGENTS: &[&str] = &["curl", "Wget"];

/// `X-Requested-With` values sent by first-party apps.
const APP_CLIENTS: &[&str] = &["NEO", "Bear"];

pub const REQUESTED_WITH: &str = "x-requested-with";
const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Reply shape for a successful upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// Newline-separated absolute links
    PlainText,
    /// Rendered confirmation page
    Html,
}

/// Pick the reply shape from client signalling headers.
pub fn negotiate(headers: &HeaderMap) -> ResponseFormat {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let requested_with = headers
        .get(REQUESTED_WITH)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let is_script = user_agent.is_empty()
        || CLI_AGENTS.iter().any(|agent| user_agent.contains(agent))
        || APP_CLIENTS.contains(&requested_with);

    if is_script {
        ResponseFormat::PlainText
    } else {
        ResponseFormat::Html
    }
}

/// `<scheme>://<host>` links are built on.
///
/// A configured base wins; otherwise the scheme follows `X-Forwarded-Proto`
/// and the host comes from the `Host` header.
pub fn base_url(headers: &HeaderMap, configured: Option<&str>) -> String {
    if let Some(base) = configured {
        return base.trim_end_matches('/').to_string();
    }

    let scheme = match headers.get(FORWARDED_PROTO).and_then(|v| v.to_str().ok()) {
        Some(proto) if proto.trim().eq_ignore_ascii_case("https") => "https",
        _ => "http",
    };
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{scheme}://{host}")
}

/// Absolute link to a stored file: `<base>/f/<id>/<filename>`.
pub fn file_link(base: &str, id: &str, filename: &str) -> String {
    match Url::parse(base) {
        Ok(mut url) if !url.cannot_be_a_base() => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().extend(["f", id, filename]);
            }
            url.to_string()
        }
        _ => format!("{base}/f/{id}/{filename}"),
    }
}

/// Plain-text reply body: one link per line, newline-terminated.
pub fn link_list(base: &str, files: &[StoredFile]) -> String {
    files
        .iter()
        .map(|file| file_link(base, &file.id, &file.filename) + "\n")
        .collect()
}

/// One row of the confirmation page.
#[derive(Debug, Serialize)]
pub struct FileView {
    pub id: String,
    pub filename: String,
    pub mime: String,
    pub size: u64,
    pub link: String,
}

/// Data behind the confirmation page.
#[derive(Debug, Serialize)]
pub struct UploadView {
    pub host: String,
    pub version: &'static str,
    pub ip: String,
    pub files: Vec<FileView>,
    /// Seconds with microsecond precision
    pub request_time: String,
}

impl UploadView {
    pub fn new(host: &str, ip: &str, files: &[StoredFile], elapsed: Duration) -> Self {
        Self {
            host: host.to_string(),
            version: env!("CARGO_PKG_VERSION"),
            ip: ip.to_string(),
            files: files
                .iter()
                .map(|file| FileView {
                    id: file.id.clone(),
                    filename: file.filename.clone(),
                    mime: file.mime.clone(),
                    size: file.size,
                    link: file_link(host, &file.id, &file.filename),
                })
                .collect(),
            request_time: format!("{:.6}", elapsed.as_secs_f64()),
        }
    }
}

/// Built-in page templates.
pub struct Views {
    tera: Tera,
}

impl Views {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("index.html", include_str!("../templates/index.html")),
            ("upload.html", include_str!("../templates/upload.html")),
            ("not_found.html", include_str!("../templates/not_found.html")),
        ])?;
        Ok(Self { tera })
    }

    pub fn render_upload(&self, view: &UploadView) -> Result<String, tera::Error> {
        self.tera
            .render("upload.html", &Context::from_serialize(view)?)
    }

    pub fn render_index(
        &self,
        host: &str,
        max_files: usize,
        max_total_bytes: u64,
    ) -> Result<String, tera::Error> {
        let mut context = Context::new();
        context.insert("host", host);
        context.insert("version", env!("CARGO_PKG_VERSION"));
        context.insert("max_files", &max_files);
        context.insert("max_total_mib", &(max_total_bytes >> 20));
        self.tera.render("index.html", &context)
    }

    pub fn render_not_found(&self) -> Result<String, tera::Error> {
        let mut context = Context::new();
        context.insert("version", env!("CARGO_PKG_VERSION"));
        self.tera.render("not_found.html", &context)
    }
}
