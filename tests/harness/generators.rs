// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test data generators: client addresses, payloads and multipart bodies.

use super::HOST;
use axum::body::Body;
use axum::http::{header, Method, Request};
use std::net::{IpAddr, Ipv4Addr};

pub const BOUNDARY: &str = "----drop-test-boundary-7MA4YWxkTrZu0gW";

/// Generate a pool of IP addresses for testing.
pub fn generate_ips(count: usize) -> Vec<IpAddr> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(10, a, b, c))
        })
        .collect()
}

/// One multipart part.
#[derive(Debug, Clone)]
pub struct Part {
    pub field: &'static str,
    pub filename: Option<String>,
    pub mime: String,
    pub data: Vec<u8>,
}

impl Part {
    /// A part of the `files` field.
    pub fn file(filename: &str, mime: &str, data: impl Into<Vec<u8>>) -> Self {
        Self {
            field: "files",
            filename: Some(filename.to_string()),
            mime: mime.to_string(),
            data: data.into(),
        }
    }

    /// A plain form value.
    pub fn text(field: &'static str, value: &str) -> Self {
        Self {
            field,
            filename: None,
            mime: String::new(),
            data: value.as_bytes().to_vec(),
        }
    }
}

/// Deterministic filler of `len` bytes.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| b'a' + (i % 26) as u8).collect()
}

/// Encode parts as a `multipart/form-data` body delimited by [`BOUNDARY`].
pub fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match &part.filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        part.field, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(format!("Content-Type: {}\r\n", part.mime).as_bytes());
            }
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.field).as_bytes(),
            ),
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// POST `/upload` from `ip` with the given parts.
pub fn upload_request(ip: &str, user_agent: Option<&str>, parts: &[Part]) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(header::HOST, HOST)
        .header("x-forwarded-for", ip)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(agent) = user_agent {
        builder = builder.header(header::USER_AGENT, agent);
    }
    builder.body(Body::from(multipart_body(parts))).unwrap()
}

/// Plain GET of `uri`.
pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::HOST, HOST)
        .body(Body::empty())
        .unwrap()
}

/// Download paths that must never resolve outside the upload root.
pub fn traversal_paths() -> Vec<&'static str> {
    vec![
        "/f/abcde/..%2Fbanned.txt",
        "/f/abcde/%2E%2E",
        "/f/abcde/.hidden",
        "/f/..%2F..%2Fetc/passwd",
        "/f/ABCDE/file.txt",
        "/f/abc/file.txt",
        "/f/abcdef/file.txt",
        "/f/abcde/%00file.txt",
        "/f/abcde/sub%5Cfile.txt",
    ]
}
