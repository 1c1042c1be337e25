// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Content-type inference from a file's leading bytes.
//!
//! The client-declared MIME type is never trusted for serving.

/// Bytes inspected when sniffing.
pub const SNIFF_LEN: usize = 512;

const OCTET_STREAM: &str = "application/octet-stream";
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";

const HTML_PREFIXES: &[&[u8]] = &[
    b"<!doctype html",
    b"<html",
    b"<head",
    b"<body",
    b"<script",
    b"<iframe",
    b"<svg",
];

/// Infer a content type from up to [`SNIFF_LEN`] leading bytes.
pub fn detect_content_type(head: &[u8]) -> String {
    let head = &head[..head.len().min(SNIFF_LEN)];

    // Markup first: infer's own text matchers report HTML without a charset
    let trimmed = trim_leading_whitespace(head);
    if HTML_PREFIXES.iter().any(|prefix| starts_with_ignore_case(trimmed, prefix)) {
        return TEXT_HTML.to_string();
    }

    if let Some(kind) = infer::get(head) {
        return kind.mime_type().to_string();
    }

    if looks_like_text(head) {
        TEXT_PLAIN.to_string()
    } else {
        OCTET_STREAM.to_string()
    }
}

fn trim_leading_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

fn starts_with_ignore_case(haystack: &[u8], prefix: &[u8]) -> bool {
    haystack.len() >= prefix.len() && haystack[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// UTF-8 without NUL bytes counts as text.
///
/// The sniff window may cut a multi-byte sequence, which is tolerated.
fn looks_like_text(head: &[u8]) -> bool {
    if head.is_empty() {
        return true;
    }
    if head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none() && e.valid_up_to() + 4 > head.len(),
    }
}
