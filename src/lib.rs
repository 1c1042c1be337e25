// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Anonymous File Drop
//!
//! This crate provides a public, account-less file drop. Every upload runs
//! through a fixed admission pipeline before anything touches disk:
//!
//! - Local IP and MIME ban lists, re-read on every request
//! - DNS blocklist (DNSBL) lookup of the client address
//! - Per-IP daily upload cap and cooldown between uploads
//! - File count, MIME and aggregate size limits
//!
//! Accepted files land under `<storage>/<id>/<filename>` and are answered
//! with plain-text links for scripts or an HTML page for browsers.

pub mod admission;
pub mod blocklist;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod metrics;
pub mod negotiate;
pub mod reputation;
pub mod sniff;
pub mod storage;

pub use admission::{AdmissionPipeline, FileSource, IncomingFile};
pub use blocklist::{BlocklistOracle, DisabledOracle, DnsblOracle, Lookup, LookupStatus};
pub use config::Config;
pub use error::{Rejection, UploadError};
pub use ledger::{QuotaLedger, QuotaResult};
pub use negotiate::ResponseFormat;
pub use storage::{FileStore, StoredFile};
