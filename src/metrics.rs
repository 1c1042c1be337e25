// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus counters for admission outcomes.

use crate::error::Rejection;
use crate::storage::StoredFile;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    uploads_accepted: IntCounter,
    files_stored: IntCounter,
    bytes_stored: IntCounter,
    rejections: IntCounterVec,
    internal_errors: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let uploads_accepted =
            IntCounter::new("uploads_accepted_total", "Upload requests fully persisted")?;
        let files_stored = IntCounter::new("files_stored_total", "Files written to storage")?;
        let bytes_stored = IntCounter::new("bytes_stored_total", "Bytes written to storage")?;
        let rejections = IntCounterVec::new(
            Opts::new("upload_rejections_total", "Upload requests rejected by admission"),
            &["reason"],
        )?;
        let internal_errors = IntCounterVec::new(
            Opts::new("upload_internal_errors_total", "Upload requests failed by internal faults"),
            &["stage"],
        )?;

        registry.register(Box::new(uploads_accepted.clone()))?;
        registry.register(Box::new(files_stored.clone()))?;
        registry.register(Box::new(bytes_stored.clone()))?;
        registry.register(Box::new(rejections.clone()))?;
        registry.register(Box::new(internal_errors.clone()))?;

        Ok(Self {
            registry,
            uploads_accepted,
            files_stored,
            bytes_stored,
            rejections,
            internal_errors,
        })
    }

    pub fn record_accepted(&self, files: &[StoredFile]) {
        self.uploads_accepted.inc();
        self.files_stored.inc_by(files.len() as u64);
        self.bytes_stored.inc_by(files.iter().map(|f| f.size).sum());
    }

    pub fn record_rejection(&self, rejection: &Rejection) {
        self.rejections.with_label_values(&[rejection.code()]).inc();
    }

    pub fn record_internal(&self, stage: &str) {
        self.internal_errors.with_label_values(&[stage]).inc();
    }

    /// Render all metrics in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
