// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Upload admission pipeline.
//!
//! Every upload request runs the same fixed sequence and stops at the first
//! failing step:
//!
//! 1. Reload the ban lists
//! 2. Local IP ban check
//! 3. DNS blocklist lookup
//! 4. Quota check-and-record
//! 5. Multipart body parse
//! 6. File count bound
//! 7. Per-file MIME check
//! 8. Aggregate size check
//!
//! Steps 1-3 never mutate state. Nothing is written to disk before step 8
//! has passed.

use crate::blocklist::{BlocklistOracle, LookupStatus};
use crate::config::{Config, FailurePolicy};
use crate::error::{Rejection, UploadError};
use crate::ledger::{QuotaLedger, QuotaReason, QuotaResult};
use crate::reputation::ReputationStore;
use crate::storage::{FileStore, StoredFile, UploadFile};
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::Multipart;
use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Multipart field carrying uploaded files.
pub const FILES_FIELD: &str = "files";

/// One file part as received from the client.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub filename: String,
    pub mime: String,
    pub data: Bytes,
}

impl IncomingFile {
    pub fn new(filename: impl Into<String>, mime: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            mime: mime.into(),
            data: data.into(),
        }
    }
}

/// A stream of uploaded files, read only once admission reaches the body.
#[async_trait]
pub trait FileSource: Send {
    /// Next file of the upload field, `None` once the body is exhausted.
    async fn next_file(&mut self) -> Result<Option<IncomingFile>, String>;
}

#[async_trait]
impl FileSource for Multipart {
    async fn next_file(&mut self) -> Result<Option<IncomingFile>, String> {
        while let Some(field) = self.next_field().await.map_err(|e| e.body_text())? {
            // Plain form values and other fields are skipped
            if field.name() != Some(FILES_FIELD) {
                continue;
            }
            let Some(filename) = field.file_name().map(str::to_string) else {
                continue;
            };
            let mime = field.content_type().unwrap_or_default().to_string();
            let data = field.bytes().await.map_err(|e| e.body_text())?;
            return Ok(Some(IncomingFile {
                filename,
                mime,
                data,
            }));
        }
        Ok(None)
    }
}

/// A body that is not multipart at all fails at the parse step, after the
/// reputation and quota checks have run.
#[async_trait]
impl FileSource for Result<Multipart, MultipartRejection> {
    async fn next_file(&mut self) -> Result<Option<IncomingFile>, String> {
        match self {
            Ok(multipart) => multipart.next_file().await,
            Err(rejection) => Err(rejection.body_text()),
        }
    }
}

#[async_trait]
impl FileSource for std::vec::IntoIter<IncomingFile> {
    async fn next_file(&mut self) -> Result<Option<IncomingFile>, String> {
        Ok(self.next())
    }
}

/// A batch that passed every admission step.
#[derive(Debug, Clone)]
pub struct AdmittedBatch {
    pub files: Vec<UploadFile>,
    pub total_bytes: u64,
}

/// Orchestrates reputation, blocklist, quota and file validation.
pub struct AdmissionPipeline {
    reputation: ReputationStore,
    oracle: Arc<dyn BlocklistOracle>,
    on_blocklist_error: FailurePolicy,
    ledger: QuotaLedger,
    store: FileStore,
    max_files: usize,
    max_total_bytes: u64,
}

impl AdmissionPipeline {
    pub fn new(config: &Config, oracle: Arc<dyn BlocklistOracle>) -> Self {
        Self {
            reputation: ReputationStore::new(&config.reputation),
            oracle,
            on_blocklist_error: config.blocklist.on_error,
            ledger: QuotaLedger::new(config.quota.clone()),
            store: FileStore::new(&config.upload.storage_dir, config.upload.max_total_bytes),
            max_files: config.upload.max_files,
            max_total_bytes: config.upload.max_total_bytes,
        }
    }

    pub fn reputation(&self) -> &ReputationStore {
        &self.reputation
    }

    pub fn ledger(&self) -> &QuotaLedger {
        &self.ledger
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Run every admission step for one request.
    pub async fn admit<S: FileSource>(
        &self,
        client_ip: &str,
        now: DateTime<Local>,
        source: &mut S,
    ) -> Result<AdmittedBatch, UploadError> {
        let ban_lists = self
            .reputation
            .reload()
            .await
            .map_err(UploadError::BanListReload)?;

        if ban_lists.is_banned_ip(client_ip) {
            warn!(ip = %client_ip, "Banned IP, request discarded");
            return Err(Rejection::Banned {
                ip: client_ip.to_string(),
            }
            .into());
        }

        let lookup = self.oracle.lookup(client_ip).await;
        match lookup.status {
            LookupStatus::Pass => {}
            LookupStatus::Fail => {
                warn!(ip = %client_ip, reason = %lookup.reason, "Rejected by blocklist");
                return Err(Rejection::Blocklisted {
                    reason: lookup.reason,
                }
                .into());
            }
            LookupStatus::Error => match self.on_blocklist_error {
                FailurePolicy::Allow => {
                    warn!(ip = %client_ip, error = %lookup.reason, "Blocklist lookup failed, admitting");
                }
                FailurePolicy::Deny => {
                    warn!(ip = %client_ip, error = %lookup.reason, "Blocklist lookup failed, rejecting");
                    return Err(Rejection::Blocklisted {
                        reason: format!("blocklist lookup failed: {}", lookup.reason),
                    }
                    .into());
                }
            },
        }

        match self.ledger.check_and_record(client_ip, now).await {
            QuotaResult::Allowed { uploads_today } => {
                debug!(ip = %client_ip, uploads_today, "Quota check passed");
            }
            QuotaResult::Limited { reason, retry_after } => {
                info!(ip = %client_ip, %reason, retry_after_secs = retry_after.as_secs(), "Quota exceeded");
                let rejection = match reason {
                    QuotaReason::DailyLimit => Rejection::RateLimited { retry_after },
                    QuotaReason::Cooldown => Rejection::Cooldown {
                        cooldown: self.ledger.cooldown(),
                        retry_after,
                    },
                };
                return Err(rejection.into());
            }
        }

        let mut incoming = Vec::new();
        loop {
            match source.next_file().await {
                Ok(Some(file)) => incoming.push(file),
                Ok(None) => break,
                Err(e) => {
                    info!(ip = %client_ip, error = %e, "Malformed multipart body");
                    return Err(Rejection::MalformedBody(e).into());
                }
            }
        }

        if incoming.is_empty() {
            info!(ip = %client_ip, "No files uploaded");
            return Err(Rejection::NoFiles.into());
        }
        if incoming.len() > self.max_files {
            info!(ip = %client_ip, count = incoming.len(), "Too many files");
            return Err(Rejection::TooManyFiles {
                count: incoming.len(),
                max: self.max_files,
            }
            .into());
        }

        let mut files = Vec::with_capacity(incoming.len());
        let mut total_bytes = 0u64;
        for file in incoming {
            if ban_lists.is_banned_mime(&file.mime) {
                warn!(ip = %client_ip, mime = %file.mime, "Forbidden MIME type");
                return Err(Rejection::BadMime { mime: file.mime }.into());
            }
            let file = UploadFile::new(&file.filename, file.mime, file.data);
            total_bytes += file.size();
            files.push(file);
        }

        if total_bytes > self.max_total_bytes {
            info!(ip = %client_ip, total_bytes, "Max size exceeded");
            return Err(Rejection::TooLarge {
                total: total_bytes,
                max: self.max_total_bytes,
            }
            .into());
        }

        Ok(AdmittedBatch { files, total_bytes })
    }

    /// Admit a request and persist its files.
    pub async fn upload<S: FileSource>(
        &self,
        client_ip: &str,
        now: DateTime<Local>,
        source: &mut S,
    ) -> Result<Vec<StoredFile>, UploadError> {
        let batch = self.admit(client_ip, now, source).await?;
        for file in &batch.files {
            info!(ip = %client_ip, filename = %file.filename, size = file.size(), "Uploading");
        }
        let stored = self.store.persist(batch.files).await?;
        info!(ip = %client_ip, files = stored.len(), "Upload accepted");
        Ok(stored)
    }
}
