// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Per-client upload quota.
//!
//! Each client IP (in its raw string form) gets one record holding the
//! number of uploads accepted on the current calendar day and the instant of
//! the last accepted upload. Two limits apply:
//!
//! 1. A daily cap, reset when the local calendar date changes (not a rolling
//!    24h window).
//! 2. A cooldown between consecutive accepted uploads.
//!
//! The check and the update happen under one lock, so two concurrent
//! requests from the same client can never both pass against a stale record.

use crate::config::QuotaConfig;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Result of a quota check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaResult {
    /// Upload is allowed and has been recorded
    Allowed {
        /// Uploads accepted today, including this one
        uploads_today: u32,
    },
    /// Upload is refused; the record is unchanged
    Limited {
        /// Which limit was hit
        reason: QuotaReason,
        /// Time until the limit no longer applies
        retry_after: Duration,
    },
}

/// Reason for a quota refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaReason {
    /// Daily upload cap reached
    DailyLimit,
    /// Previous upload was too recent
    Cooldown,
}

impl std::fmt::Display for QuotaReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DailyLimit => write!(f, "Daily upload limit reached"),
            Self::Cooldown => write!(f, "Upload cooldown in effect"),
        }
    }
}

/// Quota state for one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    pub uploads_today: u32,
    pub last_upload_at: DateTime<Local>,
}

/// Thread-safe quota ledger keyed by client IP string.
pub struct QuotaLedger {
    config: QuotaConfig,
    clients: Mutex<HashMap<String, ClientRecord>>,
}

impl QuotaLedger {
    pub fn new(config: QuotaConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Check both limits for `ip` at `now` and record the upload if allowed.
    pub async fn check_and_record(&self, ip: &str, now: DateTime<Local>) -> QuotaResult {
        let mut clients = self.clients.lock().await;

        let Some(record) = clients.get_mut(ip) else {
            clients.insert(
                ip.to_string(),
                ClientRecord {
                    uploads_today: 1,
                    last_upload_at: now,
                },
            );
            return QuotaResult::Allowed { uploads_today: 1 };
        };

        let same_day = record.last_upload_at.date_naive() == now.date_naive();

        if same_day && record.uploads_today >= self.config.max_uploads_per_day {
            debug!(%ip, uploads_today = record.uploads_today, "Daily limit reached");
            return QuotaResult::Limited {
                reason: QuotaReason::DailyLimit,
                retry_after: until_next_day(now),
            };
        }

        let cooldown = self.config.cooldown_duration();
        let elapsed = elapsed_since(record.last_upload_at, now);
        if elapsed < cooldown {
            let retry_after = cooldown - elapsed;
            debug!(%ip, ?retry_after, "Cooldown in effect");
            return QuotaResult::Limited {
                reason: QuotaReason::Cooldown,
                retry_after,
            };
        }

        record.uploads_today = if same_day { record.uploads_today + 1 } else { 1 };
        record.last_upload_at = now;
        QuotaResult::Allowed {
            uploads_today: record.uploads_today,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.config.cooldown_duration()
    }

    /// Current record for `ip`, if any.
    pub async fn record(&self, ip: &str) -> Option<ClientRecord> {
        self.clients.lock().await.get(ip).cloned()
    }

    /// Number of tracked clients.
    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }

    /// Drop records that can no longer influence a verdict.
    ///
    /// A record from an earlier calendar day whose cooldown has expired
    /// behaves exactly like a missing one: the next upload is accepted and
    /// counted as the first of the day. Returns the number of records removed.
    pub async fn cleanup(&self, now: DateTime<Local>) -> usize {
        let cooldown = self.config.cooldown_duration();
        let today = now.date_naive();

        let mut clients = self.clients.lock().await;
        let before = clients.len();
        clients.retain(|_, record| {
            record.last_upload_at.date_naive() == today
                || elapsed_since(record.last_upload_at, now) < cooldown
        });
        before - clients.len()
    }
}

/// Time from `earlier` to `now`, zero if the clock went backwards.
fn elapsed_since(earlier: DateTime<Local>, now: DateTime<Local>) -> Duration {
    (now - earlier).to_std().unwrap_or(Duration::ZERO)
}

/// Time until the next local midnight.
fn until_next_day(now: DateTime<Local>) -> Duration {
    now.date_naive()
        .succ_opt()
        .and_then(|tomorrow| tomorrow.and_hms_opt(0, 0, 0))
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .and_then(|midnight| (midnight - now).to_std().ok())
        .unwrap_or(Duration::from_secs(24 * 60 * 60))
}
