// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the file drop service.
//!
//! Defaults match the admission limits the service has always enforced:
//! 100 uploads per client per day, 10 seconds between uploads, at most
//! 3 files and 100 MiB per request.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the file drop service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Fixed `<scheme>://<host>` used for links. Derived per request when unset.
    #[serde(default)]
    pub public_base_url: Option<String>,

    /// Content-Security-Policy header value set on every response
    #[serde(default)]
    pub csp_header: Option<String>,

    /// Ban list sources
    #[serde(default)]
    pub reputation: ReputationConfig,

    /// Blocklist (DNSBL) configuration
    #[serde(default)]
    pub blocklist: BlocklistConfig,

    /// Per-client quota configuration
    #[serde(default)]
    pub quota: QuotaConfig,

    /// Upload limits and storage location
    #[serde(default)]
    pub upload: UploadConfig,
}

/// Locations of the line-oriented ban lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationConfig {
    /// Banned IP literals, one per line (default: banned.txt)
    #[serde(default = "default_banned_ips_file")]
    pub banned_ips_file: PathBuf,

    /// Banned MIME types, one per line (default: banned-mimes.txt)
    #[serde(default = "default_banned_mimes_file")]
    pub banned_mimes_file: PathBuf,
}

/// What to do when the blocklist lookup itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Treat lookup errors as a pass (fail-open)
    Allow,
    /// Treat lookup errors as a rejection (fail-closed)
    Deny,
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" | "open" => Ok(Self::Allow),
            "deny" | "closed" => Ok(Self::Deny),
            other => Err(format!("unknown blocklist failure policy: {other}")),
        }
    }
}

/// DNS blocklist configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlocklistConfig {
    /// Consult the blocklist at all (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// DNSBL zone queried as `<reversed-ip>.<zone>` (default: all.s5h.net)
    #[serde(default = "default_dnsbl_zone")]
    pub zone: String,

    /// Recursive resolver queried over UDP (default: 1.1.1.1:53)
    #[serde(default = "default_dnsbl_resolver")]
    pub resolver: String,

    /// Per-query timeout in milliseconds (default: 2000)
    #[serde(default = "default_dnsbl_timeout_ms")]
    pub timeout_ms: u64,

    /// Behaviour on lookup errors (default: allow)
    #[serde(default = "default_failure_policy")]
    pub on_error: FailurePolicy,
}

/// Per-client quota configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Accepted uploads per client per calendar day (default: 100)
    #[serde(default = "default_max_uploads_per_day")]
    pub max_uploads_per_day: u32,

    /// Minimum seconds between accepted uploads (default: 10)
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

/// Upload limits and storage location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Base directory holding `<id>/<filename>` (default: f)
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Maximum files per request (default: 3)
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Aggregate size ceiling per request in bytes (default: 100 MiB)
    #[serde(default = "default_max_total_bytes")]
    pub max_total_bytes: u64,

    /// Bound on the multipart body read into memory (default: 128 MiB)
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_banned_ips_file() -> PathBuf {
    PathBuf::from("banned.txt")
}

fn default_banned_mimes_file() -> PathBuf {
    PathBuf::from("banned-mimes.txt")
}

fn default_true() -> bool {
    true
}

fn default_dnsbl_zone() -> String {
    "all.s5h.net".to_string()
}

fn default_dnsbl_resolver() -> String {
    "1.1.1.1:53".to_string()
}

fn default_dnsbl_timeout_ms() -> u64 {
    2000
}

fn default_failure_policy() -> FailurePolicy {
    FailurePolicy::Allow
}

fn default_max_uploads_per_day() -> u32 {
    100
}

fn default_cooldown_secs() -> u64 {
    10
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("f")
}

fn default_max_files() -> usize {
    3
}

fn default_max_total_bytes() -> u64 {
    100 << 20
}

fn default_max_request_bytes() -> usize {
    128 << 20
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            public_base_url: None,
            csp_header: None,
            reputation: ReputationConfig::default(),
            blocklist: BlocklistConfig::default(),
            quota: QuotaConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            banned_ips_file: default_banned_ips_file(),
            banned_mimes_file: default_banned_mimes_file(),
        }
    }
}

impl Default for BlocklistConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            zone: default_dnsbl_zone(),
            resolver: default_dnsbl_resolver(),
            timeout_ms: default_dnsbl_timeout_ms(),
            on_error: default_failure_policy(),
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_uploads_per_day: default_max_uploads_per_day(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            max_files: default_max_files(),
            max_total_bytes: default_max_total_bytes(),
            max_request_bytes: default_max_request_bytes(),
        }
    }
}

impl BlocklistConfig {
    /// Get the per-query timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl QuotaConfig {
    /// Get the cooldown duration
    pub fn cooldown_duration(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(addr) = std::env::var("BIND_ADDR") {
            config.bind_addr = addr;
        } else if let Some(port) = env_parse::<u16>("PORT") {
            config.bind_addr = format!("0.0.0.0:{port}");
        }
        config.public_base_url = env_string("PUBLIC_BASE_URL");
        config.csp_header = env_string("CSP_HEADER");

        if let Some(path) = env_string("BANNED_IPS_FILE") {
            config.reputation.banned_ips_file = path.into();
        }
        if let Some(path) = env_string("BANNED_MIMES_FILE") {
            config.reputation.banned_mimes_file = path.into();
        }

        if let Some(enabled) = env_parse("DNSBL_ENABLED") {
            config.blocklist.enabled = enabled;
        }
        if let Some(zone) = env_string("DNSBL_ZONE") {
            config.blocklist.zone = zone;
        }
        if let Some(resolver) = env_string("DNSBL_RESOLVER") {
            config.blocklist.resolver = resolver;
        }
        if let Some(timeout_ms) = env_parse("DNSBL_TIMEOUT_MS") {
            config.blocklist.timeout_ms = timeout_ms;
        }
        if let Some(policy) = env_parse("DNSBL_ON_ERROR") {
            config.blocklist.on_error = policy;
        }

        if let Some(max) = env_parse("MAX_UPLOADS_PER_DAY") {
            config.quota.max_uploads_per_day = max;
        }
        if let Some(secs) = env_parse("COOLDOWN_SECS") {
            config.quota.cooldown_secs = secs;
        }

        if let Some(dir) = env_string("STORAGE_DIR") {
            config.upload.storage_dir = dir.into();
        }
        if let Some(max) = env_parse("MAX_FILES") {
            config.upload.max_files = max;
        }
        if let Some(max) = env_parse("MAX_TOTAL_BYTES") {
            config.upload.max_total_bytes = max;
        }
        if let Some(max) = env_parse("MAX_REQUEST_BYTES") {
            config.upload.max_request_bytes = max;
        }

        config
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
