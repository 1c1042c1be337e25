// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Local IP and MIME ban lists.
//!
//! Both lists are plain text files with one entry per line. Blank lines and
//! lines starting with `#` are ignored. The lists are re-read on every
//! admission and swapped in whole, so a reader holding a snapshot never sees
//! a half-parsed list.

use crate::config::ReputationConfig;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

/// An immutable snapshot of both ban lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BanLists {
    ips: Vec<String>,
    mimes: Vec<String>,
}

impl BanLists {
    pub fn new(ips: Vec<String>, mimes: Vec<String>) -> Self {
        Self { ips, mimes }
    }

    /// Case-sensitive exact match against the banned IP literals.
    pub fn is_banned_ip(&self, ip: &str) -> bool {
        self.ips.iter().any(|banned| banned == ip)
    }

    /// Case-sensitive exact match against the banned MIME types.
    pub fn is_banned_mime(&self, mime: &str) -> bool {
        self.mimes.iter().any(|banned| banned == mime)
    }

    pub fn ips(&self) -> &[String] {
        &self.ips
    }

    pub fn mimes(&self) -> &[String] {
        &self.mimes
    }
}

/// File-backed, reloadable ban lists.
pub struct ReputationStore {
    ips_path: PathBuf,
    mimes_path: PathBuf,
    current: RwLock<Arc<BanLists>>,
}

impl ReputationStore {
    pub fn new(config: &ReputationConfig) -> Self {
        Self {
            ips_path: config.banned_ips_file.clone(),
            mimes_path: config.banned_mimes_file.clone(),
            current: RwLock::new(Arc::new(BanLists::default())),
        }
    }

    /// Re-read both sources and swap them in.
    ///
    /// Missing files are created empty. On any error the previous lists stay
    /// in place and the error is returned.
    pub async fn reload(&self) -> io::Result<Arc<BanLists>> {
        ensure_file_exists(&self.ips_path).await?;
        ensure_file_exists(&self.mimes_path).await?;

        let ips = read_list(&self.ips_path).await?;
        let mimes = read_list(&self.mimes_path).await?;
        debug!(ips = ips.len(), mimes = mimes.len(), "Ban lists reloaded");

        let lists = Arc::new(BanLists::new(ips, mimes));
        *self.current.write().await = lists.clone();
        Ok(lists)
    }

    /// The most recently loaded lists.
    pub async fn snapshot(&self) -> Arc<BanLists> {
        self.current.read().await.clone()
    }

    pub async fn is_banned_ip(&self, ip: &str) -> bool {
        self.snapshot().await.is_banned_ip(ip)
    }

    pub async fn is_banned_mime(&self, mime: &str) -> bool {
        self.snapshot().await.is_banned_mime(mime)
    }
}

async fn ensure_file_exists(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    // append + create never truncates an existing list
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map(drop)
}

async fn read_list(path: &Path) -> io::Result<Vec<String>> {
    let content = fs::read_to_string(path).await.map_err(|e| {
        io::Error::new(e.kind(), format!("failed to read {}: {e}", path.display()))
    })?;
    Ok(parse_list(&content))
}

/// Parse a line-oriented list, skipping blanks and `#` comments.
pub fn parse_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    fn store_in(dir: &TempDir) -> ReputationStore {
        ReputationStore::new(&ReputationConfig {
            banned_ips_file: dir.path().join("banned.txt"),
            banned_mimes_file: dir.path().join("banned-mimes.txt"),
        })
    }

    #[test]
    fn test_parse_list_skips_comments_and_blanks() {
        let parsed = parse_list("# header\n\n 10.0.0.1 \n#10.0.0.2\n10.0.0.3\n   \n");
        assert_eq!(parsed, vec!["10.0.0.1", "10.0.0.3"]);
    }

    #[tokio::test]
    async fn test_reload_creates_missing_sources() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let lists = assert_ok!(store.reload().await);
        assert!(lists.ips().is_empty());
        assert!(lists.mimes().is_empty());
        assert!(dir.path().join("banned.txt").exists());
        assert!(dir.path().join("banned-mimes.txt").exists());
    }

    #[tokio::test]
    async fn test_membership_is_exact_and_case_sensitive() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("banned.txt"), "192.0.2.7\n").unwrap();
        std::fs::write(
            dir.path().join("banned-mimes.txt"),
            "application/x-msdownload\n",
        )
        .unwrap();
        let store = store_in(&dir);
        store.reload().await.unwrap();

        assert!(store.is_banned_ip("192.0.2.7").await);
        assert!(!store.is_banned_ip("192.0.2.70").await);
        assert!(store.is_banned_mime("application/x-msdownload").await);
        assert!(!store.is_banned_mime("APPLICATION/X-MSDOWNLOAD").await);
    }

    #[tokio::test]
    async fn test_reload_is_idempotent() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("banned.txt"), "# bad actors\n198.51.100.1\n").unwrap();
        let store = store_in(&dir);

        let first = store.reload().await.unwrap();
        let second = store.reload().await.unwrap();
        assert_eq!(*first, *second);
        assert!(second.is_banned_ip("198.51.100.1"));
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_lists() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("banned.txt"), "203.0.113.9\n").unwrap();
        let store = store_in(&dir);
        store.reload().await.unwrap();

        // Not valid UTF-8, so the read fails
        std::fs::write(dir.path().join("banned-mimes.txt"), [0xff, 0xfe, 0x00]).unwrap();
        assert_err!(store.reload().await);
        assert!(store.is_banned_ip("203.0.113.9").await);
    }
}
