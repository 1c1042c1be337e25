// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! On-disk storage of accepted uploads.
//!
//! Every file gets its own directory named by a fresh 5-character
//! identifier: `<base>/<id>/<filename>`. A batch is written all-or-nothing:
//! bytes go to a hidden staging file in each directory first and are renamed
//! into place only once every file of the batch is on disk. On failure every directory the
//! batch reserved is removed again.

use crate::error::{Rejection, UploadError};
use axum::body::Bytes;
use rand::Rng;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Identifier alphabet: lowercase ASCII letters and digits.
const ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ID_LEN: usize = 5;
/// Attempts at drawing an unused identifier before giving up.
const MAX_ID_ATTEMPTS: usize = 16;
/// Longest stored filename, the common `NAME_MAX`.
const MAX_FILENAME_BYTES: usize = 255;
/// Longest extension kept intact when a name is shortened.
const MAX_EXTENSION_BYTES: usize = 16;
/// Staging file inside a reserved directory; never a valid download name.
const STAGING_NAME: &str = ".part";

/// A file accepted by admission, not yet written.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Sanitized filename
    pub filename: String,
    /// Client-declared MIME type
    pub mime: String,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(original_name: &str, mime: impl Into<String>, data: Bytes) -> Self {
        Self {
            filename: sanitize_filename(original_name),
            mime: mime.into(),
            data,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Metadata of a persisted file, in batch order.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoredFile {
    pub id: String,
    pub filename: String,
    pub mime: String,
    pub size: u64,
}

/// Directory-per-file upload store.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_dir: PathBuf,
    max_total_bytes: u64,
}

impl FileStore {
    pub fn new(base_dir: impl Into<PathBuf>, max_total_bytes: u64) -> Self {
        Self {
            base_dir: base_dir.into(),
            max_total_bytes,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Persist a batch of files.
    ///
    /// The aggregate size is checked before anything touches the disk.
    pub async fn persist(&self, files: Vec<UploadFile>) -> Result<Vec<StoredFile>, UploadError> {
        let total: u64 = files.iter().map(UploadFile::size).sum();
        if total > self.max_total_bytes {
            return Err(Rejection::TooLarge {
                total,
                max: self.max_total_bytes,
            }
            .into());
        }

        fs::create_dir_all(&self.base_dir)
            .await
            .map_err(UploadError::Storage)?;

        let mut reserved = Vec::with_capacity(files.len());
        match self.write_batch(&files, &mut reserved).await {
            Ok(stored) => Ok(stored),
            Err(e) => {
                self.rollback(&reserved).await;
                Err(UploadError::Storage(e))
            }
        }
    }

    async fn write_batch(
        &self,
        files: &[UploadFile],
        reserved: &mut Vec<PathBuf>,
    ) -> io::Result<Vec<StoredFile>> {
        let mut stored = Vec::with_capacity(files.len());
        let mut staged = Vec::with_capacity(files.len());

        for file in files {
            let (id, dir) = self.reserve_dir().await?;
            reserved.push(dir.clone());

            let staging = dir.join(STAGING_NAME);
            fs::write(&staging, &file.data).await?;
            debug!(%id, filename = %file.filename, size = file.size(), "Staged upload");

            staged.push((staging, dir.join(&file.filename)));
            stored.push(StoredFile {
                id,
                filename: file.filename.clone(),
                mime: file.mime.clone(),
                size: file.size(),
            });
        }

        for (staging, target) in staged {
            fs::rename(&staging, &target).await?;
        }

        Ok(stored)
    }

    /// Claim a fresh identifier by creating its directory exclusively.
    async fn reserve_dir(&self) -> io::Result<(String, PathBuf)> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = generate_id();
            let dir = self.base_dir.join(&id);
            match fs::create_dir(&dir).await {
                Ok(()) => return Ok((id, dir)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(%id, "Identifier collision, drawing another");
                }
                Err(e) => return Err(e),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "no free upload identifier found",
        ))
    }

    async fn rollback(&self, reserved: &[PathBuf]) {
        for dir in reserved {
            if let Err(e) = fs::remove_dir_all(dir).await {
                warn!(dir = %dir.display(), error = %e, "Failed to roll back upload directory");
            }
        }
    }

    /// Path of a stored file, if `id` and `filename` are well-formed.
    ///
    /// Does not check existence.
    pub fn locate(&self, id: &str, filename: &str) -> Option<PathBuf> {
        if !is_valid_id(id) || !is_safe_segment(filename) {
            return None;
        }
        Some(self.base_dir.join(id).join(filename))
    }
}

/// Draw a random 5-character lowercase alphanumeric identifier.
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| ID_CHARSET[rng.gen_range(0..ID_CHARSET.len())] as char)
        .collect()
}

pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LEN && id.bytes().all(|b| ID_CHARSET.contains(&b))
}

/// A filename usable as a single path segment under an upload directory.
fn is_safe_segment(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control)
}

/// Make a client-supplied filename safe to store.
///
/// Spaces become underscores and only the last path component is kept.
/// Control characters are dropped, a leading dot becomes an underscore and
/// names that end up empty (or `.`/`..`) are replaced with `file`. Names
/// longer than [`MAX_FILENAME_BYTES`] are shortened, keeping the extension.
pub fn sanitize_filename(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let mut name: String = base
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if c == ' ' { '_' } else { c })
        .collect();

    if name.is_empty() || name == "." || name == ".." {
        return "file".to_string();
    }
    if name.starts_with('.') {
        name.replace_range(..1, "_");
    }
    truncate_name(&mut name);
    name
}

fn truncate_name(name: &mut String) {
    if name.len() <= MAX_FILENAME_BYTES {
        return;
    }
    let extension = match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot <= MAX_EXTENSION_BYTES => name[dot..].to_string(),
        _ => String::new(),
    };
    let mut cut = MAX_FILENAME_BYTES - extension.len();
    while !name.is_char_boundary(cut) {
        cut -= 1;
    }
    name.truncate(cut);
    name.push_str(&extension);
}
