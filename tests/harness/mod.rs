// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test harness for driving the file drop router in-process.
//!
//! Each [`TestApp`] owns a temporary directory holding its ban lists and
//! upload storage, so tests never share state.

pub mod generators;
pub mod metrics;

use anon_file_drop::{
    admission::AdmissionPipeline,
    blocklist::{BlocklistOracle, DisabledOracle, Lookup},
    config::Config,
    handlers::{router, AppState},
    metrics::Metrics,
    negotiate::Views,
};
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::Request,
    response::Response,
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Host every generated request is addressed to.
pub const HOST: &str = "drop.example";

/// Oracle returning the same verdict for every address.
pub struct StaticOracle(pub Lookup);

#[async_trait]
impl BlocklistOracle for StaticOracle {
    async fn lookup(&self, _client_ip: &str) -> Lookup {
        self.0.clone()
    }
}

/// A router wired to a private storage directory.
pub struct TestApp {
    pub dir: TempDir,
    pub state: Arc<AppState>,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        Self::with_oracle(Arc::new(DisabledOracle), tweak)
    }

    pub fn with_oracle(oracle: Arc<dyn BlocklistOracle>, tweak: impl FnOnce(&mut Config)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.reputation.banned_ips_file = dir.path().join("banned.txt");
        config.reputation.banned_mimes_file = dir.path().join("banned-mimes.txt");
        config.upload.storage_dir = dir.path().join("f");
        tweak(&mut config);

        let state = Arc::new(AppState {
            pipeline: AdmissionPipeline::new(&config, oracle),
            views: Views::new().unwrap(),
            metrics: Metrics::new().unwrap(),
            config,
        });
        let router = router(state.clone()).layer(MockConnectInfo(SocketAddr::from((
            [127, 0, 0, 1],
            40000,
        ))));

        Self { dir, state, router }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub fn ban_ip(&self, ip: &str) {
        std::fs::write(self.dir.path().join("banned.txt"), format!("{ip}\n")).unwrap();
    }

    pub fn ban_mime(&self, mime: &str) {
        std::fs::write(self.dir.path().join("banned-mimes.txt"), format!("{mime}\n")).unwrap();
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.state.config.upload.storage_dir.clone()
    }

    /// Number of upload directories on disk.
    pub fn stored_uploads(&self) -> usize {
        match std::fs::read_dir(self.storage_dir()) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

/// Collect a response body as UTF-8 text.
pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Collect a JSON error body.
pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}
