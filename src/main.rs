// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Anonymous File Drop Service
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables (and a `.env` file if
//! present):
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `STORAGE_DIR`: Upload root (default: f)
//! - `BANNED_IPS_FILE` / `BANNED_MIMES_FILE`: Ban lists (default: banned.txt, banned-mimes.txt)
//! - `MAX_UPLOADS_PER_DAY`: Daily cap per client IP (default: 100)
//! - `COOLDOWN_SECS`: Minimum gap between uploads (default: 10)
//! - `DNSBL_ENABLED`, `DNSBL_ZONE`, `DNSBL_RESOLVER`: Blocklist lookup
//! - `DNSBL_ON_ERROR`: `allow` or `deny` when the lookup fails (default: allow)

use anyhow::Context;
use chrono::Local;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use anon_file_drop::{
    admission::AdmissionPipeline,
    blocklist::{BlocklistOracle, DisabledOracle, DnsblOracle},
    config::Config,
    handlers::{router, AppState},
    metrics::Metrics,
    negotiate::Views,
};

/// Interval between ledger eviction sweeps.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::from_env();
    info!(
        bind_addr = %config.bind_addr,
        storage_dir = %config.upload.storage_dir.display(),
        max_uploads_per_day = config.quota.max_uploads_per_day,
        cooldown_secs = config.quota.cooldown_secs,
        max_files = config.upload.max_files,
        max_total_bytes = config.upload.max_total_bytes,
        dnsbl_enabled = config.blocklist.enabled,
        "Starting file drop"
    );

    let oracle: Arc<dyn BlocklistOracle> = if config.blocklist.enabled {
        let oracle = DnsblOracle::new(&config.blocklist)
            .with_context(|| format!("invalid DNSBL resolver {}", config.blocklist.resolver))?;
        info!(zone = oracle.zone(), resolver = %config.blocklist.resolver, "DNS blocklist enabled");
        Arc::new(oracle)
    } else {
        Arc::new(DisabledOracle)
    };

    let pipeline = AdmissionPipeline::new(&config, oracle);

    // Unreadable ban lists are a startup failure, not a per-request one
    let ban_lists = pipeline
        .reputation()
        .reload()
        .await
        .context("failed to load ban lists")?;
    info!(
        banned_ips = ban_lists.ips().len(),
        banned_mimes = ban_lists.mimes().len(),
        "Ban lists loaded"
    );

    let state = Arc::new(AppState {
        pipeline,
        views: Views::new().context("failed to compile templates")?,
        metrics: Metrics::new().context("failed to register metrics")?,
        config: config.clone(),
    });

    // Spawn cleanup task
    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = cleanup_state.pipeline.ledger().cleanup(Local::now()).await;
            if removed > 0 {
                info!(removed, "Evicted idle quota records");
            }
        }
    });

    let app = router(state);

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
