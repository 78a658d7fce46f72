use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::Result;
use async_trait::async_trait;
use pingora::server::ShutdownWatch;
use pingora_core::services::background::BackgroundService;

use super::engine::RewriteEngine;
use super::normalizer::IndexNormalizer;
use crate::config::AppConfig;

/// Polls the config file and swaps in a new default document when it changes.
pub struct RewriteUpdater {
    engine: RewriteEngine,
    config_path: PathBuf,
    interval: Duration,
}

impl RewriteUpdater {
    pub fn new(engine: RewriteEngine, config_path: PathBuf, interval: Duration) -> Self {
        Self {
            engine,
            config_path,
            interval,
        }
    }

    /// One poll step. Returns the new mtime when a reload was attempted.
    async fn poll(&self, last_mtime: Option<SystemTime>) -> Option<SystemTime> {
        let meta = match tokio::fs::metadata(&self.config_path).await {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("config metadata error: {}", e);
                return None;
            }
        };
        let mtime = meta.modified().ok()?;
        if last_mtime.map(|x| x >= mtime).unwrap_or(false) {
            return None;
        }

        match load_normalizer(&self.config_path) {
            Ok(n) => {
                if *self.engine.snapshot() != n {
                    tracing::info!(default_document = n.default_document(), "rewrite config reloaded");
                    self.engine.swap_normalizer(n);
                }
            }
            Err(e) => {
                tracing::error!("rewrite config reload failed: {:#}", e);
            }
        }
        Some(mtime)
    }
}

pub fn load_normalizer(path: &Path) -> Result<IndexNormalizer> {
    AppConfig::load(path)?.rewrite.build_normalizer()
}

#[async_trait]
impl BackgroundService for RewriteUpdater {
    async fn start(&self, mut shutdown: ShutdownWatch) {
        let mut last_mtime: Option<SystemTime> = None;
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("rewrite updater shutdown");
                    return;
                }
                _ = ticker.tick() => {
                    if let Some(mtime) = self.poll(last_mtime).await {
                        last_mtime = Some(mtime);
                    }
                }
            }
        }
    }
}
