use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::rewrite::normalizer::{IndexNormalizer, DEFAULT_DOCUMENT};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub metrics_listen: Option<String>,
    pub http_listen: Option<String>,

    /// Directory to write JSONL logs (access/app).
    /// Default: ./logs
    pub log_dir: Option<PathBuf>,

    pub origin: OriginConfig,

    #[serde(default)]
    pub rewrite: RewriteConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OriginConfig {
    /// e.g. `https://my-bucket.s3.eu-west-1.amazonaws.com`
    pub url: String,
    /// Host header sent upstream. Defaults to the host part of `url`.
    pub host_header: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RewriteConfig {
    pub default_document: Option<String>,
    /// How often the config file is polled for a new default document (seconds)
    pub hot_reload_secs: Option<u64>,
}

impl RewriteConfig {
    pub fn default_document(&self) -> &str {
        self.default_document.as_deref().unwrap_or(DEFAULT_DOCUMENT)
    }

    pub fn build_normalizer(&self) -> Result<IndexNormalizer> {
        IndexNormalizer::new(self.default_document()).context("rewrite.default_document")
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config file: {}", path.display()))?;
        let mut cfg: AppConfig = serde_yaml::from_str(&text)
            .with_context(|| format!("parse config file: {}", path.display()))?;
        cfg.resolve_paths(path.parent().unwrap_or_else(|| Path::new(".")));
        Ok(cfg)
    }

    pub fn metrics_addr(&self) -> String {
        self.metrics_listen
            .clone()
            .unwrap_or_else(|| "0.0.0.0:9100".to_string())
    }

    pub fn listen_http_addr(&self) -> String {
        self.http_listen
            .clone()
            .unwrap_or_else(|| "0.0.0.0:80".to_string())
    }

    pub fn rewrite_hot_reload_interval_secs(&self) -> u64 {
        self.rewrite.hot_reload_secs.unwrap_or(3).max(1)
    }

    pub fn log_dir_path(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("logs"))
    }

    /// Resolve all relative paths in config based on the directory containing the config file.
    pub fn resolve_paths(&mut self, base_dir: &Path) {
        if let Some(p) = &self.log_dir {
            self.log_dir = Some(resolve_path(base_dir, p));
        }
    }
}

fn resolve_path(base_dir: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg: AppConfig = serde_yaml::from_str("origin:\n  url: http://127.0.0.1:9000\n").unwrap();

        assert_eq!(cfg.listen_http_addr(), "0.0.0.0:80");
        assert_eq!(cfg.metrics_addr(), "0.0.0.0:9100");
        assert_eq!(cfg.log_dir_path(), PathBuf::from("logs"));
        assert_eq!(cfg.rewrite.default_document(), "index.html");
        assert_eq!(cfg.rewrite_hot_reload_interval_secs(), 3);
        assert!(cfg.origin.host_header.is_none());
    }

    #[test]
    fn load_resolves_log_dir_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "http_listen: 127.0.0.1:8080\nlog_dir: out\norigin:\n  url: https://site.s3.amazonaws.com\n  host_header: site.example\nrewrite:\n  default_document: default.htm\n  hot_reload_secs: 0"
        )
        .unwrap();

        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.log_dir_path(), dir.path().join("out"));
        assert_eq!(cfg.listen_http_addr(), "127.0.0.1:8080");
        assert_eq!(cfg.origin.host_header.as_deref(), Some("site.example"));
        assert_eq!(cfg.rewrite_hot_reload_interval_secs(), 1);
        assert_eq!(cfg.rewrite.build_normalizer().unwrap().default_document(), "default.htm");
    }

    #[test]
    fn absolute_log_dir_is_kept() {
        let mut cfg: AppConfig =
            serde_yaml::from_str("log_dir: /var/log/edge-index\norigin:\n  url: http://o\n").unwrap();
        cfg.resolve_paths(Path::new("/etc/edge-index"));
        assert_eq!(cfg.log_dir_path(), PathBuf::from("/var/log/edge-index"));
    }

    #[test]
    fn invalid_default_document_fails_to_build() {
        let cfg = RewriteConfig {
            default_document: Some("docs/".into()),
            hot_reload_secs: None,
        };
        assert!(cfg.build_normalizer().is_err());
    }
}
