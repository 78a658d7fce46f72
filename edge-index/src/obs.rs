use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::MakeWriter;

/// JSONL access sink.
///
/// Active file: `<log_dir>/access.jsonl`, hourly rolling handled by tracing-appender.
#[derive(Clone)]
pub struct ObsSink {
    access: NonBlocking,
}

// Keep the guard alive for process lifetime, otherwise logs may drop.
static ACCESS_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

#[derive(Debug, Clone)]
pub struct AccessLog {
    pub ts: DateTime<Utc>,
    pub request_id: String,
    pub method: String,
    pub host: String,
    pub old_uri: String,
    pub new_uri: String,
    pub rewrite: String,
    pub status: u16,
    pub latency_ms: u64,
    pub upstream: Option<String>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub error: Option<String>,
}

/// Serialized form for access lines (injects dataset)
#[derive(Serialize)]
struct AccessLine<'a> {
    #[serde(rename = "@timestamp")]
    ts: &'a DateTime<Utc>,
    dataset: &'static str,
    request_id: &'a str,
    method: &'a str,
    host: &'a str,
    old_uri: &'a str,
    new_uri: &'a str,
    rewrite: &'a str,
    status: u16,
    latency_ms: u64,
    upstream: &'a Option<String>,
    client_ip: &'a Option<String>,
    user_agent: &'a Option<String>,
    error: &'a Option<String>,
}

impl AccessLog {
    fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&AccessLine {
            ts: &self.ts,
            dataset: "access",
            request_id: &self.request_id,
            method: &self.method,
            host: &self.host,
            old_uri: &self.old_uri,
            new_uri: &self.new_uri,
            rewrite: &self.rewrite,
            status: self.status,
            latency_ms: self.latency_ms,
            upstream: &self.upstream,
            client_ip: &self.client_ip,
            user_agent: &self.user_agent,
            error: &self.error,
        })
    }
}

impl ObsSink {
    pub fn new(log_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("create log_dir failed: {}", log_dir.display()))?;

        let access_appender = tracing_appender::rolling::hourly(log_dir, "access.jsonl");
        let (access, guard) = tracing_appender::non_blocking(access_appender);
        let _ = ACCESS_GUARD.set(guard);

        Ok(Self { access })
    }

    /// Write one access JSONL line. Caller does NOT provide dataset.
    pub fn write_access(&self, rec: &AccessLog) {
        if let Ok(json) = rec.to_json() {
            let mut w = self.access.make_writer();
            let _ = w.write_all(json.as_bytes());
            let _ = w.write_all(b"\n");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_line_carries_both_uris() {
        let rec = AccessLog {
            ts: Utc::now(),
            request_id: "req-1".into(),
            method: "GET".into(),
            host: "site.example".into(),
            old_uri: "/about/".into(),
            new_uri: "/about/index.html".into(),
            rewrite: "rewritten".into(),
            status: 200,
            latency_ms: 3,
            upstream: Some("site.s3.amazonaws.com:443".into()),
            client_ip: None,
            user_agent: None,
            error: None,
        };

        let v: serde_json::Value = serde_json::from_str(&rec.to_json().unwrap()).unwrap();
        assert_eq!(v["dataset"], "access");
        assert_eq!(v["old_uri"], "/about/");
        assert_eq!(v["new_uri"], "/about/index.html");
        assert_eq!(v["rewrite"], "rewritten");
        assert!(v["client_ip"].is_null());
        assert!(v.get("@timestamp").is_some());
    }
}
