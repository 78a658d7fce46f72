use crate::error::RewriteError;
use crate::obs::{AccessLog, ObsSink};
use crate::rewrite::engine::RewriteEngine;
use crate::rewrite::normalizer::RequestPath;
use crate::rewrite::sink::TracingSink;
use crate::server::origin::Origin;
use async_trait::async_trait;
use chrono::Utc;
use http::uri::PathAndQuery;
use http::Uri;
use once_cell::sync::Lazy;
use pingora::http::RequestHeader;
use pingora::prelude::*;
use pingora_proxy::{ProxyHttp, Session};
use std::sync::atomic::{AtomicU64, Ordering};

static REQ_COUNTER: Lazy<AtomicU64> = Lazy::new(|| AtomicU64::new(1));

fn gen_request_id() -> String {
    // timestamp(ms) + monotonic counter
    let n = REQ_COUNTER.fetch_add(1, Ordering::Relaxed);
    let ts = Utc::now().timestamp_millis();
    format!("req-{}-{:x}", ts, n)
}

#[derive(Clone)]
pub struct IndexProxy {
    pub engine: RewriteEngine,
    pub origin: Origin,
    pub obs: ObsSink,
}

impl IndexProxy {
    pub fn new(engine: RewriteEngine, origin: Origin, obs: ObsSink) -> Self {
        Self { engine, origin, obs }
    }
}

#[derive(Default)]
pub struct ProxyCtx {
    pub request_id: Option<String>,
    pub host: Option<String>,
    pub old_uri: Option<String>,
    pub new_uri: Option<String>,
    pub rewrite: Option<String>,
    pub rewrite_error: Option<String>,
    pub start: Option<std::time::Instant>,
}

/// The path lives inside the request URI, so a rewrite rebuilds the URI and keeps the query.
impl RequestPath for RequestHeader {
    fn path(&self) -> Result<&str, RewriteError> {
        Ok(self.uri.path())
    }

    fn set_path(&mut self, path: String) -> Result<(), RewriteError> {
        let uri = with_path(&self.uri, &path)?;
        self.set_uri(uri);
        Ok(())
    }
}

fn with_path(uri: &Uri, path: &str) -> Result<Uri, RewriteError> {
    let pq = match uri.query() {
        Some(q) => format!("{path}?{q}"),
        None => path.to_string(),
    };
    let pq = pq
        .parse::<PathAndQuery>()
        .map_err(|e| RewriteError::InvalidUri(e.to_string()))?;
    // a '?' or '#' inside `path` would silently move part of it into the query
    if pq.path() != path || pq.query() != uri.query() {
        return Err(RewriteError::InvalidUri(format!("{path:?} does not survive as a uri path")));
    }

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(pq);
    Uri::from_parts(parts).map_err(|e| RewriteError::InvalidUri(e.to_string()))
}

fn extract_host(req: &RequestHeader) -> Option<String> {
    // 1) "host" header (HTTP/1.1)
    let mut host = req
        .headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    // 2) URI authority (absolute-form / HTTP/2)
    if host.is_none() {
        host = req.uri.authority().map(|a| a.as_str().to_string());
    }

    host.map(|h| normalize_host(&h))
}

fn normalize_host(host: &str) -> String {
    let h = host.trim().trim_end_matches('.').to_ascii_lowercase();
    if h.starts_with('[') {
        // IPv6 literal, keep as-is (may include port)
        return h;
    }
    if let Some(i) = h.rfind(':') {
        let (left, right) = h.split_at(i);
        if right.len() > 1 && right[1..].chars().all(|c| c.is_ascii_digit()) {
            return left.to_string();
        }
    }
    h
}

#[async_trait]
impl ProxyHttp for IndexProxy {
    type CTX = ProxyCtx;

    fn new_ctx(&self) -> Self::CTX {
        ProxyCtx::default()
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> pingora::Result<bool> {
        ctx.start = Some(std::time::Instant::now());
        ctx.request_id = Some(gen_request_id());

        let host = extract_host(session.req_header()).unwrap_or_else(|| "unknown".to_string());
        crate::metrics::counters::on_req_start(&host);
        ctx.host = Some(host);

        let req = session.req_header_mut();
        ctx.old_uri = Some(req.uri.path().to_string());

        let outcome = self.engine.rewrite_request(req, &TracingSink);
        ctx.new_uri = Some(req.uri.path().to_string());
        ctx.rewrite = Some(outcome.kind_str().to_string());

        if let Some(error) = outcome.error() {
            tracing::warn!(reason = error.kind_str(), "request passed through: {}", error);
            ctx.rewrite_error = Some(error.to_string());
        }

        // never short-circuit, the origin always gets the request
        Ok(false)
    }

    async fn upstream_peer(&self, _session: &mut Session, _ctx: &mut Self::CTX) -> pingora::Result<Box<HttpPeer>> {
        Ok(Box::new(self.origin.peer()))
    }

    async fn upstream_request_filter(
        &self,
        _session: &mut Session,
        upstream_request: &mut RequestHeader,
        _ctx: &mut Self::CTX,
    ) -> pingora::Result<()> {
        upstream_request.insert_header("host", self.origin.host_header())?;
        Ok(())
    }

    async fn logging(&self, session: &mut Session, err: Option<&pingora::Error>, ctx: &mut Self::CTX) {
        let host = ctx.host.as_deref().unwrap_or("unknown");
        let elapsed = ctx.start.map(|s| s.elapsed().as_secs_f64()).unwrap_or(0.0);
        crate::metrics::counters::on_req_end(host, elapsed);

        let req = session.req_header();
        let status = session
            .response_written()
            .map(|r| r.status.as_u16())
            .unwrap_or(0);

        let access = AccessLog {
            ts: Utc::now(),
            request_id: ctx.request_id.clone().unwrap_or_default(),
            method: req.method.to_string(),
            host: host.to_string(),
            old_uri: ctx.old_uri.clone().unwrap_or_else(|| req.uri.path().to_string()),
            new_uri: ctx.new_uri.clone().unwrap_or_else(|| req.uri.path().to_string()),
            rewrite: ctx.rewrite.clone().unwrap_or_else(|| "pass_through".to_string()),
            status,
            latency_ms: (elapsed * 1000.0) as u64,
            upstream: Some(self.origin.addr().to_string()),
            client_ip: session.client_addr().map(|a| a.to_string()),
            user_agent: req
                .headers
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string()),
            error: err.map(|e| e.to_string()).or_else(|| ctx.rewrite_error.clone()),
        };

        self.obs.write_access(&access);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::normalizer::IndexNormalizer;
    use crate::rewrite::sink::MemorySink;

    fn header(uri: &str) -> RequestHeader {
        RequestHeader::build("GET", uri.as_bytes(), None).unwrap()
    }

    #[test]
    fn directory_request_is_rewritten_and_query_kept() {
        let mut req = header("/docs/?v=2&lang=en");
        let outcome = IndexNormalizer::default().rewrite_request(&mut req, &MemorySink::default());

        assert!(outcome.is_rewritten());
        assert_eq!(req.uri.path(), "/docs/index.html");
        assert_eq!(req.uri.query(), Some("v=2&lang=en"));
    }

    #[test]
    fn file_request_is_untouched() {
        let mut req = header("/docs/intro.html?v=2");
        let outcome = IndexNormalizer::default().rewrite_request(&mut req, &MemorySink::default());

        assert_eq!(outcome.kind_str(), "unchanged");
        assert_eq!(req.uri.to_string(), "/docs/intro.html?v=2");
    }

    #[test]
    fn root_request_is_rewritten() {
        let mut req = header("/");
        IndexNormalizer::default().rewrite_request(&mut req, &MemorySink::default());
        assert_eq!(req.uri.to_string(), "/index.html");
    }

    #[test]
    fn absolute_form_keeps_authority() {
        let uri: Uri = "http://site.example/a/".parse().unwrap();
        let out = with_path(&uri, "/a/index.html").unwrap();
        assert_eq!(out.to_string(), "http://site.example/a/index.html");
    }

    #[test]
    fn unparsable_path_is_an_error() {
        let uri: Uri = "/a/".parse().unwrap();
        assert!(matches!(with_path(&uri, "/a b/"), Err(RewriteError::InvalidUri(_))));
    }

    #[rstest::rstest]
    #[case::query_in_path("/docs/index.html?x=1")]
    #[case::fragment_in_path("/docs/a#frag")]
    fn delimiters_in_the_new_path_are_refused(#[case] path: &str) {
        let uri: Uri = "/docs/?v=2".parse().unwrap();
        assert!(matches!(with_path(&uri, path), Err(RewriteError::InvalidUri(_))));
    }

    #[test]
    fn host_is_normalized() {
        assert_eq!(normalize_host("Site.Example.:8080"), "site.example");
        assert_eq!(normalize_host("[::1]:8080"), "[::1]:8080");
        assert_eq!(normalize_host(" cdn.example "), "cdn.example");
    }

    #[test]
    fn host_header_wins_over_authority() {
        let mut req = header("/");
        req.insert_header("host", "Edge.Example:443").unwrap();
        assert_eq!(extract_host(&req).as_deref(), Some("edge.example"));
        assert_eq!(extract_host(&header("/")), None);
    }

    #[test]
    fn request_ids_are_unique() {
        assert_ne!(gen_request_id(), gen_request_id());
    }
}
