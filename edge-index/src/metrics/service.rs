use std::convert::Infallible;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use http_body_util::Full;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use pingora::server::ShutdownWatch;
use pingora_core::services::background::BackgroundService;
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct MetricsSvc {
    listen: String,
}

impl MetricsSvc {
    pub fn new(listen: impl Into<String>) -> Self {
        Self { listen: listen.into() }
    }
}

#[async_trait]
impl BackgroundService for MetricsSvc {
    async fn start(&self, mut shutdown: ShutdownWatch) {
        let listener = match TcpListener::bind(&self.listen).await {
            Ok(l) => {
                tracing::info!("metrics listening on {}", self.listen);
                l
            }
            Err(e) => {
                tracing::error!("metrics bind {} failed: {}", self.listen, e);
                return;
            }
        };

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("metrics service shutdown");
                    return;
                }
                res = listener.accept() => {
                    let (stream, _peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            tracing::warn!("metrics accept error: {}", e);
                            continue;
                        }
                    };

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let svc = service_fn(handle);

                        // http1 only, matching the hyper features we build with
                        let builder = hyper::server::conn::http1::Builder::new();

                        if let Err(e) = builder.serve_connection(io, svc).await {
                            tracing::warn!("metrics conn error: {}", e);
                        }
                    });
                }
            }
        }
    }
}

async fn handle(req: Request<hyper::body::Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    Ok(route(req.uri().path()))
}

fn route(path: &str) -> Response<Full<Bytes>> {
    if path != "/metrics" {
        return text_response(
            StatusCode::NOT_FOUND,
            "text/plain; charset=utf-8",
            Bytes::from_static(b"not found"),
        );
    }

    let body = crate::metrics::registry::gather_as_text();
    text_response(
        StatusCode::OK,
        "text/plain; version=0.0.4; charset=utf-8",
        Bytes::from(body),
    )
}

fn text_response(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(body));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_paths_are_404() {
        assert_eq!(route("/").status(), StatusCode::NOT_FOUND);
        assert_eq!(route("/metrics/").status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn metrics_path_serves_prometheus_text() {
        crate::metrics::counters::inc_rewrite("unchanged");
        let resp = route("/metrics");
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(CONTENT_TYPE).unwrap(),
            "text/plain; version=0.0.4; charset=utf-8"
        );
    }
}
