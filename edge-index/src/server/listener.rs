use pingora_core::services::listening::Service;
use pingora_proxy::HttpProxy;

use crate::config::AppConfig;
use crate::server::proxy::IndexProxy;

/// Add plain HTTP listener. TLS terminates in front of the edge.
pub fn add_http_listener(svc: &mut Service<HttpProxy<IndexProxy>>, cfg: &AppConfig) {
    let http_listen = cfg.listen_http_addr();
    tracing::info!("proxy listening on {}", http_listen);
    svc.add_tcp(&http_listen);
}
