use anyhow::{anyhow, Context, Result};
use http::Uri;
use pingora::prelude::HttpPeer;

use crate::config::OriginConfig;

/// The object-storage origin every request is forwarded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    addr: String,
    tls: bool,
    sni: String,
    host_header: String,
}

impl Origin {
    pub fn from_config(cfg: &OriginConfig) -> Result<Self> {
        let uri = cfg
            .url
            .parse::<Uri>()
            .with_context(|| format!("bad origin url: {}", cfg.url))?;
        let auth = uri
            .authority()
            .ok_or_else(|| anyhow!("origin url has no host: {}", cfg.url))?;

        let tls = match uri.scheme_str() {
            Some(s) if s.eq_ignore_ascii_case("https") => true,
            Some(s) if s.eq_ignore_ascii_case("http") => false,
            Some(s) => return Err(anyhow!("unsupported origin scheme {s:?}")),
            None => false,
        };
        let host = auth.host();

        let mut addr = auth.as_str().to_string();
        if auth.port_u16().is_none() {
            addr.push_str(if tls { ":443" } else { ":80" });
        }

        // IP literal origins get no SNI.
        let sni = match host.trim_matches(|c| c == '[' || c == ']').parse::<std::net::IpAddr>() {
            Ok(_) => String::new(),
            Err(_) => host.to_string(),
        };

        let host_header = cfg
            .host_header
            .clone()
            .unwrap_or_else(|| host.to_string());

        Ok(Self {
            addr,
            tls,
            sni,
            host_header,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn host_header(&self) -> &str {
        &self.host_header
    }

    pub fn peer(&self) -> HttpPeer {
        HttpPeer::new(self.addr.as_str(), self.tls, self.sni.clone())
    }
}
