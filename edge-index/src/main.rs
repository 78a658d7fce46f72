use anyhow::Context;
use clap::{Parser, Subcommand};
use edge_index::cloudfront::handler::handle_json;
use edge_index::config::AppConfig;
use edge_index::rewrite::engine::RewriteEngine;
use edge_index::rewrite::update::RewriteUpdater;
use edge_index::server::origin::Origin;
use edge_index::server::proxy::IndexProxy;
use edge_index::{metrics, obs, server, telemetry, IndexNormalizer, TracingSink};
use pingora::prelude::*;
use pingora_proxy::http_proxy_service;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "edge-index", version, about = "Default-document rewriting for S3-backed edge origins")]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Run the rewriting reverse proxy in front of the origin
    Serve {
        /// Path to config.yaml (relative paths inside config will be resolved based on this file's directory)
        #[arg(long, default_value = "config.yaml")]
        config: PathBuf,
    },

    /// Rewrite one CloudFront Lambda@Edge event (JSON) and print the resulting request
    Event {
        /// Event file; stdin when omitted
        #[arg(long)]
        input: Option<PathBuf>,

        /// Overrides rewrite.default_document from --config
        #[arg(long)]
        default_document: Option<String>,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn locate_config(p: PathBuf) -> PathBuf {
    if p.exists() {
        return p;
    }

    // If default config.yaml doesn't exist, look next to the executable.
    if p == Path::new("config.yaml") {
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let cand = dir.join("config.yaml");
                if cand.exists() {
                    return cand;
                }
            }
        }
    }

    p
}

fn main() -> anyhow::Result<()> {
    match Args::parse().cmd {
        Cmd::Serve { config } => serve(locate_config(config)),
        Cmd::Event {
            input,
            default_document,
            config,
        } => event(input, default_document, config),
    }
}

fn event(input: Option<PathBuf>, default_document: Option<String>, config: Option<PathBuf>) -> anyhow::Result<()> {
    telemetry::init_stderr_tracing()?;

    let normalizer = match (default_document, config) {
        (Some(doc), _) => IndexNormalizer::new(doc)?,
        (None, Some(path)) => AppConfig::load(&path)?.rewrite.build_normalizer()?,
        (None, None) => IndexNormalizer::default(),
    };

    let raw = match input {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("read event file: {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("read event from stdin")?;
            buf
        }
    };

    let out = handle_json(&raw, &normalizer, &TracingSink)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(out.as_bytes())?;
    stdout.write_all(b"\n")?;
    Ok(())
}

fn serve(cfg_path: PathBuf) -> anyhow::Result<()> {
    let cfg = AppConfig::load(&cfg_path)?;

    // Tracing + log files
    let log_dir = cfg.log_dir_path();
    telemetry::init_tracing("edge-index", &log_dir)?;

    // Access sink
    let obs = obs::ObsSink::new(&log_dir)?;

    let origin = Origin::from_config(&cfg.origin)?;
    let engine = RewriteEngine::new(cfg.rewrite.build_normalizer()?);
    tracing::info!(
        origin = origin.addr(),
        default_document = engine.snapshot().default_document(),
        "edge-index starting"
    );

    let mut my_server = Server::new(None)?;
    my_server.bootstrap();

    let metrics_svc = background_service(
        "metrics",
        metrics::service::MetricsSvc::new(cfg.metrics_addr()),
    );
    my_server.add_service(metrics_svc);

    // Background: default document hot reload
    let updater = background_service(
        "rewrite-updater",
        RewriteUpdater::new(
            engine.clone(),
            cfg_path.clone(),
            Duration::from_secs(cfg.rewrite_hot_reload_interval_secs()),
        ),
    );
    my_server.add_service(updater);

    let proxy = IndexProxy::new(engine, origin, obs);
    let mut svc = http_proxy_service(&my_server.configuration, proxy);
    server::listener::add_http_listener(&mut svc, &cfg);
    my_server.add_service(svc);

    my_server.run_forever();
}
