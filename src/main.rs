#![cfg_attr(not(test), deny(clippy::panic))]

use anyhow::Context;
use axum::routing::get;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tls_rotor::acme::{
    acme_wrap, with_acme, with_acme_dir_cache, with_acme_hosts, with_acme_refresh,
};
use tls_rotor::config::{self, TlsConfig};
use tls_rotor::logging;
use tls_rotor::{
    new_tls_config, with_alpn, with_min_version, with_named_key_pair,
    with_session_ticket_key_rotation, with_tls12, TaskGroup, TlsOption,
};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// tls-rotor -- HTTPS endpoint with rotating session ticket keys
#[derive(Parser, Debug)]
#[command(name = "tls-rotor")]
#[command(about = "An HTTPS endpoint built from composable TLS options with rotating session ticket keys")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines and pre-deployment checks.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    /// Useful for debugging configuration loading from multiple sources.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load();

    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg).context("Failed to serialize config")?;
        println!("{json}");
        return Ok(());
    }

    // config::load() only reports validation problems; fail hard here.
    let validation_result = config::validate_config(&cfg);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.port);
                println!("  Static certificates: {}", cfg.tls.certificates.len());
                println!("  ACME enabled: {}", cfg.tls.acme.enabled);
                println!("  Minimum TLS version: {}", cfg.tls.min_version);
                println!("  Modern ciphers: {}", cfg.tls.modern_ciphers);
                println!(
                    "  Session tickets: {} (keys: {}, rotation: {}s)",
                    cfg.tls.session_tickets.enabled,
                    cfg.tls.session_tickets.ring_size,
                    cfg.tls.session_tickets.rotation_interval_secs
                );
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e:#}");
                std::process::exit(1);
            }
        }
    }

    validation_result?;

    let _log_guard = logging::init_with_config(&cfg.logging);

    let mut group = TaskGroup::new();
    let mut acme_group = TaskGroup::new();
    let settings = new_tls_config(tls_options(
        &cfg.tls,
        OptionGroups {
            acme: &mut acme_group,
            tickets: &mut group,
        },
    ))
    .context("failed to build TLS configuration")?;
    group.merge(acme_group);
    if settings.session_tickets_disabled() {
        tracing::warn!("Session tickets are disabled; clients will perform full handshakes");
    }
    let server_config = settings.into_server_config()?;

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let shutdown = CancellationToken::new();
    let handle: Handle<SocketAddr> = Handle::new();

    let background = tokio::spawn(group.run(shutdown.clone()));
    tokio::spawn(shutdown_on_signal(handle.clone(), shutdown.clone()));

    let app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http());

    tracing::info!(
        %addr,
        min_version = %cfg.tls.min_version,
        acme = cfg.tls.acme.enabled,
        "Server started over HTTPS"
    );

    let served = axum_server::bind_rustls(addr, RustlsConfig::from_config(Arc::new(server_config)))
        .handle(handle)
        .serve(app.into_make_service())
        .await;

    shutdown.cancel();
    let stopped = background.await.context("background task group panicked")?;

    served.context("HTTPS listener failed")?;
    stopped?;
    tracing::info!("Server stopped");
    Ok(())
}

/// Task groups the TLS options register their background work with.
struct OptionGroups<'a> {
    acme: &'a mut TaskGroup,
    tickets: &'a mut TaskGroup,
}

/// Translate the loaded configuration into TLS options, in application order.
fn tls_options<'a>(tls: &TlsConfig, groups: OptionGroups<'a>) -> Vec<TlsOption<'a>> {
    let mut opts: Vec<TlsOption<'a>> = Vec::new();

    for cert in &tls.certificates {
        opts.push(with_named_key_pair(
            cert.server_names.clone(),
            &cert.certificate_path,
            &cert.private_key_path,
        ));
    }

    if tls.modern_ciphers {
        opts.push(with_tls12());
    }
    opts.push(with_min_version(tls.min_version));
    opts.push(with_alpn(tls.alpn_protocols.clone()));

    if tls.acme.enabled {
        let mut acme_opts = vec![with_acme_hosts(tls.acme.hosts.clone())];
        if let Some(dir) = &tls.acme.cache_dir {
            acme_opts.push(with_acme_dir_cache(dir));
        }
        tracing::warn!(
            "ACME enabled without a certificate issuer; only cached certificates will be served"
        );
        opts.push(with_acme(vec![acme_wrap(acme_opts)]));
        opts.push(with_acme_refresh(groups.acme, tls.acme.refresh_interval()));
    }

    let tickets = &tls.session_tickets;
    if tickets.enabled {
        opts.push(with_session_ticket_key_rotation(
            groups.tickets,
            tickets.ring_size,
            tickets.rotation_interval(),
        ));
    }

    opts
}

async fn shutdown_on_signal(handle: Handle<SocketAddr>, shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                tracing::error!(error = %err, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
        }
        () = shutdown.cancelled() => {}
    }

    shutdown.cancel();
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}
