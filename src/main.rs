//! uwsgi reverse proxy
//!
//! Serves HTTP, hands every request under a configured path prefix to a
//! uwsgi application server, and answers everything else itself.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                    UWSGI PROXY                        │
//!   Client        │  ┌──────────┐   ┌──────────┐   no match              │
//!   ─────────────▶│  │  http    │──▶│ routing  │───────────▶ next handler│
//!                 │  │  server  │   │ longest  │                          │
//!                 │  └──────────┘   │ prefix   │                          │
//!                 │                 └────┬─────┘                          │
//!                 │                      │ match                          │
//!                 │                      ▼                                │
//!                 │  ┌──────────┐   ┌──────────┐   ┌─────────────┐       │
//!   ◀─────────────┼──│  relay   │◀──│transport │◀──│  protocol   │       │
//!                 │  │ headers, │   │ TCP dial,│   │ vars block, │       │
//!                 │  │ status,  │   │ HTTP     │   │ 4-byte hdr  │       │
//!                 │  │ body     │   │ response │   └─────────────┘       │
//!                 │  └──────────┘   └────┬─────┘                          │
//!                 └──────────────────────┼───────────────────────────────┘
//!                                        ▼
//!                                 uwsgi backend
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use uwsgi_proxy::http::HttpServer;
use uwsgi_proxy::lifecycle::signals::shutdown_on_signal;
use uwsgi_proxy::lifecycle::startup::{assemble_config, StartupOptions};
use uwsgi_proxy::lifecycle::Shutdown;
use uwsgi_proxy::net::tls::load_tls_config;
use uwsgi_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "uwsgi-proxy")]
#[command(about = "Forward HTTP path prefixes to uwsgi application servers", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// File of `uwsgi <from> <to>` directives
    #[arg(short, long)]
    routes: Option<PathBuf>,

    /// Route a path prefix to a backend (repeatable)
    #[arg(long = "uwsgi", num_args = 2, value_names = ["FROM", "TO"])]
    uwsgi: Vec<String>,

    /// Listen address, overrides the config file
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = assemble_config(&StartupOptions {
        config_path: cli.config,
        directive_path: cli.routes,
        route_args: cli.uwsgi,
        bind_address: cli.bind,
    })?;

    logging::init_logging(&config.observability.log_level);

    tracing::info!("uwsgi-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        tls = config.listener.tls.is_some(),
        connect_timeout_secs = config.timeouts.connect_secs,
        backend_timeout_secs = config.timeouts.backend_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let tls = match &config.listener.tls {
        Some(tls) => Some(load_tls_config(tls).await?),
        None => None,
    };
    let bind_address: SocketAddr = config.listener.bind_address.parse()?;
    let server = HttpServer::new(config);

    match tls {
        Some(tls) => server.run_tls(bind_address, tls, shutdown.subscribe()).await?,
        None => {
            let listener = TcpListener::bind(bind_address).await?;
            server.run(listener, shutdown.subscribe()).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
