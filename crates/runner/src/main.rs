use anyhow::{Context, Result};
use clap::Parser;
use rest_api::AppState;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

/// One subscriber process per destination. Settings arrive with the Init
/// request, not on the command line.
#[derive(Parser, Debug)]
struct Args {
    /// Destination kind: mariadb | mysql | csv
    #[arg(short, long)]
    kind: String,

    #[arg(long, default_value = "0.0.0.0:8080")]
    api_addr: String,

    #[arg(long, default_value = "0.0.0.0:9095")]
    metrics_addr: String,

    /// Pretty text logs instead of JSON lines.
    #[arg(long)]
    pretty_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let metrics_addr: SocketAddr = args
        .metrics_addr
        .parse()
        .context("metrics_addr must be host:port")?;
    let cfg = o11y::O11yConfig {
        logging: o11y::logging::Config {
            level: None,
            format: if args.pretty_logs {
                o11y::logging::LogFormat::Pretty
            } else {
                o11y::logging::LogFormat::Json
            },
            with_targets: false,
        },
        metrics: o11y::sink_metrics::Config {
            enable: true,
            http_listener: Some(metrics_addr),
        },
        install_panic_hook: true,
    };
    let _ = o11y::init_all(&cfg);

    let subscriber = sinks::build_subscriber(&args.kind)?;
    let state = AppState::new(subscriber);
    let app = rest_api::router(state);

    let addr: SocketAddr = args
        .api_addr
        .parse()
        .context("api_addr must be host:port")?;
    info!(%addr, kind = %args.kind, "subscriber listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
