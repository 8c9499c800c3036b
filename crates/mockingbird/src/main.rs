use anyhow::Context;
use clap::{Parser, ValueEnum};
use mockingbird::config::Config;
use mockingbird::server::{serve_metrics, Server};
use mockingbird::Engine;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "mockingbird", version, about = "Programmable HTTP stub server")]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "MOCKINGBIRD_CONFIG")]
    config: Option<String>,
    /// Listen port (overrides the config file)
    #[arg(short, long, env = "MOCKINGBIRD_PORT")]
    port: Option<u16>,
    /// Answer with the closest partial match when nothing matches perfectly
    #[arg(long)]
    allow_partial_mapping: bool,
    /// Forward unmatched requests to this URL and record the exchange
    #[arg(long, env = "MOCKINGBIRD_PROXY_URL")]
    proxy_url: Option<String>,
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(port) = args.port {
        config.listen.port = port;
    }
    if args.allow_partial_mapping {
        config.matching.allow_partial_mapping = true;
    }
    if let Some(url) = &args.proxy_url {
        config.proxy.url = Some(url.clone());
        config.proxy.save_mapping = true;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);
    let config = load_config(&args)?;

    let engine = Arc::new(Engine::new(config.matching.clone()));
    let server = Arc::new(Server::new(engine, config.proxy.clone()));
    let (shutdown_tx, _) = broadcast::channel(1);

    let addr = format!("{}:{}", config.listen.host, config.listen.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let server_task = tokio::spawn(server.serve(listener, shutdown_tx.subscribe()));

    if config.metrics.enabled {
        let metrics_addr = format!("{}:{}", config.listen.host, config.metrics.port);
        let metrics_listener = TcpListener::bind(&metrics_addr)
            .await
            .with_context(|| format!("Failed to bind metrics listener {metrics_addr}"))?;
        tokio::spawn(serve_metrics(metrics_listener, shutdown_tx.subscribe()));
    }

    tokio::signal::ctrl_c().await.ok();
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
    server_task.await??;
    Ok(())
}
