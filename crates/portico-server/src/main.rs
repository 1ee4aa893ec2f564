use clap::Parser;
use portico_core::PorticoConfig;
use portico_server::PorticoServer;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Audit and authorization server for the Portico portal.
#[derive(Debug, Parser)]
#[command(name = "portico", version, about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, env = "PORTICO_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = PorticoConfig::load(cli.config.as_deref())?;

    // RUST_LOG wins over the configured filter when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.filter.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(project) = &config.project {
        tracing::info!(project = %project, "starting portal server");
    }

    PorticoServer::new(config).run().await?;
    Ok(())
}
