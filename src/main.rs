//! FocusFlow backend entry point
//!
//! `focusflow serve` starts the HTTP API; configuration comes from
//! environment variables (see `config::Settings::from_env`).

use clap::{Parser, Subcommand};
use focusflow::config::Settings;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "focusflow", about = "Study assistant backend", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API server
    Serve {
        /// Listen address, e.g. 127.0.0.1:8000
        #[arg(long, env = "FOCUSFLOW_ADDR")]
        addr: Option<std::net::SocketAddr>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { addr } => {
            let mut settings = Settings::from_env()?;
            if let Some(addr) = addr {
                settings.addr = addr;
            }

            info!(
                "Starting FocusFlow ({} via {})",
                settings.llm.model,
                settings.llm.provider.as_str()
            );

            let ctx = focusflow::build_context(settings).await?;
            focusflow::api::serve(ctx).await?;
        }
    }

    Ok(())
}
