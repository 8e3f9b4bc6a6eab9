//! DocChat - chat with PDF documents
//!
#![doc = "DocChat - chat with PDF documents"]
#![doc = "Main entry point for the DocChat command-line client."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use docchat::cli::{Cli, Commands};
use docchat::commands;
use docchat::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Upload { file, chat } => {
            tracing::info!("Starting upload of {}", file.display());
            commands::upload::run_upload(config, file, chat).await?;
            Ok(())
        }
        Commands::Chat {
            session,
            name,
            resume,
        } => {
            tracing::info!("Starting interactive chat mode");
            let target = match (session, resume) {
                (_, Some(id)) => commands::chat::ChatTarget::Resume(id),
                (Some(id), None) => commands::chat::ChatTarget::New {
                    name: name.unwrap_or_else(|| id.clone()),
                    session_id: id,
                },
                (None, None) => {
                    anyhow::bail!("Either --session or --resume is required")
                }
            };
            commands::chat::run_chat(config, target).await?;
            Ok(())
        }
        Commands::History { command } => {
            tracing::info!("Starting history command");
            commands::history::handle_history(&config, command).await?;
            Ok(())
        }
        Commands::Sessions { command } => {
            tracing::info!("Starting sessions command");
            commands::sessions::handle_sessions(&config, command).await?;
            Ok(())
        }
        Commands::Health => {
            commands::health::run_health(&config).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// Logs go to stderr so streamed answers on stdout stay clean.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "docchat=debug"
    } else {
        "docchat=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
