use crate::cli::SessionsCommand;
use crate::client::{ApiClient, RemoteSession};
use crate::config::Config;
use crate::error::Result;
use crate::storage::{open_store, with_store};
use colored::Colorize;
use prettytable::{format, Table};

/// Handle server-side session commands
pub async fn handle_sessions(config: &Config, command: SessionsCommand) -> Result<()> {
    let client = ApiClient::new(&config.api)?;

    match command {
        SessionsCommand::List => {
            let sessions = client.list_sessions().await?;

            if sessions.is_empty() {
                println!("{}", "The server holds no sessions.".yellow());
                return Ok(());
            }

            println!("\nServer Sessions:");
            remote_table(&sessions).printstd();
            println!();
        }
        SessionsCommand::Delete { id, keep_local } => {
            client.delete_session(&id).await?;
            println!("{}", format!("Deleted server session {}", id).green());

            if !keep_local {
                // The server index is gone, so the saved conversation can no
                // longer be continued.
                let store = open_store(&config.storage);
                let local = id.clone();
                match with_store(&store, move |s| s.delete(&local)).await {
                    Ok(()) => println!("{}", "Removed local conversation.".dimmed()),
                    Err(e) => tracing::warn!("Failed to remove local conversation {}: {}", id, e),
                }
            }
        }
    }

    Ok(())
}

fn remote_table(sessions: &[RemoteSession]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Document".bold(),
        "Chunks".bold(),
        "Created".bold()
    ]);

    for session in sessions {
        table.add_row(prettytable::row![
            session.session_id.cyan(),
            session.filename.as_deref().unwrap_or("-"),
            session
                .chunk_count
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
            session.created_at.as_deref().unwrap_or("-")
        ]);
    }
    table
}
