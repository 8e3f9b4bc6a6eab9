use crate::cli::{ExportFormat, HistoryCommand};
use crate::config::Config;
use crate::error::Result;
use crate::storage::{open_store, with_store, ChatSession, Role};
use colored::Colorize;
use prettytable::{format, Table};

/// Handle history commands
pub async fn handle_history(config: &Config, command: HistoryCommand) -> Result<()> {
    let store = open_store(&config.storage);

    match command {
        HistoryCommand::List => {
            let sessions = with_store(&store, |s| s.list()).await?;

            if sessions.is_empty() {
                println!("{}", "No saved conversations found.".yellow());
                return Ok(());
            }

            println!("\nSaved Conversations:");
            session_table(&sessions).printstd();
            println!();
            println!(
                "Use {} to resume a conversation.",
                "docchat chat --resume <ID>".cyan()
            );
            println!();
        }
        HistoryCommand::Show { id, format, output } => {
            let session = with_store(&store, move |s| s.get(&id)).await?;
            let Some(format) = format else {
                print_session(&session);
                return Ok(());
            };

            let exported = export_session(&session, format)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, exported)?;
                    tracing::info!("Exported session {} to {}", session.id, path.display());
                    println!(
                        "{}",
                        format!("Exported conversation to {}", path.display()).green()
                    );
                }
                None => println!("{}", exported),
            }
        }
        HistoryCommand::Delete { id } => {
            let deleted = id.clone();
            with_store(&store, move |s| s.delete(&deleted)).await?;
            println!("{}", format!("Deleted conversation {}", id).green());
        }
    }

    Ok(())
}

/// Render a stored conversation in an export format
pub fn export_session(session: &ChatSession, format: ExportFormat) -> Result<String> {
    Ok(match format {
        ExportFormat::Text => session.to_text(),
        ExportFormat::Json => session.to_json()?,
        ExportFormat::Markdown => session.to_markdown(),
    })
}

fn session_table(sessions: &[ChatSession]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Document".bold(),
        "Messages".bold(),
        "Last Updated".bold()
    ]);

    for session in sessions {
        let name = truncate(&session.name, 40);
        let updated = session.last_updated.format("%Y-%m-%d %H:%M").to_string();

        table.add_row(prettytable::row![
            session.id.cyan(),
            name,
            session.messages.len(),
            updated
        ]);
    }
    table
}

fn print_session(session: &ChatSession) {
    println!();
    println!("{} {}", session.name.bold(), format!("({})", session.id).dimmed());
    println!(
        "{}",
        format!(
            "Last updated {}",
            session.last_updated.format("%Y-%m-%d %H:%M")
        )
        .dimmed()
    );
    println!();
    for message in &session.messages {
        let speaker = match message.role {
            Role::User => "You:".bold().cyan(),
            Role::Assistant if message.is_error => "Assistant:".bold().yellow(),
            Role::Assistant => "Assistant:".bold().green(),
        };
        println!("{} {}", speaker, message.content);
    }
    println!();
}

/// Shorten to `max` characters, marking the cut with "..."
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let kept: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Message;

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("short.pdf", 40), "short.pdf");
        let long = "é".repeat(50);
        let cut = truncate(&long, 40);
        assert_eq!(cut.chars().count(), 40);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_session_table_has_row_per_session() {
        let sessions = vec![
            ChatSession::new("a", "a.pdf", vec![Message::user("q")]),
            ChatSession::new("b", "b.pdf", vec![]),
        ];
        let table = session_table(&sessions);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_export_session_formats() {
        let session = ChatSession::new(
            "abc",
            "report.pdf",
            vec![Message::user("What is the total?"), Message::assistant("42")],
        );

        assert_eq!(
            export_session(&session, ExportFormat::Text).unwrap(),
            "USER: What is the total?\n\nASSISTANT: 42"
        );
        assert_eq!(
            export_session(&session, ExportFormat::Markdown).unwrap(),
            "### You\n\nWhat is the total?\n\n### AI Assistant\n\n42"
        );

        let json: serde_json::Value =
            serde_json::from_str(&export_session(&session, ExportFormat::Json).unwrap()).unwrap();
        assert_eq!(json[0]["role"], "user");
        assert_eq!(json[1]["content"], "42");
    }
}
