//! Command-line interface definition for DocChat
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for uploading documents, chatting about them, and
//! managing locally saved sessions.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// DocChat - chat with your PDF documents
///
/// Uploads a document to a question-answering server, streams answers to
/// your questions, and keeps the conversation on disk so it can be resumed.
#[derive(Parser, Debug, Clone)]
#[command(name = "docchat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the server base URL
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Override the session database location
    #[arg(long, value_name = "PATH")]
    pub storage_path: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for DocChat
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Upload a PDF and start a new session for it
    Upload {
        /// Path to the PDF file
        file: PathBuf,

        /// Start chatting about the document right after upload
        #[arg(long)]
        chat: bool,
    },

    /// Chat about an uploaded document
    Chat {
        /// Server session id returned by `upload`
        #[arg(short, long, conflicts_with = "resume", required_unless_present = "resume")]
        session: Option<String>,

        /// Display name for a new session (defaults to the session id)
        #[arg(short, long, requires = "session")]
        name: Option<String>,

        /// Resume a locally saved session by id
        #[arg(short, long)]
        resume: Option<String>,
    },

    /// Manage locally saved conversations
    History {
        /// History subcommand
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Manage sessions held by the server
    Sessions {
        /// Sessions subcommand
        #[command(subcommand)]
        command: SessionsCommand,
    },

    /// Check whether the server is reachable
    Health,
}

/// Local history subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum HistoryCommand {
    /// List saved conversations, most recent first
    List,

    /// Print a saved conversation
    Show {
        /// Session id
        id: String,

        /// Export in this format instead of printing colored text
        #[arg(long, value_enum)]
        format: Option<ExportFormat>,

        /// Write the export to a file instead of stdout
        #[arg(short, long, requires = "format")]
        output: Option<PathBuf>,
    },

    /// Delete a saved conversation
    Delete {
        /// Session id
        id: String,
    },
}

/// Conversation export formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// `USER: ...` / `ASSISTANT: ...` blocks
    Text,
    /// Pretty-printed message array
    Json,
    /// `### You` / `### AI Assistant` sections
    Markdown,
}

/// Server session subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SessionsCommand {
    /// List sessions the server still has an index for
    List,

    /// Delete a session on the server
    Delete {
        /// Session id
        id: String,

        /// Keep the local copy of the conversation
        #[arg(long)]
        keep_local: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            api_url: None,
            storage_path: None,
            command: Commands::Health,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default() {
        let cli = Cli::default();
        assert_eq!(cli.config, Some("config/config.yaml".to_string()));
        assert!(!cli.verbose);
        assert!(cli.api_url.is_none());
        assert!(matches!(cli.command, Commands::Health));
    }

    #[test]
    fn test_parse_upload_with_chat() {
        let cli = Cli::try_parse_from(["docchat", "upload", "report.pdf", "--chat"]).unwrap();
        match cli.command {
            Commands::Upload { file, chat } => {
                assert_eq!(file, PathBuf::from("report.pdf"));
                assert!(chat);
            }
            other => panic!("Expected Upload, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_chat_session_and_name() {
        let cli =
            Cli::try_parse_from(["docchat", "chat", "--session", "abc", "--name", "a.pdf"])
                .unwrap();
        match cli.command {
            Commands::Chat {
                session,
                name,
                resume,
            } => {
                assert_eq!(session.as_deref(), Some("abc"));
                assert_eq!(name.as_deref(), Some("a.pdf"));
                assert!(resume.is_none());
            }
            other => panic!("Expected Chat, got {:?}", other),
        }
    }

    #[test]
    fn test_chat_requires_session_or_resume() {
        assert!(Cli::try_parse_from(["docchat", "chat"]).is_err());
        assert!(Cli::try_parse_from(["docchat", "chat", "--resume", "abc"]).is_ok());
        assert!(
            Cli::try_parse_from(["docchat", "chat", "--session", "a", "--resume", "b"]).is_err()
        );
    }

    #[test]
    fn test_parse_history_show_format() {
        let cli = Cli::try_parse_from(["docchat", "history", "show", "abc", "--format", "json"])
            .unwrap();
        match cli.command {
            Commands::History { command } => assert_eq!(
                command,
                HistoryCommand::Show {
                    id: "abc".to_string(),
                    format: Some(ExportFormat::Json),
                    output: None,
                }
            ),
            other => panic!("Expected History, got {:?}", other),
        }
    }

    #[test]
    fn test_history_show_output_requires_format() {
        assert!(
            Cli::try_parse_from(["docchat", "history", "show", "abc", "-o", "chat.md"]).is_err()
        );
        assert!(
            Cli::try_parse_from(["docchat", "history", "show", "abc", "--format", "pdf"]).is_err()
        );
        assert!(Cli::try_parse_from([
            "docchat", "history", "show", "abc", "--format", "text", "-o", "chat.txt"
        ])
        .is_ok());
    }

    #[test]
    fn test_global_overrides() {
        let cli = Cli::try_parse_from([
            "docchat",
            "--api-url",
            "http://qa.local:9000",
            "--storage-path",
            "/tmp/s.db",
            "-v",
            "health",
        ])
        .unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://qa.local:9000"));
        assert_eq!(cli.storage_path.as_deref(), Some("/tmp/s.db"));
        assert!(cli.verbose);
    }

    #[test]
    fn test_parse_sessions_delete_keep_local() {
        let cli =
            Cli::try_parse_from(["docchat", "sessions", "delete", "abc", "--keep-local"]).unwrap();
        match cli.command {
            Commands::Sessions { command } => assert_eq!(
                command,
                SessionsCommand::Delete {
                    id: "abc".to_string(),
                    keep_local: true
                }
            ),
            other => panic!("Expected Sessions, got {:?}", other),
        }
    }
}
