//! Interactive chat mode handler.
//!
//! Opens the session store, makes the requested session active, and runs a
//! readline loop that sends each line to the server as a question. Tokens
//! are echoed as they stream; the conversation itself lives in the
//! [`ChatController`], which saves it once each answer settles.

use std::io::Write;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio_util::sync::CancellationToken;

use crate::chat::ChatController;
use crate::client::{ApiClient, ChatBackend, ChatCallbacks, StreamOutcome};
use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
use crate::config::Config;
use crate::error::{DocChatError, Result};
use crate::storage::{open_store, Message, Role};

/// Which session the chat loop should run against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatTarget {
    /// A session the server just created; nothing saved yet
    New {
        /// Server session id
        session_id: String,
        /// Display name, normally the uploaded filename
        name: String,
    },
    /// A locally saved session
    Resume(String),
}

/// Start interactive chat mode
///
/// # Errors
///
/// Fails if the API client cannot be built, the resumed session does not
/// exist, or the terminal cannot be opened.
pub async fn run_chat(config: Config, target: ChatTarget) -> Result<()> {
    let client = ApiClient::new(&config.api)?;
    let store = open_store(&config.storage);
    let controller = ChatController::new(store, &config);

    match target {
        ChatTarget::New { session_id, name } => {
            controller.start_session(session_id, name).await;
        }
        ChatTarget::Resume(id) => {
            controller.load_session(&id).await?;
        }
    }

    print_banner(&controller);
    print_messages(&controller.messages());

    let result = chat_loop(&controller, &client).await;
    controller.shutdown().await;
    result
}

async fn chat_loop(controller: &ChatController, client: &ApiClient) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let backend = EchoBackend { inner: client };

    loop {
        let prompt = format!("{} ", "?>".cyan().bold());
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(trimmed)?;

                match parse_special_command(trimmed) {
                    Ok(SpecialCommand::None) => {}
                    Ok(SpecialCommand::Sources) => {
                        print_sources(&controller.sources());
                        continue;
                    }
                    Ok(SpecialCommand::History) => {
                        print_messages(&controller.messages());
                        continue;
                    }
                    Ok(SpecialCommand::Help) => {
                        print_help();
                        continue;
                    }
                    Ok(SpecialCommand::Clear) => {
                        controller.clear().await;
                        println!("{}", "Session saved and closed.".green());
                        break;
                    }
                    Ok(SpecialCommand::Exit) => break,
                    Err(e) => {
                        eprintln!("{}", e.to_string().red());
                        continue;
                    }
                }

                ask(controller, &backend, trimmed).await;
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

/// Send one question, letting Ctrl-C stop the answer without leaving chat
async fn ask(controller: &ChatController, backend: &EchoBackend<'_>, question: &str) {
    let answer = controller.ask(backend, question);
    tokio::pin!(answer);

    let mut interrupted = false;
    let result = loop {
        tokio::select! {
            result = &mut answer => break result,
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                controller.cancel_stream();
            }
        }
    };
    println!();

    match result {
        Ok(StreamOutcome::Completed { processing_time }) => {
            print_sources(&controller.sources());
            println!(
                "{}",
                format!("Answered in {:.2}s", processing_time).dimmed()
            );
        }
        Ok(StreamOutcome::Failed) => {
            let reason = controller
                .last_error()
                .unwrap_or_else(|| "unknown error".to_string());
            eprintln!("{} {}", "Error:".red().bold(), reason);
            if let Some(apology) = controller.messages().last() {
                println!("{}", apology.content.yellow());
            }
        }
        Ok(StreamOutcome::Cancelled) => {
            println!("{}", "Answer stopped.".yellow());
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
        }
    }
}

/// Forwards to the API client, echoing tokens to stdout as they arrive
struct EchoBackend<'a> {
    inner: &'a ApiClient,
}

#[async_trait::async_trait]
impl<'a> ChatBackend for EchoBackend<'a> {
    async fn stream_chat(
        &self,
        question: &str,
        session_id: &str,
        cancel: &CancellationToken,
        callbacks: &mut (dyn ChatCallbacks + Send),
    ) -> Result<StreamOutcome> {
        let mut echo = Echo { inner: callbacks };
        self.inner
            .send_chat_message_cancellable(question, session_id, cancel, &mut echo)
            .await
    }
}

struct Echo<'a> {
    inner: &'a mut (dyn ChatCallbacks + Send),
}

impl ChatCallbacks for Echo<'_> {
    fn on_token(&mut self, token: &str) {
        print!("{}", token);
        let _ = std::io::stdout().flush();
        self.inner.on_token(token);
    }

    fn on_sources(&mut self, sources: Vec<String>) {
        self.inner.on_sources(sources);
    }

    fn on_complete(&mut self, processing_time: f64) {
        self.inner.on_complete(processing_time);
    }

    fn on_error(&mut self, error: DocChatError) {
        self.inner.on_error(error);
    }
}

fn print_banner(controller: &ChatController) {
    let name = controller.session_name().unwrap_or_default();
    let id = controller.session_id().unwrap_or_default();
    println!();
    println!("{} {}", "Chatting about".bold(), name.cyan().bold());
    println!("{}", format!("session {}", id).dimmed());
    println!("Type {} for commands.", "/help".cyan());
    println!();
}

fn print_messages(messages: &[Message]) {
    for message in messages {
        match message.role {
            Role::User => println!("{} {}", "You:".bold().cyan(), message.content),
            Role::Assistant if message.is_error => {
                println!("{} {}", "Assistant:".bold().yellow(), message.content.yellow())
            }
            Role::Assistant => println!("{} {}", "Assistant:".bold().green(), message.content),
        }
    }
}

fn print_sources(sources: &[String]) {
    if sources.is_empty() {
        println!("{}", "No sources reported.".dimmed());
        return;
    }
    println!("{}", "Sources:".bold());
    for (i, source) in sources.iter().enumerate() {
        println!("  [{}] {}", i + 1, source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::events::tests::Recorder;

    #[test]
    fn test_echo_forwards_every_callback() {
        let mut recorder = Recorder::default();
        {
            let mut echo = Echo {
                inner: &mut recorder,
            };
            echo.on_token("The");
            echo.on_sources(vec!["p1".to_string()]);
            echo.on_complete(0.5);
        }
        assert_eq!(recorder.tokens, vec!["The".to_string()]);
        assert_eq!(recorder.sources, vec![vec!["p1".to_string()]]);
        assert_eq!(recorder.completions, vec![0.5]);
    }
}
