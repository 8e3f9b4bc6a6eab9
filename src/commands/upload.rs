use std::path::PathBuf;

use colored::Colorize;

use crate::client::ApiClient;
use crate::commands::chat::{run_chat, ChatTarget};
use crate::config::Config;
use crate::error::Result;

/// Upload a PDF and print the new session, optionally chatting about it
pub async fn run_upload(config: Config, file: PathBuf, chat: bool) -> Result<()> {
    let client = ApiClient::new(&config.api)?;
    let upload = client.upload_document(&file).await?;

    let name = if upload.filename.is_empty() {
        file.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| upload.session_id.clone())
    } else {
        upload.filename.clone()
    };

    println!("{}", "Document uploaded".green().bold());
    println!("  Session:    {}", upload.session_id.cyan());
    println!("  Document:   {}", name);
    println!("  Chunks:     {}", upload.chunk_count);
    println!("  Processing: {:.2}s", upload.processing_time);

    if chat {
        run_chat(
            config,
            ChatTarget::New {
                session_id: upload.session_id,
                name,
            },
        )
        .await
    } else {
        println!();
        println!(
            "Use {} to ask about it.",
            format!("docchat chat --session {} --name \"{}\"", upload.session_id, name).cyan()
        );
        Ok(())
    }
}
