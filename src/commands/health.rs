use crate::client::ApiClient;
use crate::config::Config;
use crate::error::Result;
use colored::Colorize;

/// Check the server and print its status.
///
/// An unreachable server is reported, not treated as a failure of the
/// command itself.
pub async fn run_health(config: &Config) -> Result<()> {
    let client = ApiClient::new(&config.api)?;
    let status = client.health().await;

    let label = if status.is_healthy() {
        status.status.green().bold()
    } else {
        status.status.red().bold()
    };
    println!("{} {}", client.base_url(), label);

    for (key, value) in &status.details {
        match value {
            serde_json::Value::String(s) => println!("  {}: {}", key, s),
            other => println!("  {}: {}", key, other),
        }
    }
    Ok(())
}
