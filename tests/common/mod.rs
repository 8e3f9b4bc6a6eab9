use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use docchat::client::ChatCallbacks;
use docchat::config::{ApiConfig, Config};
use docchat::storage::SqliteSessionStore;
use docchat::DocChatError;

#[allow(dead_code)]
pub fn create_temp_store() -> (SqliteSessionStore, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("sessions.db");
    let store =
        SqliteSessionStore::new_with_path(db_path).expect("failed to create sqlite store with path");
    (store, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Config pointing at a mock server, with short timeouts
#[allow(dead_code)]
pub fn config_for(base_url: &str) -> Config {
    Config {
        api: ApiConfig {
            base_url: base_url.to_string(),
            connect_timeout_secs: 2,
            stream_idle_timeout_secs: 2,
            request_timeout_secs: 5,
        },
        ..Config::default()
    }
}

/// Build an SSE body from `(event, data)` pairs
#[allow(dead_code)]
pub fn sse_body(records: &[(&str, &str)]) -> Vec<u8> {
    records
        .iter()
        .map(|(event, data)| format!("event: {}\ndata: {}\n\n", event, data))
        .collect::<String>()
        .into_bytes()
}

/// Records every callback in arrival order
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct Recorder {
    pub tokens: Vec<String>,
    pub sources: Vec<Vec<String>>,
    pub completions: Vec<f64>,
    pub errors: Vec<String>,
    pub log: Vec<String>,
}

impl ChatCallbacks for Recorder {
    fn on_token(&mut self, token: &str) {
        self.tokens.push(token.to_string());
        self.log.push("token".to_string());
    }

    fn on_sources(&mut self, sources: Vec<String>) {
        self.sources.push(sources);
        self.log.push("sources".to_string());
    }

    fn on_complete(&mut self, processing_time: f64) {
        self.completions.push(processing_time);
        self.log.push("complete".to_string());
    }

    fn on_error(&mut self, error: DocChatError) {
        self.errors.push(error.to_string());
        self.log.push("error".to_string());
    }
}
