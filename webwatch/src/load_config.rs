/// `load_config` module: loads and validates the static YAML config for the
/// CLI. Secrets (the document store API key) never live in the file; they
/// are injected from the environment by the store client.
///
/// This module is the only place where untrusted YAML is parsed and mapped
/// to strongly-typed internal structs.
///
/// # Errors
/// All errors here use `anyhow::Error` for context-rich diagnostics and are
/// surfaced at the CLI boundary.
use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    pub storage: StorageSection,
    pub notify: NotifySection,
}

/// Document store coordinates. The API key comes from `APPWRITE_API_KEY`.
#[derive(Debug, Deserialize)]
pub struct StorageSection {
    pub endpoint: String,
    pub project_id: String,
    pub database_id: String,
}

/// Outbound report endpoints: immediate delivery and the pooled sink.
#[derive(Debug, Deserialize)]
pub struct NotifySection {
    pub deliver_url: String,
    pub pool_url: String,
}

/// Loads the static YAML config file (no secrets).
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    Ok(config)
}
