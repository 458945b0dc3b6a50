//! Application configuration for Ushanka.
//!
//! User config lives at `~/.ushanka/ushanka.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets (API keys, passwords) are referenced by environment-variable
//! name and never stored in the file itself.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, UshankaError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "ushanka.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".ushanka";

// ---------------------------------------------------------------------------
// Config structs (matching ushanka.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Archivematica Storage Service connection.
    #[serde(default)]
    pub archivematica: ArchivematicaConfig,

    /// ArchivesSpace connection.
    #[serde(default)]
    pub archivesspace: ArchivesSpaceConfig,

    /// Fedora repository connection.
    #[serde(default)]
    pub fedora: FedoraConfig,

    /// Ingest policy: collection, content models, working directories.
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// `[archivematica]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivematicaConfig {
    /// Storage Service API base, e.g. `https://localhost:8001/api/v2`.
    #[serde(default = "default_am_url")]
    pub url: String,

    /// API username.
    #[serde(default = "default_am_user")]
    pub username: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_am_key_env")]
    pub api_key_env: String,
}

impl Default for ArchivematicaConfig {
    fn default() -> Self {
        Self {
            url: default_am_url(),
            username: default_am_user(),
            api_key_env: default_am_key_env(),
        }
    }
}

fn default_am_url() -> String {
    "https://localhost:8001/api/v2".into()
}
fn default_am_user() -> String {
    "test".into()
}
fn default_am_key_env() -> String {
    "ARCHIVEMATICA_API_KEY".into()
}

/// `[archivesspace]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivesSpaceConfig {
    /// ArchivesSpace backend base URL.
    #[serde(default = "default_as_url")]
    pub url: String,

    /// Backend username.
    #[serde(default = "default_as_user")]
    pub username: String,

    /// Name of the env var holding the password.
    #[serde(default = "default_as_password_env")]
    pub password_env: String,

    /// Numeric repository id the accessions live in.
    #[serde(default = "default_as_repository")]
    pub repository: u32,
}

impl Default for ArchivesSpaceConfig {
    fn default() -> Self {
        Self {
            url: default_as_url(),
            username: default_as_user(),
            password_env: default_as_password_env(),
            repository: default_as_repository(),
        }
    }
}

fn default_as_url() -> String {
    "http://localhost:8089".into()
}
fn default_as_user() -> String {
    "admin".into()
}
fn default_as_password_env() -> String {
    "ARCHIVESSPACE_PASSWORD".into()
}
fn default_as_repository() -> u32 {
    2
}

/// `[fedora]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FedoraConfig {
    /// Fedora base URL (the REST API lives under `/fedora`).
    #[serde(default = "default_fedora_url")]
    pub url: String,

    /// Repository username.
    #[serde(default = "default_fedora_user")]
    pub username: String,

    /// Name of the env var holding the password.
    #[serde(default = "default_fedora_password_env")]
    pub password_env: String,

    /// Pid namespace new objects are minted under.
    #[serde(default = "default_fedora_namespace")]
    pub namespace: String,
}

impl Default for FedoraConfig {
    fn default() -> Self {
        Self {
            url: default_fedora_url(),
            username: default_fedora_user(),
            password_env: default_fedora_password_env(),
            namespace: default_fedora_namespace(),
        }
    }
}

fn default_fedora_url() -> String {
    "http://localhost:8080".into()
}
fn default_fedora_user() -> String {
    "fedoraAdmin".into()
}
fn default_fedora_password_env() -> String {
    "FEDORA_PASSWORD".into()
}
fn default_fedora_namespace() -> String {
    "test".into()
}

/// `[ingest]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Collection every compound object becomes a member of.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Content model for compound objects.
    #[serde(default = "default_compound_model")]
    pub compound_model: String,

    /// Content model for DIP parts.
    #[serde(default = "default_part_model")]
    pub part_model: String,

    /// XACML policy file attached as the POLICY datastream.
    #[serde(default = "default_policy_file")]
    pub policy_file: String,

    /// Working directory packages are downloaded and unpacked into.
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            compound_model: default_compound_model(),
            part_model: default_part_model(),
            policy_file: default_policy_file(),
            work_dir: default_work_dir(),
        }
    }
}

fn default_collection() -> String {
    "islandora:test".into()
}
fn default_compound_model() -> String {
    "islandora:compoundCModel".into()
}
fn default_part_model() -> String {
    "islandora:binaryObjectCModel".into()
}
fn default_policy_file() -> String {
    "policy/default-policy.xml".into()
}
fn default_work_dir() -> String {
    "/tmp/ushanka".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.ushanka/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| UshankaError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.ushanka/ushanka.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| UshankaError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| UshankaError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| UshankaError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| UshankaError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| UshankaError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a secret from the env var a config field names.
pub fn resolve_secret(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(UshankaError::config(format!(
            "secret not found: set the {var_name} environment variable"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("api_key_env"));
        assert!(toml_str.contains("islandora:compoundCModel"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.archivesspace.repository, 2);
        assert_eq!(parsed.fedora.namespace, "test");
        assert_eq!(parsed.ingest.collection, "islandora:test");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[archivematica]
url = "https://storage.example.edu/api/v2"
username = "ingest-bot"

[ingest]
collection = "islandora:covid19"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.archivematica.url, "https://storage.example.edu/api/v2");
        assert_eq!(config.archivematica.api_key_env, "ARCHIVEMATICA_API_KEY");
        assert_eq!(config.ingest.collection, "islandora:covid19");
        assert_eq!(config.ingest.part_model, "islandora:binaryObjectCModel");
    }

    #[test]
    fn secret_resolution() {
        // Use a unique env var name to avoid interfering with other tests
        let result = resolve_secret("USHANKA_TEST_NONEXISTENT_KEY_12345");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("secret not found"));
    }
}
