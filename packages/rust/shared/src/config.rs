//! Application configuration for noticescore.
//!
//! User config lives at `~/.noticescore/noticescore.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NoticeScoreError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "noticescore.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".noticescore";

// ---------------------------------------------------------------------------
// Enumerated settings
// ---------------------------------------------------------------------------

/// Layout of the score table written for each run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// A single pretty-printed JSON array (`scores.json`).
    #[default]
    Json,
    /// One JSON object per line (`scores.jsonl`).
    Jsonl,
}

impl OutputFormat {
    /// File name of the score table for this format.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Json => "scores.json",
            Self::Jsonl => "scores.jsonl",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = NoticeScoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "jsonl" => Ok(Self::Jsonl),
            other => Err(NoticeScoreError::config(format!(
                "unknown output format '{other}': expected 'json' or 'jsonl'"
            ))),
        }
    }
}

/// What an attachment whose text is null is scored as.
///
/// `Placeholder` reproduces the historical behaviour of scoring the literal
/// `None`. `Empty` scores an empty string instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingTextPolicy {
    #[default]
    Placeholder,
    Empty,
}

// ---------------------------------------------------------------------------
// Config structs (matching noticescore.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Scoring behaviour.
    #[serde(default)]
    pub scoring: ScoringSection,

    /// Run persistence.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Path to the frozen classifier artifact.
    #[serde(default = "default_model_path")]
    pub model_path: String,

    /// Directory that receives one sub-directory per run.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Score table format.
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            output_dir: default_output_dir(),
            format: OutputFormat::default(),
        }
    }
}

fn default_model_path() -> String {
    "binaries/best_clf.json".into()
}
fn default_output_dir() -> String {
    "var/runs".into()
}

/// `[scoring]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringSection {
    /// Texts per classifier call. 0 scores the whole run in one batch.
    #[serde(default)]
    pub chunk_size: usize,

    /// Treatment of attachments whose text is null.
    #[serde(default)]
    pub missing_text: MissingTextPolicy,
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Whether runs are recorded in the database.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Database file path.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: default_db_path(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_db_path() -> String {
    "var/noticescore.db".into()
}

// ---------------------------------------------------------------------------
// Scoring config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime scoring configuration, merged from config file and CLI flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringConfig {
    /// Texts per classifier call; 0 means a single batch.
    pub chunk_size: usize,
    /// Treatment of null attachment text.
    pub missing_text: MissingTextPolicy,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ScoringConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            chunk_size: config.scoring.chunk_size,
            missing_text: config.scoring.missing_text,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.noticescore/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| NoticeScoreError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.noticescore/noticescore.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| NoticeScoreError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        NoticeScoreError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| NoticeScoreError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| NoticeScoreError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| NoticeScoreError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("model_path"));
        assert!(toml_str.contains("placeholder"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.format, OutputFormat::Json);
        assert_eq!(parsed.scoring.chunk_size, 0);
        assert!(parsed.storage.enabled);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[scoring]
chunk_size = 256
missing_text = "empty"

[storage]
enabled = false
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.scoring.chunk_size, 256);
        assert_eq!(config.scoring.missing_text, MissingTextPolicy::Empty);
        assert!(!config.storage.enabled);
        assert_eq!(config.storage.db_path, "var/noticescore.db");
        assert_eq!(config.defaults.output_dir, "var/runs");
    }

    #[test]
    fn scoring_config_from_app_config() {
        let mut app = AppConfig::default();
        app.scoring.chunk_size = 64;
        let scoring = ScoringConfig::from(&app);
        assert_eq!(scoring.chunk_size, 64);
        assert_eq!(scoring.missing_text, MissingTextPolicy::Placeholder);
    }

    #[test]
    fn output_format_parsing() {
        assert_eq!("jsonl".parse::<OutputFormat>().unwrap(), OutputFormat::Jsonl);
        assert_eq!(OutputFormat::Json.file_name(), "scores.json");
        let err = "csv".parse::<OutputFormat>().unwrap_err();
        assert!(err.to_string().contains("unknown output format"));
    }

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("noticescore.toml");
        std::fs::write(&path, "[defaults]\nformat = \"jsonl\"\n").expect("write");
        let config = load_config_from(&path).expect("load");
        assert_eq!(config.defaults.format, OutputFormat::Jsonl);

        std::fs::write(&path, "[defaults\n").expect("write");
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }
}
