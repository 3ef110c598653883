//! Application configuration for ConceptScribe.
//!
//! User config lives at `~/.conceptscribe/conceptscribe.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScribeError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "conceptscribe.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".conceptscribe";

// ---------------------------------------------------------------------------
// Config structs (matching conceptscribe.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Anthropic API settings.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Research loop bounds.
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default output folder for the emitted artifact set.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Number of prior exchanges replayed per inference call.
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Path to the session transcript database.
    #[serde(default = "default_session_db")]
    pub session_db: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_folder: default_output_folder(),
            history_window: default_history_window(),
            session_db: default_session_db(),
        }
    }
}

fn default_output_folder() -> String {
    "out".into()
}
fn default_history_window() -> usize {
    3
}
fn default_session_db() -> String {
    "tmp/sessions.db".into()
}

/// `[anthropic]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Default model for the research loop.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Maximum tokens per inference response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// URL of the llms.txt specification reference document.
    #[serde(default = "default_reference_url")]
    pub reference_url: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            max_tokens: default_max_tokens(),
            reference_url: default_reference_url(),
        }
    }
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".into()
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_max_tokens() -> usize {
    4096
}
fn default_reference_url() -> String {
    "https://llmstxt.org/llms.txt".into()
}

/// `[limits]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum pages visited per run. Guarantees crawl termination.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Maximum policy decisions per run. Backstop against a policy that
    /// never signals completion.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Maximum results returned per search invocation.
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            max_steps: default_max_steps(),
            max_search_results: default_max_search_results(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_max_pages() -> usize {
    25
}
fn default_max_steps() -> usize {
    60
}
fn default_max_search_results() -> usize {
    8
}
fn default_timeout_secs() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Run limits (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime loop bounds — merged from config file + CLI flags.
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    /// Maximum pages visited per run.
    pub max_pages: usize,
    /// Maximum policy decisions per run.
    pub max_steps: usize,
    /// Maximum results per search.
    pub max_search_results: usize,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl From<&AppConfig> for RunLimits {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_pages: config.limits.max_pages,
            max_steps: config.limits.max_steps,
            max_search_results: config.limits.max_search_results,
            timeout_secs: config.limits.timeout_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.conceptscribe/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ScribeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.conceptscribe/conceptscribe.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| ScribeError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ScribeError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ScribeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ScribeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ScribeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the Anthropic API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.anthropic.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(ScribeError::config(format!(
            "Anthropic API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://console.anthropic.com/settings/keys"
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
        assert!(toml_str.contains("output_folder"));
        assert!(toml_str.contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.output_folder, "out");
        assert_eq!(parsed.defaults.history_window, 3);
        assert_eq!(parsed.limits.max_pages, 25);
        assert_eq!(parsed.anthropic.api_key_env, "ANTHROPIC_API_KEY");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
output_folder = "research"

[limits]
max_pages = 5
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.defaults.output_folder, "research");
        assert_eq!(config.defaults.history_window, 3);
        assert_eq!(config.limits.max_pages, 5);
        assert_eq!(config.limits.max_steps, 60);
    }

    #[test]
    fn run_limits_from_app_config() {
        let app = AppConfig::default();
        let limits = RunLimits::from(&app);
        assert_eq!(limits.max_pages, 25);
        assert_eq!(limits.max_steps, 60);
        assert_eq!(limits.timeout_secs, 30);
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.anthropic.api_key_env = "CS_TEST_NONEXISTENT_KEY_98431".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
