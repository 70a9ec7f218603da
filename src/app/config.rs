use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_API_KEY_ENV, DEFAULT_CHAT_MODEL, DEFAULT_GEMINI_BASE_URL, DEFAULT_GREETING,
    DEFAULT_IMAGE_MODEL, DEFAULT_SYSTEM_INSTRUCTION, FALLBACK_API_KEY_ENV, FALLBACK_REPLY,
};
use crate::utils::ChatError;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Gemini endpoint configuration
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Conversation persona and canned messages
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Gemini endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// REST base URL (without the `/models/...` suffix)
    pub base_url: String,
    /// Environment variable containing the API key
    pub api_key_env: String,
    /// Inline API key; takes precedence over `api_key_env` when set
    pub api_key: Option<String>,
    /// Model used for chat turns
    pub chat_model: String,
    /// Model used for therapy illustrations
    pub image_model: String,
    /// Optional per-request timeout. Unset means requests run until the endpoint answers.
    pub request_timeout_secs: Option<u64>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            api_key: None,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            request_timeout_secs: None,
        }
    }
}

impl GeminiConfig {
    /// Resolve the API key: inline value, then `api_key_env`, then `GEMINI_API_KEY`.
    /// Empty values are treated as missing.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    /// Same as [`resolve_api_key`](Self::resolve_api_key), reading variables through `lookup`
    pub fn resolve_api_key_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        let non_blank = |key: String| {
            let key = key.trim().to_string();
            (!key.is_empty()).then_some(key)
        };

        self.api_key
            .clone()
            .and_then(non_blank)
            .or_else(|| lookup(&self.api_key_env).and_then(non_blank))
            .or_else(|| lookup(FALLBACK_API_KEY_ENV).and_then(non_blank))
    }
}

/// Conversation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Instruction preamble sent with every turn
    pub system_instruction: String,
    /// First assistant message of every session
    pub greeting: String,
    /// Assistant message substituted for a failed turn
    pub fallback_reply: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            fallback_reply: FALLBACK_REPLY.to_string(),
        }
    }
}

/// Load configuration from multiple sources
pub fn load_config() -> Result<Config> {
    let global_config = get_config_dir()?.join("config.toml");
    let local_config = PathBuf::from(".betahealth/config.toml");

    load_config_from(&[global_config, local_config])
}

/// Load configuration from an explicit list of TOML files (later files win),
/// then apply `BETAHEALTH_` environment overrides
pub fn load_config_from(paths: &[PathBuf]) -> Result<Config> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    for path in paths {
        if path.exists() {
            figment = figment.merge(Toml::file(path));
        }
    }

    // e.g. BETAHEALTH_GEMINI__CHAT_MODEL=gemini-2.5-pro
    figment = figment.merge(Env::prefixed("BETAHEALTH_").split("__"));

    let config = figment
        .extract()
        .map_err(|e| ChatError::Config(e.to_string()))
        .context("Failed to load configuration")?;
    Ok(config)
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "betahealth") {
        let config_dir = proj_dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;
        Ok(config_dir.to_path_buf())
    } else {
        // Fallback to home directory
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("Could not determine home directory")?;
        let config_dir = PathBuf::from(home).join(".config").join("betahealth");
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }
}

/// Save configuration to file
pub fn save_config(config: &Config, path: Option<PathBuf>) -> Result<()> {
    let path = if let Some(p) = path {
        p
    } else {
        get_config_dir()?.join("config.toml")
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(ChatError::from)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let toml_string =
        toml::to_string_pretty(config).map_err(|e| ChatError::Config(e.to_string()))?;
    std::fs::write(&path, toml_string)
        .map_err(ChatError::from)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}

/// Create a default configuration file if it doesn't exist.
/// Returns the path of the config file.
pub fn init_config() -> Result<PathBuf> {
    let config_file = get_config_dir()?.join("config.toml");
    init_config_at(&config_file)?;
    Ok(config_file)
}

/// Write the default configuration to `path` unless a file is already there.
/// Returns `true` when a new file was written.
pub fn init_config_at(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    save_config(&Config::default(), Some(path.to_path_buf()))?;
    Ok(true)
}
