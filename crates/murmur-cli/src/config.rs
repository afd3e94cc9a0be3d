//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Configuration for murmur
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bearer token for the chat service
    pub token: Option<String>,
    /// Model identifier to request
    pub model: Option<String>,
    /// Conversation endpoint URL
    pub endpoint: Option<String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("murmur")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        // Check for MURMUR_CONFIG_PATH env var first
        if let Ok(path) = std::env::var("MURMUR_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {e}");
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {e}");
                Self::default()
            }
        }
    }

    /// Create a commented template config file if one doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, example_config())?;
        Ok(path)
    }
}

/// Pick the credential: the command-line flag beats the config file, which
/// beats the environment variable.
pub fn resolve_token(
    flag: Option<String>,
    file: Option<String>,
    env: Option<String>,
) -> Option<String> {
    flag.or(file).or(env)
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# murmur configuration file
# Place at ~/.config/murmur/config.toml (Linux/Mac) or %APPDATA%\murmur\config.toml (Windows)

# Bearer token for the chat service (can also use the MURMUR_TOKEN
# environment variable or the --token flag)
# token = "eyJhbGciOi..."

# Model identifier to request (optional)
# model = "text-davinci-002-render"

# Conversation endpoint URL (optional)
# endpoint = "https://chat.openai.com/backend-api/conversation"
"#
}
