use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

fn default_host() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_text_model() -> String {
    "gemini-2.5-flash-preview-05-20".to_string()
}

fn default_image_model() -> String {
    "imagen-3.0-generate-002".to_string()
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// Injected at startup: config file or the GEMINI_API_KEY environment
    /// variable. Never ships in source.
    #[serde(default)]
    pub key: String,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            host: default_host(),
            key: String::new(),
            text_model: default_text_model(),
            image_model: default_image_model(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            width: 1100,
            height: 720,
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let config_path = Self::get_config_path();

        let mut config = if config_path.exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(config) => config,
                    Err(e) => {
                        eprintln!("Error parsing config.toml: {}. Using defaults.", e);
                        Config::default()
                    }
                },
                Err(e) => {
                    eprintln!("Error reading config.toml: {}. Using defaults.", e);
                    Config::default()
                }
            }
        } else {
            // Create config directory if it doesn't exist
            if let Some(parent) = config_path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            Config::default()
        };

        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.trim().is_empty() {
                config.api.key = key;
            }
        }

        config
    }

    pub fn get_config_path() -> PathBuf {
        Self::get_config_dir().join("config.toml")
    }

    pub fn get_config_dir() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/rare-chat")
        } else {
            PathBuf::from(".")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.host, "https://generativelanguage.googleapis.com");
        assert!(config.api.key.is_empty());
        assert_eq!(config.window.width, 1100);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [api]
            key = "secret"
            "#,
        )
        .unwrap();
        assert_eq!(config.api.key, "secret");
        assert_eq!(config.api.text_model, default_text_model());
        assert_eq!(config.window.height, 720);
    }

    #[test]
    fn test_empty_toml_is_valid() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.api.image_model, default_image_model());
    }
}
