use crate::errors::{ConsultError, ConsultResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Name of the configuration directory under `~/.config`
pub const APP_NAME: &str = "consult";

/// Top level configuration for the analysis service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsultConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub http_addr: SocketAddr,
    /// Origins allowed by CORS. Empty means any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            allowed_origins: Vec::new(),
        }
    }
}

/// Generative text provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// "gemini" or "ollama"
    pub provider: String,
    pub api_key: Option<String>,
    pub model_name: String,
    /// Base URL for self-hosted providers
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            api_key: None,
            model_name: "gemini-2.0-flash".to_string(),
            base_url: None,
            temperature: 0.7,
            max_output_tokens: 8192,
            timeout_secs: 90,
        }
    }
}

/// Web search provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub provider: String,
    pub api_key: Option<String>,
    pub max_results: u32,
    /// "basic" or "advanced"
    pub search_depth: String,
    pub base_url: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: "tavily".to_string(),
            api_key: None,
            max_results: 3,
            search_depth: "basic".to_string(),
            base_url: None,
        }
    }
}

/// Settings for the analysis pipeline itself
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Role tag recorded for turns written by the model
    pub ai_role: String,
    /// Year appended to template search queries
    pub search_year: u16,
    /// Deadline for one whole turn, search and generation included
    pub turn_timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ai_role: crate::types::AI_ROLE.to_string(),
            search_year: 2025,
            turn_timeout_secs: 120,
        }
    }
}

/// Login token settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    pub token_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_hours: 24,
        }
    }
}

impl ConsultConfig {
    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> ConsultResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            ConsultError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content)
            .map_err(|e| ConsultError::ConfigError(format!("Failed to parse config file: {}", e)))
    }

    /// Loads configuration from `~/.config/consult/config.toml`
    pub fn load_from_default() -> ConsultResult<Self> {
        let path = get_default_config_file(APP_NAME)?;
        Self::load_from_file(&path)
    }

    /// Saves configuration to a file
    pub fn save_to_file(&self, path: &Path) -> ConsultResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            ConsultError::ConfigError(format!("Failed to serialize config: {}", e))
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ConsultError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        fs::write(path, content).map_err(|e| {
            ConsultError::ConfigError(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Overlay secrets from the process environment (and `.env`, if present).
    pub fn apply_env_overrides(&mut self) {
        dotenvy::dotenv().ok();
        self.apply_overrides_from(|key| env::var(key).ok());
    }

    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("GOOGLE_API_KEY").or_else(|| non_empty("GEMINI_API_KEY")) {
            self.llm.api_key = Some(key);
        }
        if let Some(key) = non_empty("TAVILY_API_KEY") {
            self.search.api_key = Some(key);
        }
        if let Some(secret) = non_empty("CONSULT_JWT_SECRET") {
            self.auth.jwt_secret = Some(secret);
        }
    }
}

/// Helper function to get default config directory
pub fn get_default_config_dir(app_name: &str) -> ConsultResult<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| {
        ConsultError::ConfigError("Could not determine home directory".to_string())
    })?;

    Ok(home_dir.join(".config").join(app_name))
}

/// Helper function to get default config file path
pub fn get_default_config_file(app_name: &str) -> ConsultResult<PathBuf> {
    let config_dir = get_default_config_dir(app_name)?;
    Ok(config_dir.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = ConsultConfig::default();
        assert_eq!(config.server.http_addr.port(), 8000);
        assert_eq!(config.llm.provider, "gemini");
        assert_eq!(config.search.max_results, 3);
        assert_eq!(config.analysis.ai_role, "ai");
        assert_eq!(config.analysis.search_year, 2025);
        assert!(config.auth.jwt_secret.is_none());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = ConsultConfig::load_from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.llm.model_name, "gemini-2.0-flash");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[analysis]\nai_role = \"assistant\"\n\n[search]\nmax_results = 5\n",
        )
        .unwrap();

        let config = ConsultConfig::load_from_file(&path).unwrap();
        assert_eq!(config.analysis.ai_role, "assistant");
        assert_eq!(config.analysis.search_year, 2025);
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.search.search_depth, "basic");
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[server\nhttp_addr = ").unwrap();

        let err = ConsultConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ConsultError::ConfigError(_)));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = ConsultConfig::default();
        config.llm.model_name = "gemini-2.0-pro-exp-02-05".to_string();
        config.server.allowed_origins = vec!["http://localhost:3000".to_string()];

        config.save_to_file(&path).unwrap();
        let loaded = ConsultConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.llm.model_name, "gemini-2.0-pro-exp-02-05");
        assert_eq!(loaded.server.allowed_origins, vec!["http://localhost:3000"]);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("GEMINI_API_KEY", "gemini-key"),
            ("TAVILY_API_KEY", "tavily-key"),
            ("CONSULT_JWT_SECRET", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = ConsultConfig::default();
        config.apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.llm.api_key.as_deref(), Some("gemini-key"));
        assert_eq!(config.search.api_key.as_deref(), Some("tavily-key"));
        assert_eq!(config.auth.jwt_secret, None);
    }

    #[test]
    fn test_google_key_takes_precedence() {
        let mut config = ConsultConfig::default();
        config.apply_overrides_from(|key| match key {
            "GOOGLE_API_KEY" => Some("google".to_string()),
            "GEMINI_API_KEY" => Some("gemini".to_string()),
            _ => None,
        });
        assert_eq!(config.llm.api_key.as_deref(), Some("google"));
    }
}
