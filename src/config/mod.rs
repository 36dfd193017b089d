use anyhow::Result;
use dotenvy::dotenv;
use serde::Deserialize;

fn default_filemaker_api_url() -> String {
    "https://edge.example.com/filemaker".to_string()
}

fn default_backend_api_url() -> String {
    "https://backend.example.com/api".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_false() -> bool {
    false
}

/// Configuration for the application
///
/// URLs have deploy-time defaults; secrets must be present in the
/// environment or startup fails before any network call is made.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the FileMaker Data API edge function
    #[serde(default = "default_filemaker_api_url")]
    pub filemaker_api_url: String,

    /// Bearer token for the FileMaker edge function
    pub filemaker_api_token: String,

    /// Base URL of the backend proxy (Supabase tables and QuickBooks routes)
    #[serde(default = "default_backend_api_url")]
    pub backend_api_url: String,

    /// Shared secret for HMAC-signing backend proxy requests
    pub backend_hmac_secret: String,

    /// Whether the connectivity diagnostics panel is reachable from the UI
    #[serde(default = "default_false")]
    pub qbo_panel_enabled: bool,

    /// Directory for rolling log files
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// This function will:
    /// 1. Load variables from .env file if it exists
    /// 2. Deserialize environment variables into Config struct
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenv().ok();

        // Parse environment variables into Config struct
        let config = envy::from_env::<Config>()?;

        Ok(config)
    }
}

/// Initialize environment variables and load configuration
pub fn init(env_file: Option<&str>) -> Result<Config> {
    // An explicit env file takes precedence over the ambient .env
    if let Some(path) = env_file {
        dotenvy::from_path(path)?;
    } else {
        dotenv().ok();
    }

    let config = Config::load()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_have_defaults() {
        assert!(default_filemaker_api_url().starts_with("https://"));
        assert!(default_backend_api_url().starts_with("https://"));
    }

    #[test]
    fn panel_is_off_by_default() {
        assert!(!default_false());
    }
}
