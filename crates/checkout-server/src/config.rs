//! Server Configuration

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

/// Settings read once at startup
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// Externally reachable base URL, used to build provider notification URLs
    pub public_base_url: String,

    /// Member area linked from access emails
    pub member_area_url: String,

    /// JSON document seeding the account directory
    pub seed_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
            public_base_url: "http://localhost:3000".into(),
            member_area_url: "http://localhost:3000/members".into(),
            seed_file: None,
        }
    }
}

impl ServerConfig {
    /// Create from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            public_base_url: std::env::var("PUBLIC_BASE_URL").unwrap_or(defaults.public_base_url),
            member_area_url: std::env::var("MEMBER_AREA_URL").unwrap_or(defaults.member_area_url),
            seed_file: std::env::var("SEED_FILE")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.public_base_url.starts_with("http://") && !self.public_base_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                name: "PUBLIC_BASE_URL",
                message: format!("expected an http(s) URL, got {:?}", self.public_base_url),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_base_url_must_be_http() {
        let config = ServerConfig {
            public_base_url: "shop.example.com".into(),
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
