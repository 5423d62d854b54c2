//! HTTP bind settings for the `aios-agent` surface.
//!
//! Process-wide tier configuration lives in [`crate::platform::config`];
//! this is just the listener address/worker count for the binary that
//! fronts the pipeline over HTTP, kept separate so it can be overridden
//! without touching the rest of the platform config.

use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: 4,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT").unwrap_or_else(|_| "8080".to_string()).parse().unwrap_or(8080),
            workers: env::var("WORKERS").unwrap_or_else(|_| "4".to_string()).parse().unwrap_or(4),
        }
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("Server port must be greater than 0".to_string());
        }
        if self.workers == 0 {
            errors.push("Worker count must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.workers, 4);
    }

    #[test]
    fn test_config_validation() {
        let mut config = ServerConfig::default();
        config.port = 0;

        let result = config.validate();
        assert!(result.is_err());

        let errors = result.unwrap_err();
        assert!(errors.iter().any(|e| e.contains("Server port")));
    }

    #[test]
    fn test_env_config() {
        env::set_var("PORT", "9000");
        let config = ServerConfig::from_env();
        assert_eq!(config.port, 9000);
        env::remove_var("PORT");
    }
}
