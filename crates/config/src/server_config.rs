//! HTTP server configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};

/// Settings for the HTTP read and trigger surface
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, `:8080` is shorthand for all interfaces
    pub address: String,

    /// Answer CORS preflight requests from any origin
    pub permissive_cors: bool,

    /// Default page size for `/api/search`
    pub default_search_limit: usize,

    /// Default page size for `/api/recently`
    pub default_recent_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8080".to_string(),
            permissive_cors: true,
            default_search_limit: 20,
            default_recent_limit: 10,
        }
    }
}

impl ServerConfig {
    /// The address in a form the socket layer accepts
    pub fn bind_address(&self) -> String {
        if self.address.starts_with(':') {
            format!("0.0.0.0{}", self.address)
        } else {
            self.address.clone()
        }
    }
}

impl ConfigSection for ServerConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![
            Validator::socket_address(&self.address, "server.address"),
            Validator::in_range(self.default_search_limit, 1, 1000, "server.default_search_limit"),
            Validator::in_range(self.default_recent_limit, 1, 1000, "server.default_recent_limit"),
        ])
    }

    fn merge(&mut self, other: Self) {
        self.address = other.address;
        self.permissive_cors = other.permissive_cors;
        self.default_search_limit = other.default_search_limit;
        self.default_recent_limit = other.default_recent_limit;
    }

    fn section_name(&self) -> &'static str {
        "server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_bind_address_expands_shorthand() {
        let config = ServerConfig {
            address: ":8080".to_string(),
            ..ServerConfig::default()
        };
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(ServerConfig::default().bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_invalid_values() {
        let config = ServerConfig {
            address: "nowhere".to_string(),
            default_search_limit: 0,
            ..ServerConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().len(), 2);
    }
}
