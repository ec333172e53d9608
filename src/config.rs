//! Application configuration.
//!
//! ```
//! use fluxkit::AppConfig;
//!
//! let config = AppConfig::from_toml_str(
//!     r#"
//!     events = ["INCREMENT", "RESET"]
//!
//!     [devtools]
//!     debug = true
//!
//!     [services]
//!     xhr_path = "/api"
//!     xhr_timeout_ms = 5000
//!     "#,
//! )
//! .unwrap();
//! assert!(config.devtools.debug);
//! assert_eq!(config.services.xhr_path, "/api");
//! ```

use serde::{Deserialize, Serialize};

use crate::error::FluxResult;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Event catalogue. When set, stores and dispatches are limited to it.
    pub events: Option<Vec<String>>,
    pub devtools: DevToolsConfig,
    pub services: ServiceConfig,
}

impl AppConfig {
    pub fn from_toml_str(source: &str) -> FluxResult<Self> {
        Ok(toml::from_str(source)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevToolsConfig {
    /// Record action traces from the start.
    pub debug: bool,
}

/// Settings the service plugin hands from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub xhr_path: String,
    pub xhr_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            xhr_path: "/api".to_string(),
            xhr_timeout_ms: 3000,
        }
    }
}
