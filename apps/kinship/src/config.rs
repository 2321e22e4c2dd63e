//! # Configuration File Support
//!
//! Optional TOML configuration for the server. CLI flags take precedence
//! over file values, which take precedence over built-in defaults.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! database = "/var/lib/kinship/kinship.db"
//! backend = "redb"
//! ```

use kinship_core::KinshipError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration file structure.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
}

/// `[server]` section.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<PathBuf>,
    pub backend: Option<String>,
}

/// Load a configuration file.
pub fn load(path: &Path) -> Result<AppConfig, KinshipError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        KinshipError::Io(format!("Cannot read config '{}': {}", path.display(), e))
    })?;
    toml::from_str(&text).map_err(|e| {
        KinshipError::Serialization(format!("Invalid config '{}': {}", path.display(), e))
    })
}

/// Load a configuration file if a path was given, otherwise defaults.
pub fn load_optional(path: Option<&Path>) -> Result<AppConfig, KinshipError> {
    match path {
        Some(path) => load(path),
        None => Ok(AppConfig::default()),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 9090
            database = "/tmp/kinship.db"
            backend = "redb"
            "#,
        )
        .expect("parse");

        assert_eq!(config.server.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(config.server.port, Some(9090));
        assert_eq!(config.server.backend.as_deref(), Some("redb"));
    }

    #[test]
    fn empty_config_is_all_defaults() {
        let config: AppConfig = toml::from_str("").expect("parse");
        assert!(config.server.host.is_none());
        assert!(config.server.port.is_none());
    }

    #[test]
    fn missing_file_is_an_error_but_no_path_is_not() {
        assert!(load(Path::new("/nonexistent/kinship.toml")).is_err());
        assert!(load_optional(None).is_ok());
    }
}
