//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::directive::{parse_directives, DirectiveError};
use crate::config::schema::{ProxyConfig, RouteConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Directive(DirectiveError),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Directive(e) => write!(f, "Directive error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<DirectiveError> for ConfigError {
    fn from(e: DirectiveError) -> Self {
        ConfigError::Directive(e)
    }
}

/// Load a TOML configuration file without validating it.
pub fn read_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load routes from a directive file (`uwsgi <from> <to>` per line).
pub fn load_directives(path: &Path) -> Result<Vec<RouteConfig>, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    Ok(parse_directives(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_toml() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [[routes]]
            from = "/app"
            to = "127.0.0.1:3031"

            [[routes]]
            from = "/app/admin"
            to = "127.0.0.1:3032"

            [timeouts]
            connect_secs = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[1].to, "127.0.0.1:3032");
        assert_eq!(config.timeouts.connect_secs, 2);
        // untouched sections keep defaults
        assert_eq!(config.timeouts.backend_secs, 30);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/uwsgi-proxy.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
