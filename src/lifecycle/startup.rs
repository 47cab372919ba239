//! Startup orchestration.
//!
//! # Responsibilities
//! - Merge the TOML file, directive file and command-line routes
//! - Validate the result before anything binds
//!
//! # Design Decisions
//! - Route order is file routes, then directive-file routes, then `--uwsgi` flags
//! - Fail fast: any startup error is fatal

use std::path::PathBuf;

use crate::config::directive::route_from_args;
use crate::config::loader::{load_directives, read_config, ConfigError};
use crate::config::validation::validate_config;
use crate::config::ProxyConfig;

/// Sources a configuration is assembled from.
#[derive(Debug, Default, Clone)]
pub struct StartupOptions {
    /// TOML configuration file.
    pub config_path: Option<PathBuf>,
    /// File of `uwsgi <from> <to>` directives.
    pub directive_path: Option<PathBuf>,
    /// Flattened `FROM TO` pairs from the command line.
    pub route_args: Vec<String>,
    /// Overrides `listener.bind_address`.
    pub bind_address: Option<String>,
}

/// Build and validate the configuration.
pub fn assemble_config(options: &StartupOptions) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &options.config_path {
        Some(path) => read_config(path)?,
        None => ProxyConfig::default(),
    };

    if let Some(path) = &options.directive_path {
        config.routes.extend(load_directives(path)?);
    }

    for pair in options.route_args.chunks(2) {
        config.routes.push(route_from_args(pair)?);
    }

    if let Some(bind) = &options.bind_address {
        config.listener.bind_address = bind.clone();
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::directive::DirectiveError;

    #[test]
    fn test_cli_routes_appended_in_order() {
        let options = StartupOptions {
            route_args: vec![
                "/a".into(),
                "h1:1".into(),
                "/a/b".into(),
                "h2:1".into(),
            ],
            bind_address: Some("127.0.0.1:9999".into()),
            ..Default::default()
        };

        let config = assemble_config(&options).unwrap();
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[1].from, "/a/b");
        assert_eq!(config.listener.bind_address, "127.0.0.1:9999");
    }

    #[test]
    fn test_empty_backend_aborts_startup() {
        let options = StartupOptions {
            route_args: vec!["/a".into(), "".into()],
            ..Default::default()
        };

        let err = assemble_config(&options).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Directive(DirectiveError::EmptyAddress { .. })
        ));
    }

    #[test]
    fn test_dangling_argument_aborts_startup() {
        let options = StartupOptions {
            route_args: vec!["/a".into()],
            ..Default::default()
        };
        assert!(assemble_config(&options).is_err());
    }
}
