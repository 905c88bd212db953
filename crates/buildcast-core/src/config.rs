//! Configuration loading and typed config structures for Buildcast.
//!
//! The canonical configuration lives in `buildcast-config.yaml`. It names
//! the address to listen on and the build targets to serve. Each target
//! maps a URL-safe name to the exact command that runs for it; nothing
//! from a request is ever interpreted as a command.
//!
//! ```yaml
//! server:
//!   host: 0.0.0.0
//!   port: 8080
//! targets:
//!   - name: ccws
//!     command: ./build-ccws.sh
//!     args: [build]
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;

use crate::process::BuildCommand;

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "buildcast-config.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but is not usable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level Buildcast configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BuildcastConfig {
    /// Listen address.
    #[serde(default)]
    pub server: ServerSettings,

    /// Build targets, each served at `/api/build/{name}`.
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

impl BuildcastConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `BUILDCAST_HOST` overrides `server.host`
    /// - `BUILDCAST_PORT` overrides `server.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, applying env overrides.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.server.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Default configuration with env overrides applied.
    ///
    /// Used when no config file exists; such a server has no targets.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.server.apply_env_overrides()?;
        Ok(config)
    }

    /// Check target names and commands.
    ///
    /// Names must be non-empty, unique, and consist of ASCII letters,
    /// digits, `-` or `_` so they can be used as a path segment verbatim.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for target in &self.targets {
            if target.name.is_empty() {
                return Err(ConfigError::Invalid(String::from("target name must not be empty")));
            }
            if !target
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(ConfigError::Invalid(format!(
                    "target name `{}` may only contain ASCII letters, digits, `-` and `_`",
                    target.name
                )));
            }
            if !seen.insert(target.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate target name `{}`",
                    target.name
                )));
            }
            if target.command.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "target `{}` has an empty command",
                    target.name
                )));
            }
        }
        Ok(())
    }
}

/// Address the HTTP server binds to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind (e.g. `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerSettings {
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = std::env::var("BUILDCAST_HOST") {
            self.host = host;
        }
        if let Ok(port) = std::env::var("BUILDCAST_PORT") {
            self.port = port
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("invalid BUILDCAST_PORT: {e}")))?;
        }
        Ok(())
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8080
}

/// One build target.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TargetConfig {
    /// URL path segment identifying the target.
    pub name: String,

    /// Executable to run.
    pub command: String,

    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,
}

impl TargetConfig {
    /// The command this target runs.
    pub fn build_command(&self) -> BuildCommand {
        BuildCommand::new(self.command.clone(), self.args.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: BuildcastConfig = serde_yml::from_str("{}").unwrap();
        assert_eq!(config.server, ServerSettings::default());
        assert_eq!(config.server.port, 8080);
        assert!(config.targets.is_empty());
    }

    #[test]
    fn targets_parse_with_optional_args() {
        let yaml = r"
server:
  port: 9000
targets:
  - name: ccws
    command: build-ccws.sh
    args: [build]
  - name: docs
    command: make
";
        let config: BuildcastConfig = serde_yml::from_str(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.targets.len(), 2);

        let ccws = config.targets.first().unwrap();
        assert_eq!(
            ccws.build_command(),
            BuildCommand::new("build-ccws.sh", ["build"])
        );
        assert!(config.targets.get(1).unwrap().args.is_empty());
    }

    #[test]
    fn duplicate_target_names_are_rejected() {
        let yaml = r"
targets:
  - { name: app, command: a.sh }
  - { name: app, command: b.sh }
";
        let config: BuildcastConfig = serde_yml::from_str(yaml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn unsafe_target_names_are_rejected() {
        for name in ["", "a/b", "has space", "..", "naïve"] {
            let config = BuildcastConfig {
                server: ServerSettings::default(),
                targets: vec![TargetConfig {
                    name: name.to_owned(),
                    command: String::from("make"),
                    args: Vec::new(),
                }],
            };
            assert!(config.validate().is_err(), "name {name:?} should be rejected");
        }
    }

    #[test]
    fn blank_command_is_rejected() {
        let config = BuildcastConfig {
            server: ServerSettings::default(),
            targets: vec![TargetConfig {
                name: String::from("ok"),
                command: String::from("  "),
                args: Vec::new(),
            }],
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        let result = serde_yml::from_str::<BuildcastConfig>("targets: [").map_err(ConfigError::from);
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = BuildcastConfig::from_file(Path::new("/nonexistent/buildcast-config.yaml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
