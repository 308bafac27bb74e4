//! Gateway configuration, loaded from YAML.
//!
//! # Example YAML
//!
//! ```yaml
//! bind: "0.0.0.0:8080"
//! protocol:
//!   supported_versions: ["2024-11-05", "2025-03-26", "2025-06-18"]
//!   default_version: "2025-03-26"
//! principals:
//!   - name: "analyst"
//!     token_sha256: "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
//!     policies:
//!       - { resource: "**", action: "read", effect: allow }
//!       - resource: "db/*"
//!         action: write
//!         effect: modify
//!         middleware: { code: filter, arg: { filter: { owner: "analyst" } } }
//! ```
//!
//! # Environment Variables
//!
//! - `MYCELIA_CONFIG`: path of the YAML file (default `mycelia.yaml`; a
//!   missing file at the default path means built-in defaults)
//! - `PORT`: overrides the port of `bind`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mcp::version::ProtocolVersions;
use crate::policy::Policy;

pub const CONFIG_PATH_ENV: &str = "MYCELIA_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "mycelia.yaml";
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// A bearer-token principal and its policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipalConfig {
    pub name: String,
    /// Hex SHA-256 of the bearer token.
    pub token_sha256: String,
    #[serde(default)]
    pub policies: Vec<Policy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    pub bind: String,
    pub protocol: ProtocolVersions,
    pub principals: Vec<PrincipalConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            protocol: ProtocolVersions::default(),
            principals: Vec::new(),
        }
    }
}

impl GatewayConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Load from `MYCELIA_CONFIG` (or the default path), then apply `PORT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_yaml_file(path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_yaml_file(DEFAULT_CONFIG_PATH)?
            }
            Err(_) => {
                tracing::warn!(
                    "No {} found and {} unset; starting with no principals",
                    DEFAULT_CONFIG_PATH,
                    CONFIG_PATH_ENV
                );
                Self::default()
            }
        };
        if let Ok(port) = std::env::var("PORT") {
            config = config.with_port(&port)?;
        }
        Ok(config)
    }

    /// Replace the port of `bind`.
    pub fn with_port(mut self, port: &str) -> Result<Self, ConfigError> {
        let port: u16 = port
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("PORT '{}' is not a valid port", port)))?;
        let host = self
            .bind
            .rsplit_once(':')
            .map_or(self.bind.as_str(), |(host, _)| host);
        self.bind = format!("{}:{}", host, port);
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol.supported_versions.is_empty() {
            return Err(ConfigError::Invalid(
                "protocol.supported_versions must list at least one version".to_string(),
            ));
        }
        if !self.protocol.is_supported(&self.protocol.default_version) {
            return Err(ConfigError::Invalid(format!(
                "protocol.default_version '{}' is not in protocol.supported_versions",
                self.protocol.default_version
            )));
        }
        for principal in &self.principals {
            let digest = &principal.token_sha256;
            if digest.len() != 64 || hex::decode(digest).is_err() {
                return Err(ConfigError::Invalid(format!(
                    "principal '{}': token_sha256 must be 64 hex digits",
                    principal.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token_digest;
    use crate::policy::PolicyEffect;
    use std::io::Write;

    fn principal_yaml(digest: &str) -> String {
        format!(
            r#"
principals:
  - name: analyst
    token_sha256: "{}"
    policies:
      - {{ resource: "**", action: read, effect: allow }}
      - resource: "db/*"
        action: write
        effect: modify
        middleware: {{ code: filter, arg: {{ filter: {{ owner: analyst }} }} }}
"#,
            digest
        )
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::from_yaml("{}").unwrap();
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.protocol, ProtocolVersions::default());
        assert!(config.principals.is_empty());
    }

    #[test]
    fn test_principals_and_policies() {
        let config = GatewayConfig::from_yaml(&principal_yaml(&token_digest("t"))).unwrap();
        let principal = &config.principals[0];
        assert_eq!(principal.name, "analyst");
        assert_eq!(principal.policies.len(), 2);
        assert_eq!(principal.policies[1].effect(), PolicyEffect::Modify);
    }

    #[test]
    fn test_invalid_policy_is_rejected() {
        let yaml = format!(
            "principals:\n  - name: a\n    token_sha256: \"{}\"\n    policies:\n      - {{ resource: \"db/*\", action: write, effect: modify }}\n",
            token_digest("t")
        );
        assert!(matches!(GatewayConfig::from_yaml(&yaml), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_invalid_digest_and_version() {
        let err = GatewayConfig::from_yaml(&principal_yaml("nothex")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = GatewayConfig::from_yaml("protocol:\n  default_version: \"1999-01-01\"\n").unwrap_err();
        assert!(err.to_string().contains("1999-01-01"));
    }

    #[test]
    fn test_protocol_versions() {
        let yaml = "protocol:\n  supported_versions: [\"2024-11-05\"]\n  default_version: \"2024-11-05\"\n";
        let config = GatewayConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.protocol.supported_versions, vec!["2024-11-05".to_string()]);
        assert_eq!(config.protocol.default_version, "2024-11-05");

        let misspelled = "protocol:\n  supported: [\"2024-11-05\"]\n";
        assert!(matches!(GatewayConfig::from_yaml(misspelled), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_with_port() {
        let config = GatewayConfig::default().with_port("9000").unwrap();
        assert_eq!(config.bind, "0.0.0.0:9000");
        assert!(GatewayConfig::default().with_port("http").is_err());
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(principal_yaml(&token_digest("t")).as_bytes()).unwrap();
        let config = GatewayConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.principals.len(), 1);

        let missing = GatewayConfig::from_yaml_file("/definitely/not/here.yaml");
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
