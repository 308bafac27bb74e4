//! MCP protocol version handling.

use serde::{Deserialize, Serialize};

/// Header carrying the negotiated protocol version on every request.
pub const MCP_PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

/// Header carrying the session id.
pub const MCP_SESSION_ID_HEADER: &str = "mcp-session-id";

pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];

/// Assumed when a client sends no version header.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-03-26";

/// Supported and default protocol versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProtocolVersions {
    pub supported_versions: Vec<String>,
    pub default_version: String,
}

impl Default for ProtocolVersions {
    fn default() -> Self {
        Self {
            supported_versions: SUPPORTED_PROTOCOL_VERSIONS
                .iter()
                .map(|v| v.to_string())
                .collect(),
            default_version: DEFAULT_PROTOCOL_VERSION.to_string(),
        }
    }
}

impl ProtocolVersions {
    pub fn is_supported(&self, version: &str) -> bool {
        self.supported_versions.iter().any(|v| v == version)
    }

    /// Version for a request given its `MCP-Protocol-Version` header.
    ///
    /// An absent header means the default; an unsupported one is an error.
    pub fn resolve<'a>(&'a self, header: Option<&'a str>) -> Result<&'a str, String> {
        match header {
            None => Ok(self.default_version.as_str()),
            Some(version) if self.is_supported(version) => Ok(version),
            Some(version) => Err(format!(
                "Unsupported protocol version: {} (supported: {})",
                version,
                self.supported_versions.join(", ")
            )),
        }
    }

    /// Version to answer `initialize` with: the client's if supported,
    /// otherwise the configured default.
    pub fn negotiate(&self, requested: Option<&str>) -> String {
        match requested {
            Some(version) if self.is_supported(version) => version.to_string(),
            _ => self.default_version.clone(),
        }
    }
}
