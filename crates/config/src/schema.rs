//! Config schema: listen address and session-code settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Fewest random bytes a session code may carry (24 bits).
pub const MIN_CODE_BYTES: usize = 3;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairlinkConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
}

/// Listener and static page settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,

    /// Directory holding the human-facing pages (`index.html`,
    /// `server.html`, `client.html`). Nothing is served when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 3000,
            public_dir: None,
        }
    }
}

/// Session code generation and participant defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Human-legible prefix of every session code.
    pub code_prefix: String,

    /// Random bytes in the code suffix, rendered as upper-case hex.
    pub code_bytes: usize,

    /// Name used when a join request carries none.
    pub default_display_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            code_prefix: "SCP-".into(),
            code_bytes: MIN_CODE_BYTES,
            default_display_name: "Anonymous".into(),
        }
    }
}

impl SessionConfig {
    /// Suffix length actually used, never below [`MIN_CODE_BYTES`].
    pub fn effective_code_bytes(&self) -> usize {
        self.code_bytes.max(MIN_CODE_BYTES)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: PairlinkConfig = toml::from_str("[server]\nport = 8080\n").unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.bind, "127.0.0.1");
        assert_eq!(cfg.session, SessionConfig::default());
    }

    #[test]
    fn code_bytes_never_below_minimum() {
        let session = SessionConfig {
            code_bytes: 1,
            ..SessionConfig::default()
        };
        assert_eq!(session.effective_code_bytes(), MIN_CODE_BYTES);

        let session = SessionConfig {
            code_bytes: 6,
            ..SessionConfig::default()
        };
        assert_eq!(session.effective_code_bytes(), 6);
    }
}
