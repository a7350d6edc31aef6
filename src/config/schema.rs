/// Configuration schema and defaults.
///
/// Sections: `[server]`, `[auth]` and `[logging]`. Every field has a built-in
/// default, so a config file only needs the values it changes.
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backend address when nothing else is configured (the server's default port).
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8089";

/// Per-request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration, mapping to `~/.nginxpulse/config.toml` and
/// `.nginxpulse.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// [server]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the NginxPulse backend; `/api/...` paths are appended.
    pub base_url: String,
    /// Request timeout (milliseconds). Applies to every call.
    pub timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ServerConfig {
    /// Request timeout. Zero means "unset" and falls back to the default.
    pub fn timeout(&self) -> Duration {
        match self.timeout_ms {
            0 => Duration::from_millis(DEFAULT_TIMEOUT_MS),
            ms => Duration::from_millis(ms),
        }
    }
}

// ---------------------------------------------------------------------------
// [auth]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// File holding the access key. `~` expands to the home directory.
    pub key_file: String,
    /// Inline access key. Takes precedence over `key_file`; normally only
    /// set through `PULSE_ACCESS_KEY`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            key_file: "~/.nginxpulse/access-key".to_string(),
            access_key: None,
        }
    }
}

impl AuthConfig {
    pub fn key_file_path(&self) -> Option<PathBuf> {
        expand_home(&self.key_file)
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether completed requests are appended to the request log.
    pub enabled: bool,
    /// Path to the JSONL request log. `~` expands to the home directory.
    pub path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "~/.nginxpulse/request-log.jsonl".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn log_path(&self) -> Option<PathBuf> {
        expand_home(&self.path)
    }
}

/// Expand a leading `~` to the home directory. Blank paths yield `None`.
pub fn expand_home(raw: &str) -> Option<PathBuf> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw == "~" {
        return dirs::home_dir();
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        return dirs::home_dir().map(|home| home.join(rest));
    }
    Some(PathBuf::from(raw))
}

// ---------------------------------------------------------------------------
// Default TOML content
// ---------------------------------------------------------------------------

impl PulseConfig {
    /// Annotated default config file, written by `pulse config init`.
    pub fn default_toml() -> String {
        r#"# pulse configuration
#
# Precedence (highest wins):
#   1. Environment variables (PULSE_*)
#   2. Project config (.nginxpulse.toml in the current directory)
#   3. User global config (~/.nginxpulse/config.toml)
#   4. Built-in defaults

[server]
base_url = "http://127.0.0.1:8089"   # PULSE_BASE_URL
timeout_ms = 15000                    # PULSE_TIMEOUT_MS

[auth]
key_file = "~/.nginxpulse/access-key" # managed by `pulse key set|clear`
# access_key = ""                     # prefer PULSE_ACCESS_KEY over storing it here

[logging]
enabled = true                        # PULSE_LOG=0 to disable
path = "~/.nginxpulse/request-log.jsonl"
"#
        .to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = PulseConfig::default();
        assert_eq!(config.server.base_url, "http://127.0.0.1:8089");
        assert_eq!(config.server.timeout_ms, 15_000);
        assert!(config.logging.enabled);
        assert!(config.auth.access_key.is_none());
    }

    #[test]
    fn deserialize_minimal_toml() {
        let config: PulseConfig = toml::from_str(
            r#"
[server]
base_url = "https://stats.example.com"
"#,
        )
        .unwrap();
        assert_eq!(config.server.base_url, "https://stats.example.com");
        assert_eq!(config.server.timeout_ms, 15_000);
        assert_eq!(config.auth, AuthConfig::default());
    }

    #[test]
    fn empty_toml_produces_defaults() {
        let config: PulseConfig = toml::from_str("").unwrap();
        assert_eq!(config, PulseConfig::default());
    }

    #[test]
    fn default_toml_parses_back() {
        let config: PulseConfig = toml::from_str(&PulseConfig::default_toml()).unwrap();
        assert_eq!(config, PulseConfig::default());
    }

    #[test]
    fn expand_home_variants() {
        assert_eq!(expand_home("   "), None);
        assert_eq!(expand_home("/var/log/x.jsonl"), Some(PathBuf::from("/var/log/x.jsonl")));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/a/b"), Some(home.join("a/b")));
            assert_eq!(expand_home("~"), Some(home));
        }
    }

    #[test]
    fn zero_timeout_falls_back_to_default() {
        let mut server = ServerConfig::default();
        server.timeout_ms = 0;
        assert_eq!(server.timeout(), Duration::from_millis(DEFAULT_TIMEOUT_MS));
        server.timeout_ms = 750;
        assert_eq!(server.timeout(), Duration::from_millis(750));
    }

    #[test]
    fn access_key_is_not_serialized_when_unset() {
        let toml_str = toml::to_string_pretty(&PulseConfig::default()).unwrap();
        assert!(!toml_str.contains("access_key"));
    }
}
