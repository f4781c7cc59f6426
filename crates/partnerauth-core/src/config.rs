//! PartnerAuth configuration.
//!
//! Provides [`PartnerAuthConfig`], built once at start-up and used to wire the
//! signer, key provider, verifier and interceptor. Values are loaded from
//! environment variables.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Default maximum clock skew, in seconds, between signer and verifier.
pub const DEFAULT_VALIDITY_WINDOW_SECS: u64 = 300;

/// PartnerAuth configuration.
///
/// # Examples
///
/// ```
/// use partnerauth_core::config::PartnerAuthConfig;
///
/// let config = PartnerAuthConfig::default();
/// assert_eq!(config.validity_window_secs, 300);
/// assert_eq!(config.signed_response_headers, vec!["Content-Type"]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct PartnerAuthConfig {
    /// Bind address for the gateway (e.g. `"0.0.0.0:8080"`).
    #[builder(default = String::from("0.0.0.0:8080"))]
    pub gateway_listen: String,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,

    /// Accepted distance between a request timestamp and the local clock.
    #[builder(default = DEFAULT_VALIDITY_WINDOW_SECS)]
    pub validity_window_secs: u64,

    /// Response headers that are signed whenever the handler sets them.
    #[builder(default = default_signed_response_headers())]
    pub signed_response_headers: Vec<String>,

    /// Name of the key backend in the [`KeyProviderRegistry`](crate::keys::KeyProviderRegistry).
    #[builder(default = String::from("properties"))]
    pub key_provider: String,

    /// Key file read by the `properties` backend.
    #[builder(default = PathBuf::from("partnerauth-keys.properties"))]
    pub keys_file: PathBuf,

    /// Inline `partner.key=secret` list read by the `env` backend.
    #[serde(skip_serializing)]
    #[builder(default)]
    pub keys: Option<String>,
}

impl Default for PartnerAuthConfig {
    fn default() -> Self {
        Self {
            gateway_listen: String::from("0.0.0.0:8080"),
            log_level: String::from("info"),
            validity_window_secs: DEFAULT_VALIDITY_WINDOW_SECS,
            signed_response_headers: default_signed_response_headers(),
            key_provider: String::from("properties"),
            keys_file: PathBuf::from("partnerauth-keys.properties"),
            keys: None,
        }
    }
}

impl PartnerAuthConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables (falling back to defaults):
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `GATEWAY_LISTEN` | `0.0.0.0:8080` |
    /// | `LOG_LEVEL` | `info` |
    /// | `PARTNERAUTH_VALIDITY_WINDOW_SECS` | `300` |
    /// | `PARTNERAUTH_SIGNED_RESPONSE_HEADERS` | `Content-Type` |
    /// | `PARTNERAUTH_KEY_PROVIDER` | `properties` |
    /// | `PARTNERAUTH_KEYS_FILE` | `partnerauth-keys.properties` |
    /// | `PARTNERAUTH_KEYS` | unset |
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Unparseable numeric values keep the default.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = lookup("GATEWAY_LISTEN") {
            config.gateway_listen = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Some(v) = lookup("PARTNERAUTH_VALIDITY_WINDOW_SECS") {
            if let Ok(n) = v.trim().parse::<u64>() {
                config.validity_window_secs = n;
            }
        }
        if let Some(v) = lookup("PARTNERAUTH_SIGNED_RESPONSE_HEADERS") {
            config.signed_response_headers = parse_list(&v);
        }
        if let Some(v) = lookup("PARTNERAUTH_KEY_PROVIDER") {
            config.key_provider = v;
        }
        if let Some(v) = lookup("PARTNERAUTH_KEYS_FILE") {
            config.keys_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("PARTNERAUTH_KEYS") {
            config.keys = Some(v);
        }

        config
    }
}

fn default_signed_response_headers() -> Vec<String> {
    vec![String::from("Content-Type")]
}

/// Split a comma separated list, dropping blank entries.
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_should_create_default_config() {
        let config = PartnerAuthConfig::default();
        assert_eq!(config.gateway_listen, "0.0.0.0:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.validity_window_secs, 300);
        assert_eq!(config.signed_response_headers, vec!["Content-Type"]);
        assert_eq!(config.key_provider, "properties");
        assert_eq!(config.keys_file, PathBuf::from("partnerauth-keys.properties"));
        assert!(config.keys.is_none());
    }

    #[test]
    fn test_should_load_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("GATEWAY_LISTEN", "127.0.0.1:9000"),
            ("PARTNERAUTH_VALIDITY_WINDOW_SECS", "60"),
            ("PARTNERAUTH_SIGNED_RESPONSE_HEADERS", "Content-Type, X-Request-Id,,"),
            ("PARTNERAUTH_KEY_PROVIDER", "env"),
            ("PARTNERAUTH_KEYS", "bob.1=abc"),
        ]);

        let config = PartnerAuthConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_owned()));

        assert_eq!(config.gateway_listen, "127.0.0.1:9000");
        assert_eq!(config.validity_window_secs, 60);
        assert_eq!(config.signed_response_headers, vec!["Content-Type", "X-Request-Id"]);
        assert_eq!(config.key_provider, "env");
        assert_eq!(config.keys.as_deref(), Some("bob.1=abc"));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_should_keep_default_for_invalid_window() {
        let config = PartnerAuthConfig::from_lookup(|k| {
            (k == "PARTNERAUTH_VALIDITY_WINDOW_SECS").then(|| "soon".to_owned())
        });
        assert_eq!(config.validity_window_secs, DEFAULT_VALIDITY_WINDOW_SECS);
    }

    #[test]
    fn test_should_load_from_env() {
        let config = PartnerAuthConfig::from_env();
        assert!(!config.gateway_listen.is_empty());
    }

    #[test]
    fn test_should_build_with_typed_builder() {
        let config = PartnerAuthConfig::builder()
            .validity_window_secs(10)
            .key_provider("env".into())
            .keys(Some("bob.1=abc".into()))
            .build();

        assert_eq!(config.validity_window_secs, 10);
        assert_eq!(config.key_provider, "env");
        assert_eq!(config.signed_response_headers, vec!["Content-Type"]);
    }

    #[test]
    fn test_should_not_serialize_inline_keys() {
        let config = PartnerAuthConfig {
            keys: Some("bob.1=supersecret".to_owned()),
            ..PartnerAuthConfig::default()
        };
        let json = serde_json::to_string(&config).expect("test serialization");
        assert!(json.contains("validityWindowSecs"));
        assert!(!json.contains("supersecret"));
    }
}
