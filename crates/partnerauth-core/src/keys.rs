//! Key lookup backends.
//!
//! This module defines the [`KeyProvider`] trait for resolving shared secrets
//! by partner ID and key ID, along with three backends:
//!
//! - [`StaticKeyProvider`]: an in-memory map, also used for the `env` backend.
//! - [`PropertiesKeyProvider`]: a Java-style properties file with
//!   `partnerauth.keys.<partner>.<key>=<secret>` entries.
//! - [`KeyProviderRegistry`]: name to factory map used to pick a backend from
//!   configuration at start-up.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::config::PartnerAuthConfig;

const PROPERTY_PREFIX: &str = "partnerauth.keys.";
const DEFAULT_PROPERTY: &str = "partnerauth.keys.default";

/// Looks up signing keys.
///
/// Implementations may back this with a database, a configuration file, a
/// secrets manager, or anything else. Lookups happen on every signature
/// operation and must not block for long.
pub trait KeyProvider: Send + Sync + fmt::Debug {
    /// Raw key bytes for `partner_id` and `key_id`, or `None` if unknown.
    fn get(&self, partner_id: &str, key_id: &str) -> Option<Vec<u8>>;
}

/// Errors raised while building a key provider from configuration.
#[derive(Debug, thiserror::Error)]
pub enum KeyConfigError {
    /// The key file could not be read.
    #[error("failed to read key file {path}: {source}")]
    Io {
        /// The file that was read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An entry could not be parsed.
    #[error("invalid key entry '{0}'")]
    InvalidEntry(String),

    /// The source contained no key entries.
    #[error("no keys defined in {0}")]
    NoKeys(String),

    /// The configured default key does not exist.
    #[error("default key {partner_id}.{key_id} is not defined")]
    UnknownDefault {
        /// Partner of the configured default.
        partner_id: String,
        /// Key ID of the configured default.
        key_id: String,
    },

    /// The requested backend is not registered.
    #[error("unknown key provider '{0}'")]
    UnknownProvider(String),

    /// A setting required by the chosen backend is missing.
    #[error("key provider '{provider}' requires {setting} to be set")]
    MissingSetting {
        /// Backend name.
        provider: String,
        /// Name of the missing setting.
        setting: &'static str,
    },
}

/// Identifies one key: `(partner_id, key_id)`.
pub type KeyId = (String, String);

/// An in-memory key provider backed by a `HashMap`.
///
/// Suitable for tests and for small static deployments.
///
/// # Examples
///
/// ```
/// use partnerauth_core::keys::{KeyProvider, StaticKeyProvider};
///
/// let provider = StaticKeyProvider::new([(("bob".to_owned(), "1".to_owned()), b"secret".to_vec())]);
/// assert_eq!(provider.get("bob", "1").as_deref(), Some(&b"secret"[..]));
/// assert!(provider.get("bob", "2").is_none());
/// ```
#[derive(Clone, Default)]
pub struct StaticKeyProvider {
    keys: HashMap<KeyId, Vec<u8>>,
}

impl StaticKeyProvider {
    /// Create a provider from `((partner_id, key_id), key)` pairs.
    pub fn new(keys: impl IntoIterator<Item = (KeyId, Vec<u8>)>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    /// Parse a comma separated list of `partner.key=secret` entries.
    ///
    /// # Errors
    ///
    /// Returns [`KeyConfigError::InvalidEntry`] for an entry that is not in
    /// `partner.key=secret` form, or [`KeyConfigError::NoKeys`] if the list is
    /// empty.
    pub fn parse_list(list: &str) -> Result<Self, KeyConfigError> {
        let mut keys = HashMap::new();
        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (id, secret) = entry
                .split_once('=')
                .ok_or_else(|| KeyConfigError::InvalidEntry("entry without '='".to_owned()))?;
            let (partner_id, key_id) = split_key_id(id.trim())
                .ok_or_else(|| KeyConfigError::InvalidEntry(id.trim().to_owned()))?;
            keys.insert((partner_id, key_id), secret.trim().as_bytes().to_vec());
        }
        if keys.is_empty() {
            return Err(KeyConfigError::NoKeys("key list".to_owned()));
        }
        Ok(Self { keys })
    }

    /// Number of keys held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no keys are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl fmt::Debug for StaticKeyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticKeyProvider")
            .field("keys", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl KeyProvider for StaticKeyProvider {
    fn get(&self, partner_id: &str, key_id: &str) -> Option<Vec<u8>> {
        self.keys
            .get(&(partner_id.to_owned(), key_id.to_owned()))
            .cloned()
    }
}

/// Key provider loaded from a properties file.
///
/// Each key is a line of the form `partnerauth.keys.<partner>.<key>=<secret>`.
/// Blank lines and lines starting with `#` or `!` are ignored, and `:` may be
/// used instead of `=`. The optional `partnerauth.keys.default=<partner>.<key>`
/// names the key a client should sign with; without it the lexicographically
/// first key is the default.
///
/// Storing secrets in a plain text file is convenient, not secure. Prefer a
/// custom [`KeyProvider`] backed by a secrets store in production.
#[derive(Clone)]
pub struct PropertiesKeyProvider {
    keys: BTreeMap<KeyId, Vec<u8>>,
    default_key: KeyId,
}

impl PropertiesKeyProvider {
    /// Parse properties text.
    ///
    /// # Errors
    ///
    /// Returns an error if a key entry is malformed, if there are no key
    /// entries, or if the declared default does not exist.
    pub fn parse(text: &str) -> Result<Self, KeyConfigError> {
        let mut keys = BTreeMap::new();
        let mut default = None;

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let Some(idx) = line.find(['=', ':']) else {
                continue;
            };
            let (name, value) = (line[..idx].trim(), line[idx + 1..].trim());

            if name == DEFAULT_PROPERTY {
                let id = split_key_id(value)
                    .ok_or_else(|| KeyConfigError::InvalidEntry(line.to_owned()))?;
                default = Some(id);
            } else if let Some(id) = name.strip_prefix(PROPERTY_PREFIX) {
                let id = split_key_id(id).ok_or_else(|| KeyConfigError::InvalidEntry(name.to_owned()))?;
                keys.insert(id, value.as_bytes().to_vec());
            }
        }

        let default_key = match default {
            Some(id) if keys.contains_key(&id) => id,
            Some((partner_id, key_id)) => {
                return Err(KeyConfigError::UnknownDefault { partner_id, key_id });
            }
            None => keys
                .keys()
                .next()
                .cloned()
                .ok_or_else(|| KeyConfigError::NoKeys(format!("`{PROPERTY_PREFIX}*` entries")))?,
        };

        Ok(Self { keys, default_key })
    }

    /// Load and parse a properties file.
    ///
    /// # Errors
    ///
    /// Returns [`KeyConfigError::Io`] if the file cannot be read, or any error
    /// from [`PropertiesKeyProvider::parse`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, KeyConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| KeyConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let provider = Self::parse(&text)?;
        debug!(path = %path.display(), keys = provider.keys.len(), "loaded key file");
        Ok(provider)
    }

    /// The `(partner_id, key_id)` a client should sign with by default.
    #[must_use]
    pub fn default_key(&self) -> (&str, &str) {
        (&self.default_key.0, &self.default_key.1)
    }
}

impl fmt::Debug for PropertiesKeyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertiesKeyProvider")
            .field("keys", &self.keys.keys().collect::<Vec<_>>())
            .field("default_key", &self.default_key)
            .finish()
    }
}

impl KeyProvider for PropertiesKeyProvider {
    fn get(&self, partner_id: &str, key_id: &str) -> Option<Vec<u8>> {
        self.keys
            .get(&(partner_id.to_owned(), key_id.to_owned()))
            .cloned()
    }
}

/// Builds a key provider from configuration.
pub type KeyProviderFactory = fn(&PartnerAuthConfig) -> Result<Arc<dyn KeyProvider>, KeyConfigError>;

/// Maps backend names to factories.
///
/// [`KeyProviderRegistry::default`] registers the built-in backends:
///
/// | Name | Source |
/// |---|---|
/// | `properties` | [`PartnerAuthConfig::keys_file`] |
/// | `env` | [`PartnerAuthConfig::keys`] |
#[derive(Debug, Clone)]
pub struct KeyProviderRegistry {
    factories: HashMap<String, KeyProviderFactory>,
}

impl KeyProviderRegistry {
    /// A registry with no backends.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register (or replace) a backend.
    pub fn register(&mut self, name: impl Into<String>, factory: KeyProviderFactory) -> &mut Self {
        self.factories.insert(name.into(), factory);
        self
    }

    /// Registered backend names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build the backend named by [`PartnerAuthConfig::key_provider`].
    ///
    /// # Errors
    ///
    /// Returns [`KeyConfigError::UnknownProvider`] if no such backend is
    /// registered, or whatever the factory fails with.
    pub fn build(&self, config: &PartnerAuthConfig) -> Result<Arc<dyn KeyProvider>, KeyConfigError> {
        let factory = self
            .factories
            .get(&config.key_provider)
            .ok_or_else(|| KeyConfigError::UnknownProvider(config.key_provider.clone()))?;
        let provider = factory(config)?;
        debug!(provider = %config.key_provider, "key provider initialized");
        Ok(provider)
    }
}

impl Default for KeyProviderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register("properties", properties_factory)
            .register("env", env_factory);
        registry
    }
}

fn properties_factory(config: &PartnerAuthConfig) -> Result<Arc<dyn KeyProvider>, KeyConfigError> {
    Ok(Arc::new(PropertiesKeyProvider::from_file(&config.keys_file)?))
}

fn env_factory(config: &PartnerAuthConfig) -> Result<Arc<dyn KeyProvider>, KeyConfigError> {
    let list = config
        .keys
        .as_deref()
        .ok_or_else(|| KeyConfigError::MissingSetting {
            provider: "env".to_owned(),
            setting: "PARTNERAUTH_KEYS",
        })?;
    Ok(Arc::new(StaticKeyProvider::parse_list(list)?))
}

/// Split `partner.key` into its two parts. Neither part may contain a dot.
fn split_key_id(id: &str) -> Option<KeyId> {
    let (partner_id, key_id) = id.split_once('.')?;
    if partner_id.is_empty() || key_id.is_empty() || key_id.contains('.') {
        return None;
    }
    Some((partner_id.to_owned(), key_id.to_owned()))
}
