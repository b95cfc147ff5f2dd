//! Process-lifetime secret cache.
//!
//! Secrets are fetched from a [`SecretSource`] the first time they are asked
//! for and kept until [`SecretCache::reset`] is called. Nothing expires on its
//! own: a rotated credential is picked up by restarting the process.

use crate::config::{AppConfig, SecretSourceKind};
use crate::error::SecretError;
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Every credential the monitor needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SecretKey {
    DatabasePassword,
    AlertingApiKey,
    SenderAccessKey,
    ListManagementToken,
}

impl SecretKey {
    pub const ALL: [SecretKey; 4] = [
        SecretKey::DatabasePassword,
        SecretKey::AlertingApiKey,
        SecretKey::SenderAccessKey,
        SecretKey::ListManagementToken,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            SecretKey::DatabasePassword => "database_password",
            SecretKey::AlertingApiKey => "alerting_api_key",
            SecretKey::SenderAccessKey => "sender_access_key",
            SecretKey::ListManagementToken => "list_management_token",
        }
    }

    /// Environment variable read by [`EnvSecretSource`].
    pub fn env_var(self) -> String {
        format!("CARTA_SECRET_{}", self.name().to_ascii_uppercase())
    }
}

/// Somewhere named secrets can be read from.
pub trait SecretSource: Send + Sync {
    fn fetch(&self, key: SecretKey) -> Result<String, SecretError>;
}

/// Reads `CARTA_SECRET_<NAME>` environment variables.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvSecretSource;

impl SecretSource for EnvSecretSource {
    fn fetch(&self, key: SecretKey) -> Result<String, SecretError> {
        std::env::var(key.env_var()).map_err(|_| SecretError::NotFound(key.name()))
    }
}

/// Reads one file per secret from `<root>/<namespace>/<name>`, the layout
/// produced by mounting a stage-scoped secret volume.
#[derive(Clone, Debug)]
pub struct DirectorySecretSource {
    root: PathBuf,
    namespace: String,
}

impl DirectorySecretSource {
    pub fn new(root: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            namespace: namespace.into(),
        }
    }

    pub fn path_for(&self, key: SecretKey) -> PathBuf {
        self.root.join(&self.namespace).join(key.name())
    }
}

impl SecretSource for DirectorySecretSource {
    fn fetch(&self, key: SecretKey) -> Result<String, SecretError> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(value.trim_end_matches(['\r', '\n']).to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SecretError::NotFound(key.name()))
            }
            Err(e) => Err(SecretError::Unreadable {
                name: key.name(),
                reason: format!("{}: {e}", path.display()),
            }),
        }
    }
}

impl SecretSource for HashMap<SecretKey, String> {
    fn fetch(&self, key: SecretKey) -> Result<String, SecretError> {
        self.get(&key)
            .cloned()
            .ok_or(SecretError::NotFound(key.name()))
    }
}

pub struct SecretCache {
    source: Box<dyn SecretSource>,
    values: DashMap<SecretKey, Arc<str>>,
}

impl std::fmt::Debug for SecretCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCache")
            .field("cached", &self.values.len())
            .finish_non_exhaustive()
    }
}

impl SecretCache {
    pub fn new(source: impl SecretSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            values: DashMap::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, SecretError> {
        match config.secrets.source {
            SecretSourceKind::Env => Ok(Self::new(EnvSecretSource)),
            SecretSourceKind::Directory => {
                let root = config.secrets.directory.clone().ok_or_else(|| {
                    SecretError::Misconfigured("secrets.directory is not set".into())
                })?;
                Ok(Self::new(DirectorySecretSource::new(
                    root,
                    config.secret_namespace(),
                )))
            }
        }
    }

    /// Fetch every key up front so a missing credential fails startup instead
    /// of the first invocation that needs it.
    #[tracing::instrument(skip(self))]
    pub fn preload(&self, keys: &[SecretKey]) -> Result<(), SecretError> {
        for key in keys {
            self.get(*key)?;
        }
        Ok(())
    }

    pub fn get(&self, key: SecretKey) -> Result<Arc<str>, SecretError> {
        if let Some(value) = self.values.get(&key) {
            return Ok(value.clone());
        }

        let value = self.source.fetch(key).inspect_err(|e| {
            tracing::error!(
                name = "secrets.fetch_failed",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                secret = key.name(),
                error = %e,
                message = "Failed to fetch secret"
            );
        })?;
        if value.trim().is_empty() {
            return Err(SecretError::Empty(key.name()));
        }

        let value: Arc<str> = Arc::from(value);
        // A concurrent fetch may have won; keep whichever landed first.
        Ok(self.values.entry(key).or_insert(value).clone())
    }

    /// Drop every cached value; the next `get` goes back to the source.
    pub fn reset(&self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: Arc<AtomicUsize>,
    }

    impl SecretSource for CountingSource {
        fn fetch(&self, key: SecretKey) -> Result<String, SecretError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("value-of-{}", key.name()))
        }
    }

    #[test]
    fn fetches_each_secret_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = SecretCache::new(CountingSource {
            calls: calls.clone(),
        });

        let first = cache.get(SecretKey::AlertingApiKey).unwrap();
        let second = cache.get(SecretKey::AlertingApiKey).unwrap();

        assert_eq!(&*first, "value-of-alerting_api_key");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reset_forces_refetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = SecretCache::new(CountingSource {
            calls: calls.clone(),
        });

        cache.preload(&SecretKey::ALL).unwrap();
        assert_eq!(cache.len(), 4);
        cache.reset();
        assert!(cache.is_empty());
        cache.get(SecretKey::DatabasePassword).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn empty_values_are_rejected_and_not_cached() {
        let source = HashMap::from([(SecretKey::SenderAccessKey, "   ".to_string())]);
        let cache = SecretCache::new(source);

        assert!(matches!(
            cache.get(SecretKey::SenderAccessKey),
            Err(SecretError::Empty("sender_access_key"))
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn preload_reports_first_missing_key() {
        let source = HashMap::from([(SecretKey::DatabasePassword, "pw".to_string())]);
        let cache = SecretCache::new(source);

        let err = cache.preload(&SecretKey::ALL).unwrap_err();
        assert!(matches!(err, SecretError::NotFound("alerting_api_key")));
    }

    #[test]
    fn env_var_names() {
        assert_eq!(
            SecretKey::ListManagementToken.env_var(),
            "CARTA_SECRET_LIST_MANAGEMENT_TOKEN"
        );
    }
}
