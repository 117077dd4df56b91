//! Configuration store seam and JSON file implementation.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::debug;

use crate::config::ConnectorsFile;
use crate::credential::OAuthCredential;
use crate::error::{CoreError, CoreResult};

/// Access to the persisted connector configuration.
///
/// `disabled` and `oauth` are the only connector fields implementations may
/// mutate; everything else in the file is preserved verbatim on every write.
pub trait ConfigStore: Send + Sync {
    /// Snapshot the full configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read.
    fn load(&self) -> CoreResult<ConnectorsFile>;

    /// Set a connector's `disabled` flag and persist.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConnectorNotFound`] if no such connector exists,
    /// or an IO error if the write fails.
    fn set_disabled(&self, name: &str, disabled: bool) -> CoreResult<()>;

    /// Replace (or clear, with `None`) a connector's `oauth` sub-field and
    /// persist.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConnectorNotFound`] if no such connector exists,
    /// or an IO error if the write fails.
    fn set_oauth(&self, name: &str, oauth: Option<OAuthCredential>) -> CoreResult<()>;
}

/// [`ConfigStore`] backed by a JSON file.
///
/// The file is read once at open and cached; mutations update the cache and
/// rewrite the whole file. A missing file opens as an empty configuration
/// and is created on first write.
#[derive(Debug)]
pub struct JsonConfigStore {
    path: PathBuf,
    cache: RwLock<ConnectorsFile>,
}

impl JsonConfigStore {
    /// Open the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if any connector entry has an invalid shape.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let file = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let file: ConnectorsFile = serde_json::from_str(&content)?;
            file.validate()?;
            file
        } else {
            ConnectorsFile::default()
        };

        debug!(path = %path.display(), connectors = file.connectors.len(), "Opened config store");

        Ok(Self {
            path,
            cache: RwLock::new(file),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, file: &ConnectorsFile) -> CoreResult<()> {
        let content = serde_json::to_string_pretty(file)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    fn mutate<F>(&self, name: &str, apply: F) -> CoreResult<()>
    where
        F: FnOnce(&mut crate::config::ConnectorConfig),
    {
        let mut cache = self
            .cache
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let Some(config) = cache.connectors.get_mut(name) else {
            return Err(CoreError::ConnectorNotFound {
                name: name.to_string(),
            });
        };
        apply(config);

        self.persist(&cache)
    }
}

impl ConfigStore for JsonConfigStore {
    fn load(&self) -> CoreResult<ConnectorsFile> {
        let cache = self
            .cache
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(cache.clone())
    }

    fn set_disabled(&self, name: &str, disabled: bool) -> CoreResult<()> {
        debug!(connector = name, disabled, "Updating disabled flag");
        self.mutate(name, |config| config.disabled = disabled)
    }

    fn set_oauth(&self, name: &str, oauth: Option<OAuthCredential>) -> CoreResult<()> {
        debug!(connector = name, present = oauth.is_some(), "Updating oauth credential");
        self.mutate(name, |config| config.oauth = oauth)
    }
}
