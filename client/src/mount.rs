use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::info;

use crate::config::Config;
use crate::fs::DriveFs;
use crate::remote::RemoteObjectClient;

/// Owns the configuration and the process-wide filesystem built from it.
///
/// The filesystem is constructed on first use. Concurrent first callers
/// wait for a single construction; a failed construction is retried by the
/// next caller.
pub struct DriveMount<C> {
    config: Config,
    fs: OnceLock<Arc<DriveFs<C>>>,
    init: Mutex<()>,
}

impl<C: RemoteObjectClient> DriveMount<C> {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            fs: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The filesystem, if it has been built already.
    pub fn get(&self) -> Option<Arc<DriveFs<C>>> {
        self.fs.get().cloned()
    }

    /// Returns the filesystem, building it with `connect` when needed.
    pub fn get_or_try_init<E, F>(&self, connect: F) -> Result<Arc<DriveFs<C>>, E>
    where
        F: FnOnce(&Config) -> Result<C, E>,
    {
        if let Some(fs) = self.fs.get() {
            return Ok(Arc::clone(fs));
        }

        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(fs) = self.fs.get() {
            return Ok(Arc::clone(fs));
        }

        let client = connect(&self.config)?;
        let fs = Arc::new(DriveFs::new(client, &self.config));
        info!(root_id = %self.config.root_id, "drive filesystem initialized");
        Ok(Arc::clone(self.fs.get_or_init(|| fs)))
    }
}
