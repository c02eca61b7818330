use super::prelude::*;
use chrono::{DateTime, Utc};

/// Read-only projection of a remote object, computed on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: SystemTime,
}

impl FileMetadata {
    /// Builds the metadata of `object`.
    ///
    /// The modification time falls back to the creation time, then to the
    /// Unix epoch, when the store leaves it out.
    pub fn from_object(object: &RemoteObject) -> Self {
        let modified = object
            .modified_time
            .or(object.created_time)
            .map(system_time)
            .unwrap_or(UNIX_EPOCH);
        Self {
            name: object.name.clone(),
            is_dir: object.is_folder(),
            size: object.size,
            modified,
        }
    }
}

fn system_time(time: DateTime<Utc>) -> SystemTime {
    time.into()
}

impl<C: RemoteObjectClient> DriveFs<C> {
    /// Handles `stat`: resolves `path` and projects the object.
    pub fn stat(&self, ctx: &OpContext, path: &str) -> FsResult<FileMetadata> {
        let entry = self.resolve(ctx, path, false).map_err(|err| {
            if err.is_not_found() {
                debug!(path, "stat: not found");
            }
            err
        })?;
        Ok(FileMetadata::from_object(&entry.object))
    }
}
