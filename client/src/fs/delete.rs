use super::prelude::*;

impl<C: RemoteObjectClient> DriveFs<C> {
    /// Handles `remove_all`: deletes the object at `path` together with
    /// whatever it contains. Whether a folder may be deleted is up to the
    /// store.
    pub fn remove_all(&self, ctx: &OpContext, path: &str) -> FsResult<()> {
        let path = normalize_path(path);
        if path.is_empty() {
            error!("refusing to remove the root folder");
            return Err(FsError::Unsupported("removing the root folder".to_string()));
        }

        let id = self.resolve_id(ctx, &path, false)?;
        self.client.delete(ctx, &id).map_err(|err| {
            error!(path, id, error = %err, "delete failed");
            err
        })?;
        debug!(path, id, "deleted");

        self.invalidate_subtree(&path);
        Ok(())
    }
}
