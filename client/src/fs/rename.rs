use super::prelude::*;

impl<C: RemoteObjectClient> DriveFs<C> {
    /// Handles `rename` within one directory.
    ///
    /// Moves across directories are rejected before anything is resolved,
    /// so they neither reach the store nor touch the cache. Otherwise:
    /// 1. `AlreadyExists` if `new_path` already resolves.
    /// 2. Resolve `old_path`.
    /// 3. Patch the object's name to the new base name.
    /// 4. Invalidate both subtrees and the shared parent.
    pub fn rename(&self, ctx: &OpContext, old_path: &str, new_path: &str) -> FsResult<()> {
        let old_path = normalize_path(old_path);
        let new_path = normalize_path(new_path);
        if old_path.is_empty() || new_path.is_empty() {
            error!(from = display_path(&old_path), to = display_path(&new_path), "cannot rename the root folder");
            return Err(FsError::Unsupported("renaming the root folder".to_string()));
        }

        let (old_parent, _) = split_path(&old_path);
        let (new_parent, new_name) = split_path(&new_path);
        if old_parent != new_parent {
            error!(from = old_path, to = new_path, "moving between directories is not supported");
            return Err(FsError::Unsupported(format!(
                "move from {old_path} to {new_path}"
            )));
        }

        match self.resolve(ctx, &new_path, false) {
            Ok(_) => {
                debug!(to = new_path, "rename: target exists");
                return Err(FsError::AlreadyExists(new_path));
            }
            Err(FsError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }

        let id = self.resolve_id(ctx, &old_path, false)?;
        self.client
            .update(ctx, &id, &ObjectPatch::rename(new_name))
            .map_err(|err| {
                error!(from = old_path, to = new_path, error = %err, "rename failed");
                err
            })?;
        debug!(from = old_path, to = new_path, id, "renamed");

        self.invalidate_subtree(&old_path);
        self.cache.delete_descendants(&new_path);
        self.invalidate(&new_path);
        Ok(())
    }
}
