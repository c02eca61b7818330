use super::prelude::*;

impl<C: RemoteObjectClient> DriveFs<C> {
    /// Handles `mkdir`.
    ///
    /// 1. Fails with `AlreadyExists` if anything already lives at `path`.
    /// 2. Resolves the parent as a directory (`NotFound` otherwise).
    /// 3. Creates a folder object under the parent.
    /// 4. Invalidates `path` and its parent so the next lookup sees it.
    pub fn mkdir(&self, ctx: &OpContext, path: &str) -> FsResult<()> {
        let path = normalize_path(path);
        if path.is_empty() {
            return Err(FsError::AlreadyExists("/".to_string()));
        }
        debug!(path, "mkdir");

        match self.resolve(ctx, &path, false) {
            Ok(_) => {
                debug!(path, "mkdir: already exists");
                return Err(FsError::AlreadyExists(path));
            }
            Err(FsError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }

        let (parent, base) = split_path(&path);
        let parent_entry = self.resolve(ctx, parent, true)?;

        let folder = NewObject::folder(base, parent_entry.object.id);
        let created = self.client.create(ctx, &folder, None).map_err(|err| {
            error!(path, error = %err, "cannot create folder");
            err
        })?;
        debug!(path, id = %created.id, "folder created");

        self.invalidate_with_parent(&path);
        Ok(())
    }
}
