use super::prelude::*;

/// Write side of an open file.
///
/// Bytes are buffered in memory and uploaded as a new object, in one
/// create call, when the handle is closed. The existence check on close
/// and the create are not atomic: two writers racing on one path can both
/// create an object, and resolution then picks one of them.
pub struct WriteHandle<C: RemoteObjectClient> {
    fs: Arc<DriveFs<C>>,
    ctx: OpContext,
    path: String,
    buffer: Vec<u8>,
    closed: bool,
}

impl<C: RemoteObjectClient> WriteHandle<C> {
    pub(crate) fn new(fs: Arc<DriveFs<C>>, ctx: OpContext, path: String) -> Self {
        Self {
            fs,
            ctx,
            path,
            buffer: Vec::new(),
            closed: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Bytes buffered so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn upload(&self, content: Bytes) -> FsResult<()> {
        let fs = &self.fs;
        let path = self.path.as_str();

        match fs.resolve(&self.ctx, path, false) {
            Ok(existing) => {
                debug!(path, id = %existing.object.id, "upload target appeared while writing");
                return Err(FsError::AlreadyExists(path.to_string()));
            }
            Err(FsError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }

        let (parent, base) = split_path(path);
        let parent_entry = fs.resolve(&self.ctx, parent, true)?;

        let size = content.len();
        let object = NewObject::file(base, parent_entry.object.id);
        let created = fs.client.create(&self.ctx, &object, Some(content)).map_err(|err| {
            error!(path, error = %err, "upload failed");
            err
        })?;
        debug!(path, id = %created.id, size, "uploaded");

        fs.invalidate_with_parent(path);
        Ok(())
    }
}

impl<C: RemoteObjectClient> FileHandle for WriteHandle<C> {
    fn write(&mut self, buf: &[u8]) -> FsResult<usize> {
        if self.closed {
            return Err(FsError::Closed);
        }
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn stat(&self) -> FsResult<FileMetadata> {
        let (_, name) = split_path(&self.path);
        Ok(FileMetadata {
            name: name.to_string(),
            is_dir: false,
            size: self.buffer.len() as u64,
            modified: SystemTime::now(),
        })
    }

    fn dead_props(&self) -> FsResult<BTreeMap<PropertyName, String>> {
        self.fs.dead_props(&self.ctx, &self.path)
    }

    fn patch_props(&mut self, patches: &[PropertyPatch]) -> FsResult<BTreeMap<PropertyName, String>> {
        self.fs.patch_props(&self.ctx, &self.path, patches)
    }

    /// Uploads the buffered bytes. After a successful upload further calls
    /// are no-ops. A failed upload keeps the buffer and the handle open, so
    /// `close` can be retried.
    fn close(&mut self) -> FsResult<()> {
        if self.closed {
            return Ok(());
        }
        self.upload(Bytes::copy_from_slice(&self.buffer))?;
        self.closed = true;
        self.buffer = Vec::new();
        Ok(())
    }
}

impl<C: RemoteObjectClient> Drop for WriteHandle<C> {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                path = display_path(&self.path),
                bytes = self.buffer.len(),
                "write handle dropped without close, content discarded"
            );
        }
    }
}
