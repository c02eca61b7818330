use super::prelude::*;
use super::write::WriteHandle;
use super::xattr::props_from_object;

impl<C: RemoteObjectClient> DriveFs<C> {
    /// Handles `open`.
    ///
    /// 1. Flags asking for any kind of write give a [`WriteHandle`]; nothing
    ///    is sent to the store until it is closed.
    /// 2. Exactly read-only resolves `path` and gives a [`DirectoryHandle`]
    ///    for a folder, a [`ReadHandle`] otherwise.
    /// 3. Anything else (append in particular) is `Unsupported`.
    ///
    /// The handle keeps `ctx` for the remote calls it makes later.
    pub fn open_file(self: &Arc<Self>, ctx: &OpContext, path: &str, flags: OpenFlags) -> FsResult<File<C>> {
        let path = normalize_path(path);
        let mode = flags.mode().map_err(|err| {
            error!(path = display_path(&path), flags = flags.bits(), "unsupported open flags");
            err
        })?;
        debug!(path = display_path(&path), ?mode, "open");

        match mode {
            OpenMode::Write => Ok(File::Write(WriteHandle::new(Arc::clone(self), ctx.clone(), path))),
            OpenMode::Read => {
                let entry = self.resolve(ctx, &path, false)?;
                if entry.object.is_folder() {
                    Ok(File::Directory(DirectoryHandle {
                        fs: Arc::clone(self),
                        ctx: ctx.clone(),
                        entry,
                    }))
                } else {
                    Ok(File::Read(ReadHandle {
                        fs: Arc::clone(self),
                        ctx: ctx.clone(),
                        entry,
                        content: None,
                        pos: 0,
                        closed: false,
                    }))
                }
            }
        }
    }

    /// Every live child of the folder `folder_id`, following pagination.
    pub(crate) fn list_children(&self, ctx: &OpContext, folder_id: &str) -> FsResult<Vec<FileMetadata>> {
        let children = self
            .client
            .list(ctx, &ListQuery::children(folder_id))
            .map_err(|err| {
                error!(folder_id, error = %err, "cannot list folder");
                err
            })?;
        Ok(children
            .iter()
            .filter(|object| !object.trashed)
            .map(FileMetadata::from_object)
            .collect())
    }
}

/// Read side of an open regular file.
///
/// The whole object is downloaded on the first read or seek to the end and
/// served from memory afterwards. A failed download is not remembered.
pub struct ReadHandle<C> {
    fs: Arc<DriveFs<C>>,
    ctx: OpContext,
    entry: ResolvedEntry,
    content: Option<Bytes>,
    pos: usize,
    closed: bool,
}

impl<C: RemoteObjectClient> ReadHandle<C> {
    pub fn path(&self) -> &str {
        &self.entry.path
    }

    fn ensure_open(&self) -> FsResult<()> {
        if self.closed {
            Err(FsError::Closed)
        } else {
            Ok(())
        }
    }

    fn load(&mut self) -> FsResult<&Bytes> {
        if self.content.is_none() {
            let id = &self.entry.object.id;
            let content = self.fs.client.download(&self.ctx, id).map_err(|err| {
                error!(path = %self.entry.path, id = %id, error = %err, "download failed");
                err
            })?;
            trace!(path = %self.entry.path, bytes = content.len(), "content loaded");
            self.content = Some(content);
        }
        Ok(self.content.get_or_insert_with(Bytes::new))
    }
}

impl<C: RemoteObjectClient> FileHandle for ReadHandle<C> {
    fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        self.ensure_open()?;
        let pos = self.pos;
        let content = self.load()?;
        let remaining = content.get(pos..).unwrap_or_default();
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }

    /// Only rewinding, seeking to the end, and asking for the current
    /// position are possible.
    fn seek(&mut self, pos: SeekFrom) -> FsResult<u64> {
        self.ensure_open()?;
        match pos {
            SeekFrom::Start(0) => self.pos = 0,
            SeekFrom::End(0) => self.pos = self.load()?.len(),
            SeekFrom::Current(0) => {}
            other => {
                error!(path = %self.entry.path, ?other, "unsupported seek");
                return Err(FsError::Unsupported(format!("seek to {other:?}")));
            }
        }
        Ok(self.pos as u64)
    }

    fn stat(&self) -> FsResult<FileMetadata> {
        Ok(FileMetadata::from_object(&self.entry.object))
    }

    fn dead_props(&self) -> FsResult<BTreeMap<PropertyName, String>> {
        Ok(props_from_object(&self.entry.object))
    }

    fn close(&mut self) -> FsResult<()> {
        self.content = None;
        self.closed = true;
        Ok(())
    }
}

/// A folder opened read-only. Serves listings.
pub struct DirectoryHandle<C> {
    fs: Arc<DriveFs<C>>,
    ctx: OpContext,
    entry: ResolvedEntry,
}

impl<C: RemoteObjectClient> DirectoryHandle<C> {
    pub fn path(&self) -> &str {
        &self.entry.path
    }
}

impl<C: RemoteObjectClient> FileHandle for DirectoryHandle<C> {
    fn readdir(&mut self) -> FsResult<Vec<FileMetadata>> {
        self.fs.list_children(&self.ctx, &self.entry.object.id)
    }

    fn stat(&self) -> FsResult<FileMetadata> {
        Ok(FileMetadata::from_object(&self.entry.object))
    }

    fn dead_props(&self) -> FsResult<BTreeMap<PropertyName, String>> {
        Ok(props_from_object(&self.entry.object))
    }

    fn close(&mut self) -> FsResult<()> {
        Ok(())
    }
}
