//! Path-addressed filesystem on top of an id-addressed object store.
//!
//! Each operation lives in its own file, the way the operations of a FUSE
//! filesystem are usually split: `attr` (stat), `create` (mkdir), `delete`,
//! `rename`, `read` and `write` (open handles), `xattr` (extended
//! properties). Path resolution and its cache live in `resolve` and `cache`.

use std::collections::BTreeMap;
use std::io::{self, SeekFrom};
use std::sync::{Arc, Weak, mpsc};
use std::thread;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::config::{Config, TieBreak};
use crate::error::{FsError, FsResult};
use crate::remote::RemoteObjectClient;

pub mod attr;
pub mod cache;
pub mod create;
pub mod delete;
pub mod prelude;
pub mod read;
pub mod rename;
pub mod resolve;
pub mod write;
pub mod xattr;

use attr::FileMetadata;
use cache::ResolutionCache;
use read::{DirectoryHandle, ReadHandle};
use resolve::parent_path;
use write::WriteHandle;
use xattr::{PropertyName, PropertyPatch};

/// The filesystem façade. Cheap to share behind an [`Arc`]; every method
/// takes `&self`.
pub struct DriveFs<C> {
    pub(crate) client: C,
    pub(crate) cache: Arc<ResolutionCache>,
    pub(crate) root_id: String,
    pub(crate) tie_break: TieBreak,
    /// Dropping the sender stops the sweeper thread.
    _sweeper: Option<mpsc::Sender<()>>,
}

impl<C: RemoteObjectClient> DriveFs<C> {
    pub fn new(client: C, config: &Config) -> Self {
        let cache = Arc::new(ResolutionCache::new(config));
        let sweeper = config
            .sweep_interval()
            .and_then(|interval| spawn_sweeper(Arc::downgrade(&cache), interval));
        debug!(
            root_id = %config.root_id,
            strategy = ?config.cache_strategy,
            ttl = ?config.cache_ttl(),
            "filesystem ready"
        );
        Self {
            client,
            cache,
            root_id: config.root_id.clone(),
            tie_break: config.tie_break,
            _sweeper: sweeper,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    /// Forgets the cached lookup for one normalized path.
    pub(crate) fn invalidate(&self, path: &str) {
        trace!(path, "invalidating");
        self.cache.delete(path);
    }

    /// Forgets a path and its parent directory.
    pub(crate) fn invalidate_with_parent(&self, path: &str) {
        self.invalidate(path);
        self.invalidate(parent_path(path));
    }

    /// Forgets a path, everything below it, and its parent directory.
    pub(crate) fn invalidate_subtree(&self, path: &str) {
        self.cache.delete_descendants(path);
        self.invalidate_with_parent(path);
    }
}

fn spawn_sweeper(cache: Weak<ResolutionCache>, interval: Duration) -> Option<mpsc::Sender<()>> {
    let (stop, stopped) = mpsc::channel::<()>();
    let spawned = thread::Builder::new()
        .name("drivefs-cache-sweep".to_string())
        .spawn(move || {
            while let Err(mpsc::RecvTimeoutError::Timeout) = stopped.recv_timeout(interval) {
                let Some(cache) = cache.upgrade() else { break };
                let purged = cache.purge_expired();
                if purged > 0 {
                    trace!(purged, "swept expired cache entries");
                }
            }
        });
    match spawned {
        Ok(_) => Some(stop),
        Err(err) => {
            warn!(error = %err, "cannot start cache sweeper, expired entries are dropped on access only");
            None
        }
    }
}

/// `open(2)`-style flags, with the Linux bit values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OpenFlags(u32);

impl OpenFlags {
    pub const READ_ONLY: Self = Self(0);
    pub const WRITE_ONLY: Self = Self(0o1);
    pub const READ_WRITE: Self = Self(0o2);
    pub const CREATE: Self = Self(0o100);
    pub const EXCLUSIVE: Self = Self(0o200);
    pub const TRUNCATE: Self = Self(0o1000);
    pub const APPEND: Self = Self(0o2000);

    const ACCESS_MODE: u32 = 0o3;

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    fn access_mode(self) -> u32 {
        self.0 & Self::ACCESS_MODE
    }

    /// Which kind of handle these flags ask for.
    pub fn mode(self) -> FsResult<OpenMode> {
        if self.contains(Self::APPEND) {
            return Err(FsError::Unsupported(format!("open flags {:#o}: append", self.0)));
        }
        if self == Self::READ_ONLY {
            return Ok(OpenMode::Read);
        }
        let writes = matches!(self.access_mode(), 0o1 | 0o2);
        if writes || self.contains(Self::CREATE) || self.contains(Self::TRUNCATE) {
            return Ok(OpenMode::Write);
        }
        Err(FsError::Unsupported(format!("open flags {:#o}", self.0)))
    }
}

impl std::ops::BitOr for OpenFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

fn unsupported<T>(what: &str) -> FsResult<T> {
    Err(FsError::Unsupported(what.to_string()))
}

/// Operations available on an open file. Kinds that cannot honour an
/// operation keep the default, which fails with `Unsupported`.
pub trait FileHandle {
    fn read(&mut self, _buf: &mut [u8]) -> FsResult<usize> {
        unsupported("read")
    }

    fn write(&mut self, _buf: &[u8]) -> FsResult<usize> {
        unsupported("write")
    }

    fn seek(&mut self, _pos: SeekFrom) -> FsResult<u64> {
        unsupported("seek")
    }

    fn readdir(&mut self) -> FsResult<Vec<FileMetadata>> {
        unsupported("readdir")
    }

    fn stat(&self) -> FsResult<FileMetadata>;

    fn dead_props(&self) -> FsResult<BTreeMap<PropertyName, String>>;

    fn patch_props(&mut self, _patches: &[PropertyPatch]) -> FsResult<BTreeMap<PropertyName, String>> {
        unsupported("property patch")
    }

    fn close(&mut self) -> FsResult<()>;
}

/// An open file of any kind, as returned by [`DriveFs::open_file`].
pub enum File<C: RemoteObjectClient> {
    Read(ReadHandle<C>),
    Write(WriteHandle<C>),
    Directory(DirectoryHandle<C>),
}

impl<C: RemoteObjectClient> std::fmt::Debug for File<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            File::Read(_) => f.write_str("File::Read"),
            File::Write(_) => f.write_str("File::Write"),
            File::Directory(_) => f.write_str("File::Directory"),
        }
    }
}

impl<C: RemoteObjectClient> File<C> {
    fn handle(&self) -> &dyn FileHandle {
        match self {
            File::Read(handle) => handle,
            File::Write(handle) => handle,
            File::Directory(handle) => handle,
        }
    }

    fn handle_mut(&mut self) -> &mut dyn FileHandle {
        match self {
            File::Read(handle) => handle,
            File::Write(handle) => handle,
            File::Directory(handle) => handle,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, File::Directory(_))
    }
}

impl<C: RemoteObjectClient> FileHandle for File<C> {
    fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        self.handle_mut().read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> FsResult<usize> {
        self.handle_mut().write(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> FsResult<u64> {
        self.handle_mut().seek(pos)
    }

    fn readdir(&mut self) -> FsResult<Vec<FileMetadata>> {
        self.handle_mut().readdir()
    }

    fn stat(&self) -> FsResult<FileMetadata> {
        self.handle().stat()
    }

    fn dead_props(&self) -> FsResult<BTreeMap<PropertyName, String>> {
        self.handle().dead_props()
    }

    fn patch_props(&mut self, patches: &[PropertyPatch]) -> FsResult<BTreeMap<PropertyName, String>> {
        self.handle_mut().patch_props(patches)
    }

    fn close(&mut self) -> FsResult<()> {
        self.handle_mut().close()
    }
}

impl<C: RemoteObjectClient> io::Read for File<C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(FileHandle::read(self, buf)?)
    }
}

impl<C: RemoteObjectClient> io::Write for File<C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(FileHandle::write(self, buf)?)
    }

    /// Content only leaves the process on close.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<C: RemoteObjectClient> io::Seek for File<C> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(FileHandle::seek(self, pos)?)
    }
}
