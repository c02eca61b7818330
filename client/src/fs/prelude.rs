//! Common imports for the operation files under `fs/`.

pub use std::collections::{BTreeMap, HashMap};
pub use std::io::SeekFrom;
pub use std::sync::Arc;
pub use std::time::{SystemTime, UNIX_EPOCH};

pub use bytes::Bytes;
pub use tracing::{debug, error, trace, warn};

pub use crate::context::OpContext;
pub use crate::error::{FsError, FsResult, RemoteError};
pub use crate::remote::{
    ListQuery, NewObject, ObjectPatch, RemoteObject, RemoteObjectClient,
};

pub use super::attr::FileMetadata;
pub use super::resolve::{ResolvedEntry, display_path, normalize_path, parent_path, split_path};
pub use super::xattr::{PropertyName, PropertyPatch};
pub use super::{DriveFs, File, FileHandle, OpenFlags, OpenMode};
