//! Presents a Google-Drive-style object store, where objects are addressed
//! by opaque ids, as a path-addressed filesystem with buffered file handles.

pub mod api_client;
pub mod config;
pub mod context;
pub mod error;
pub mod fs;
pub mod mount;
pub mod remote;

pub use api_client::DriveClient;
pub use config::{CacheStrategy, Config, TieBreak, load_config};
pub use context::OpContext;
pub use error::{FsError, FsResult, RemoteError};
pub use fs::attr::FileMetadata;
pub use fs::xattr::{PropertyName, PropertyPatch, decode_property_key, encode_property_key};
pub use fs::{DriveFs, File, FileHandle, OpenFlags, OpenMode};
pub use mount::DriveMount;
pub use remote::{ListQuery, NewObject, ObjectPatch, RemoteObject, RemoteObjectClient};
