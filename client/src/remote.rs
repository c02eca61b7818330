//! The remote object store as seen by the filesystem layer.
//!
//! Objects are addressed by opaque ids; a folder is just an object whose
//! MIME type carries the folder marker, and containment is expressed by the
//! `parents` list of the child.

use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::OpContext;
use crate::error::RemoteError;

/// MIME type that marks an object as a folder.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// The store's native entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    /// Drive encodes int64 fields as decimal strings.
    #[serde(default, with = "size_string")]
    pub size: u64,
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub trashed: bool,
    #[serde(default)]
    pub app_properties: HashMap<String, String>,
    #[serde(default)]
    pub parents: Vec<String>,
}

impl RemoteObject {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

mod size_string {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    pub fn serialize<S: Serializer>(size: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&size.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(n),
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Children listing request: everything under `parent_id`, optionally
/// restricted to one name and/or to folders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub parent_id: String,
    pub name: Option<String>,
    pub folders_only: bool,
}

impl ListQuery {
    pub fn children(parent_id: impl Into<String>) -> Self {
        Self {
            parent_id: parent_id.into(),
            ..Self::default()
        }
    }

    pub fn named(parent_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            parent_id: parent_id.into(),
            name: Some(name.into()),
            folders_only: false,
        }
    }

    pub fn folders_only(mut self, folders_only: bool) -> Self {
        self.folders_only = folders_only;
        self
    }

    /// Renders the query in the Drive `q` search language.
    pub fn to_drive_query(&self) -> String {
        let mut query = format!("'{}' in parents", escape_query_value(&self.parent_id));
        if let Some(name) = &self.name {
            query.push_str(&format!(" and name='{}'", escape_query_value(name)));
        }
        if self.folders_only {
            query.push_str(&format!(" and mimeType='{FOLDER_MIME_TYPE}'"));
        }
        query
    }
}

/// Escapes a literal for use inside single quotes in a Drive query.
pub fn escape_query_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || c == '\'' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Metadata for an object about to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewObject {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub parents: Vec<String>,
}

impl NewObject {
    pub fn folder(name: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            parents: vec![parent_id.into()],
        }
    }

    /// A regular file; the store infers the content type.
    pub fn file(name: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            parents: vec![parent_id.into()],
        }
    }
}

/// Partial metadata update. `None` fields are left alone; a `None` property
/// value removes that property.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_properties: Option<HashMap<String, Option<String>>>,
}

impl ObjectPatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn properties(properties: HashMap<String, Option<String>>) -> Self {
        Self {
            app_properties: Some(properties),
            ..Self::default()
        }
    }
}

/// Operations the filesystem layer needs from the object store.
///
/// Every call is blocking from the caller's point of view and must give up
/// promptly once `ctx` is cancelled or past its deadline.
pub trait RemoteObjectClient: Send + Sync {
    fn get(&self, ctx: &OpContext, id: &str) -> Result<RemoteObject, RemoteError>;

    fn list(&self, ctx: &OpContext, query: &ListQuery) -> Result<Vec<RemoteObject>, RemoteError>;

    fn create(
        &self,
        ctx: &OpContext,
        object: &NewObject,
        content: Option<Bytes>,
    ) -> Result<RemoteObject, RemoteError>;

    fn update(
        &self,
        ctx: &OpContext,
        id: &str,
        patch: &ObjectPatch,
    ) -> Result<RemoteObject, RemoteError>;

    fn delete(&self, ctx: &OpContext, id: &str) -> Result<(), RemoteError>;

    fn download(&self, ctx: &OpContext, id: &str) -> Result<Bytes, RemoteError>;
}
