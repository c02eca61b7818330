//! Extended ("dead") properties, kept in the object's `appProperties` map.
//!
//! A property named `local` in `namespace` is stored under the
//! form-urlencoded key `namespace!local`; its value is the raw inner XML.

use super::prelude::*;
use std::fmt;
use thiserror::Error;
use url::form_urlencoded;

/// Namespace-qualified property name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyName {
    pub namespace: String,
    pub local: String,
}

impl PropertyName {
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
        }
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.local)
    }
}

/// One set (`Some`, non-empty) or removal (`None` or empty) of a property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPatch {
    pub name: PropertyName,
    pub value: Option<String>,
}

impl PropertyPatch {
    pub fn set(name: PropertyName, value: impl Into<String>) -> Self {
        Self {
            name,
            value: Some(value.into()),
        }
    }

    pub fn remove(name: PropertyName) -> Self {
        Self { name, value: None }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PropertyKeyError {
    #[error("property key {0:?} is not a single urlencoded token")]
    Malformed(String),
    #[error("property key {0:?} has no namespace separator")]
    MissingSeparator(String),
}

pub fn encode_property_key(name: &PropertyName) -> String {
    let raw = format!("{}!{}", name.namespace, name.local);
    form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

pub fn decode_property_key(key: &str) -> Result<PropertyName, PropertyKeyError> {
    let mut pairs = form_urlencoded::parse(key.as_bytes());
    let decoded = match (pairs.next(), pairs.next()) {
        (Some((raw, value)), None) if value.is_empty() => raw.into_owned(),
        _ => return Err(PropertyKeyError::Malformed(key.to_string())),
    };
    let (namespace, local) = decoded
        .split_once('!')
        .ok_or_else(|| PropertyKeyError::MissingSeparator(key.to_string()))?;
    Ok(PropertyName::new(namespace, local))
}

/// Decodes the properties held by `object`. Empty values are absent
/// properties; undecodable keys belong to someone else and are skipped.
pub fn props_from_object(object: &RemoteObject) -> BTreeMap<PropertyName, String> {
    decode_properties(&object.app_properties)
}

fn decode_properties(raw: &HashMap<String, String>) -> BTreeMap<PropertyName, String> {
    raw.iter()
        .filter(|(_, value)| !value.is_empty())
        .filter_map(|(key, value)| match decode_property_key(key) {
            Ok(name) => Some((name, value.clone())),
            Err(err) => {
                warn!(key, error = %err, "skipping foreign app property");
                None
            }
        })
        .collect()
}

impl<C: RemoteObjectClient> DriveFs<C> {
    /// Extended properties of the object at `path`.
    pub fn dead_props(&self, ctx: &OpContext, path: &str) -> FsResult<BTreeMap<PropertyName, String>> {
        let entry = self.resolve(ctx, path, false)?;
        Ok(props_from_object(&entry.object))
    }

    /// Applies `patches` in a single metadata update and returns the
    /// properties the store reports afterwards.
    pub fn patch_props(
        &self,
        ctx: &OpContext,
        path: &str,
        patches: &[PropertyPatch],
    ) -> FsResult<BTreeMap<PropertyName, String>> {
        let path = normalize_path(path);
        let entry = self.resolve(ctx, &path, false)?;
        if patches.is_empty() {
            return Ok(props_from_object(&entry.object));
        }

        let properties: HashMap<String, Option<String>> = patches
            .iter()
            .map(|patch| {
                let value = patch.value.clone().filter(|value| !value.is_empty());
                (encode_property_key(&patch.name), value)
            })
            .collect();
        debug!(path = display_path(&path), count = properties.len(), "patching properties");

        let updated = self
            .client
            .update(ctx, &entry.object.id, &ObjectPatch::properties(properties))
            .map_err(|err| {
                error!(path = display_path(&path), error = %err, "property patch failed");
                err
            })?;

        self.invalidate_with_parent(&path);
        Ok(props_from_object(&updated))
    }
}
