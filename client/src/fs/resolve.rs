use super::cache::{CachedLookup, LookupResult};
use super::prelude::*;
use crate::config::TieBreak;

/// A remote object together with the normalized path it was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub object: RemoteObject,
    /// Absolute path, `/` for the root.
    pub path: String,
}

impl ResolvedEntry {
    pub fn new(object: RemoteObject, path: impl Into<String>) -> Self {
        Self {
            object,
            path: path.into(),
        }
    }
}

/// Cache key form of a path: trailing slashes stripped, leading slash
/// ensured, root as the empty string.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() || trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Human form of a normalized path.
pub fn display_path(path: &str) -> &str {
    if path.is_empty() { "/" } else { path }
}

/// Splits a normalized, non-root path into (parent, base name).
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, base)) => (parent, base),
        None => ("", path),
    }
}

/// Normalized parent of a normalized path; the root is its own parent.
pub fn parent_path(path: &str) -> &str {
    if path.is_empty() {
        path
    } else {
        split_path(path).0
    }
}

fn pick_candidate(
    tie_break: TieBreak,
    candidates: impl Iterator<Item = RemoteObject>,
) -> Option<RemoteObject> {
    let mut live = candidates.filter(|object| !object.trashed);
    match tie_break {
        TieBreak::First => live.next(),
        TieBreak::SmallestId => live.min_by(|a, b| a.id.cmp(&b.id)),
    }
}

impl<C: RemoteObjectClient> DriveFs<C> {
    /// Maps `path` to a remote object, cache first.
    ///
    /// With `only_directories` set, only folder-typed objects match. Found
    /// and not-found outcomes are cached for the TTL; remote failures are
    /// never cached.
    pub fn resolve(
        &self,
        ctx: &OpContext,
        path: &str,
        only_directories: bool,
    ) -> FsResult<ResolvedEntry> {
        let path = normalize_path(path);

        if let Some(cached) = self.cache.get(&path) {
            if cached.serves(only_directories) {
                trace!(path = display_path(&path), "reusing cached lookup");
                return match cached.result {
                    LookupResult::Found(entry) => Ok(entry),
                    LookupResult::NotFound => {
                        Err(FsError::NotFound(display_path(&path).to_string()))
                    }
                };
            }
        }

        match self.resolve_uncached(ctx, &path, only_directories) {
            Ok(entry) => {
                self.cache.set(
                    &path,
                    CachedLookup::new(LookupResult::Found(entry.clone()), only_directories),
                );
                Ok(entry)
            }
            Err(FsError::NotFound(missing)) => {
                self.cache
                    .set(&path, CachedLookup::new(LookupResult::NotFound, only_directories));
                Err(FsError::NotFound(missing))
            }
            Err(err) => Err(err),
        }
    }

    fn resolve_uncached(
        &self,
        ctx: &OpContext,
        path: &str,
        only_directories: bool,
    ) -> FsResult<ResolvedEntry> {
        trace!(path = display_path(path), only_directories, "resolving path");

        if path.is_empty() {
            let root = self.client.get(ctx, &self.root_id).map_err(|err| {
                error!(root_id = %self.root_id, error = %err, "cannot fetch root folder");
                err
            })?;
            return Ok(ResolvedEntry::new(root, "/"));
        }

        let (parent, base) = split_path(path);
        let parent_entry = self.resolve(ctx, parent, true).map_err(|err| {
            debug!(parent = display_path(parent), error = %err, "cannot locate parent");
            err
        })?;

        let query = ListQuery::named(parent_entry.object.id.as_str(), base)
            .folders_only(only_directories);
        let candidates = self.client.list(ctx, &query).map_err(|err| {
            error!(path, error = %err, "listing failed");
            err
        })?;

        let candidates = candidates
            .into_iter()
            .filter(|object| !only_directories || object.is_folder());
        match pick_candidate(self.tie_break, candidates) {
            Some(object) => Ok(ResolvedEntry::new(object, path)),
            None => {
                debug!(path, "no live object with this name");
                Err(FsError::NotFound(path.to_string()))
            }
        }
    }

    /// Id of the object at `path`.
    pub fn resolve_id(&self, ctx: &OpContext, path: &str, only_directories: bool) -> FsResult<String> {
        self.resolve(ctx, path, only_directories)
            .map(|entry| entry.object.id)
    }
}
