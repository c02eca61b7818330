//! In-memory stand-in for the drive, shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chrono::Utc;
use drivefs::remote::FOLDER_MIME_TYPE;
use drivefs::{
    CacheStrategy, Config, DriveFs, ListQuery, NewObject, ObjectPatch, OpContext, RemoteError,
    RemoteObject, RemoteObjectClient, TieBreak,
};
use reqwest::StatusCode;

pub const ROOT_ID: &str = "root";

/// Number of calls made per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get: usize,
    pub list: usize,
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub download: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.get + self.list + self.create + self.update + self.delete + self.download
    }
}

#[derive(Default)]
struct Calls {
    get: AtomicUsize,
    list: AtomicUsize,
    create: AtomicUsize,
    update: AtomicUsize,
    delete: AtomicUsize,
    download: AtomicUsize,
}

#[derive(Default)]
struct State {
    /// Insertion order is listing order.
    objects: Vec<RemoteObject>,
    contents: HashMap<String, Bytes>,
    next_id: usize,
}

impl State {
    fn find(&self, id: &str) -> Option<&RemoteObject> {
        self.objects.iter().find(|object| object.id == id)
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut RemoteObject> {
        self.objects.iter_mut().find(|object| object.id == id)
    }

    fn fresh_id(&mut self) -> String {
        self.next_id += 1;
        format!("obj-{:04}", self.next_id)
    }
}

/// A drive held in memory. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct FakeDrive {
    state: Arc<Mutex<State>>,
    calls: Arc<Calls>,
    fail_downloads: Arc<AtomicBool>,
    fail_uploads: Arc<AtomicBool>,
}

fn object(id: &str, parent: Option<&str>, name: &str, mime_type: &str, size: u64) -> RemoteObject {
    let now = Utc::now();
    RemoteObject {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: mime_type.to_string(),
        size,
        created_time: Some(now),
        modified_time: Some(now),
        trashed: false,
        app_properties: HashMap::new(),
        parents: parent.map(|p| vec![p.to_string()]).unwrap_or_default(),
    }
}

impl FakeDrive {
    /// An empty drive holding only the root folder.
    pub fn new() -> Self {
        let drive = Self::default();
        drive.insert(object(ROOT_ID, None, "My Drive", FOLDER_MIME_TYPE, 0));
        drive
    }

    pub fn insert(&self, object: RemoteObject) {
        self.state.lock().unwrap().objects.push(object);
    }

    pub fn add_folder(&self, parent_id: &str, name: &str) -> String {
        let id = self.state.lock().unwrap().fresh_id();
        self.insert(object(&id, Some(parent_id), name, FOLDER_MIME_TYPE, 0));
        id
    }

    pub fn add_file(&self, parent_id: &str, name: &str, content: &[u8]) -> String {
        let id = self.state.lock().unwrap().fresh_id();
        self.add_file_with_id(&id, parent_id, name, content);
        id
    }

    pub fn add_file_with_id(&self, id: &str, parent_id: &str, name: &str, content: &[u8]) {
        self.insert(object(id, Some(parent_id), name, "text/plain", content.len() as u64));
        self.state
            .lock()
            .unwrap()
            .contents
            .insert(id.to_string(), Bytes::copy_from_slice(content));
    }

    pub fn trash(&self, id: &str) {
        if let Some(object) = self.state.lock().unwrap().find_mut(id) {
            object.trashed = true;
        }
    }

    pub fn set_property(&self, id: &str, key: &str, value: &str) {
        if let Some(object) = self.state.lock().unwrap().find_mut(id) {
            object.app_properties.insert(key.to_string(), value.to_string());
        }
    }

    pub fn object(&self, id: &str) -> Option<RemoteObject> {
        self.state.lock().unwrap().find(id).cloned()
    }

    pub fn children(&self, parent_id: &str) -> Vec<RemoteObject> {
        self.state
            .lock()
            .unwrap()
            .objects
            .iter()
            .filter(|object| object.parents.iter().any(|p| p == parent_id))
            .cloned()
            .collect()
    }

    pub fn content(&self, id: &str) -> Option<Bytes> {
        self.state.lock().unwrap().contents.get(id).cloned()
    }

    pub fn fail_downloads(&self, fail: bool) {
        self.fail_downloads.store(fail, Ordering::SeqCst);
    }

    /// Makes create calls that carry content answer 503 until reset.
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            get: self.calls.get.load(Ordering::SeqCst),
            list: self.calls.list.load(Ordering::SeqCst),
            create: self.calls.create.load(Ordering::SeqCst),
            update: self.calls.update.load(Ordering::SeqCst),
            delete: self.calls.delete.load(Ordering::SeqCst),
            download: self.calls.download.load(Ordering::SeqCst),
        }
    }
}

impl RemoteObjectClient for FakeDrive {
    fn get(&self, ctx: &OpContext, id: &str) -> Result<RemoteObject, RemoteError> {
        self.calls.get.fetch_add(1, Ordering::SeqCst);
        ctx.check()?;
        self.object(id).ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }

    fn list(&self, ctx: &OpContext, query: &ListQuery) -> Result<Vec<RemoteObject>, RemoteError> {
        self.calls.list.fetch_add(1, Ordering::SeqCst);
        ctx.check()?;
        Ok(self
            .children(&query.parent_id)
            .into_iter()
            .filter(|object| query.name.as_deref().is_none_or(|name| object.name == name))
            .filter(|object| !query.folders_only || object.is_folder())
            .collect())
    }

    fn create(
        &self,
        ctx: &OpContext,
        new: &NewObject,
        content: Option<Bytes>,
    ) -> Result<RemoteObject, RemoteError> {
        self.calls.create.fetch_add(1, Ordering::SeqCst);
        ctx.check()?;
        if content.is_some() && self.fail_uploads.load(Ordering::SeqCst) {
            return Err(RemoteError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "try later".to_string(),
            });
        }
        let mut state = self.state.lock().unwrap();
        for parent in &new.parents {
            if state.find(parent).is_none() {
                return Err(RemoteError::NotFound(parent.clone()));
            }
        }
        let id = state.fresh_id();
        let mime_type = new
            .mime_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let size = content.as_ref().map_or(0, |c| c.len() as u64);
        let mut created = object(&id, None, &new.name, &mime_type, size);
        created.parents = new.parents.clone();
        if let Some(content) = content {
            state.contents.insert(id.clone(), content);
        }
        state.objects.push(created.clone());
        Ok(created)
    }

    fn update(&self, ctx: &OpContext, id: &str, patch: &ObjectPatch) -> Result<RemoteObject, RemoteError> {
        self.calls.update.fetch_add(1, Ordering::SeqCst);
        ctx.check()?;
        let mut state = self.state.lock().unwrap();
        let object = state
            .find_mut(id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        if let Some(name) = &patch.name {
            object.name = name.clone();
        }
        if let Some(properties) = &patch.app_properties {
            for (key, value) in properties {
                match value {
                    Some(value) => {
                        object.app_properties.insert(key.clone(), value.clone());
                    }
                    None => {
                        object.app_properties.remove(key);
                    }
                }
            }
        }
        object.modified_time = Some(Utc::now());
        Ok(object.clone())
    }

    fn delete(&self, ctx: &OpContext, id: &str) -> Result<(), RemoteError> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);
        ctx.check()?;
        let mut state = self.state.lock().unwrap();
        if state.find(id).is_none() {
            return Err(RemoteError::NotFound(id.to_string()));
        }
        let mut doomed = vec![id.to_string()];
        let mut i = 0;
        while i < doomed.len() {
            let parent = doomed[i].clone();
            doomed.extend(
                state
                    .objects
                    .iter()
                    .filter(|object| object.parents.contains(&parent))
                    .map(|object| object.id.clone()),
            );
            i += 1;
        }
        state.objects.retain(|object| !doomed.contains(&object.id));
        for id in &doomed {
            state.contents.remove(id);
        }
        Ok(())
    }

    fn download(&self, ctx: &OpContext, id: &str) -> Result<Bytes, RemoteError> {
        self.calls.download.fetch_add(1, Ordering::SeqCst);
        ctx.check()?;
        if self.fail_downloads.load(Ordering::SeqCst) {
            return Err(RemoteError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "try later".to_string(),
            });
        }
        self.content(id).ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }
}

/// Configuration for tests: TTL cache, no sweeper thread.
pub fn test_config() -> Config {
    Config {
        cache_strategy: CacheStrategy::Ttl,
        cache_sweep_seconds: 0,
        tie_break: TieBreak::First,
        ..Config::default()
    }
}

/// A filesystem over a fresh fake drive, plus a handle on that drive.
pub fn fake_fs() -> (Arc<DriveFs<FakeDrive>>, FakeDrive) {
    fake_fs_with(test_config())
}

pub fn fake_fs_with(config: Config) -> (Arc<DriveFs<FakeDrive>>, FakeDrive) {
    let drive = FakeDrive::new();
    let fs = Arc::new(DriveFs::new(drive.clone(), &config));
    (fs, drive)
}
