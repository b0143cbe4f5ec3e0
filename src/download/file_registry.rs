use std::path::PathBuf;
use std::sync::Mutex;

use crate::search::BoundedCache;

/// Synthetic song id to saved file, read by the byte-streaming layer.
pub struct SavedFileRegistry {
    files: Mutex<BoundedCache<String, PathBuf>>,
}

impl SavedFileRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            files: Mutex::new(BoundedCache::new(capacity, None)),
        }
    }

    /// Records `path` under a fresh id and returns the id.
    pub fn register(&self, path: PathBuf) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.files.lock().unwrap().insert(id.clone(), path);
        id
    }

    pub fn get(&self, id: &str) -> Option<PathBuf> {
        self.files.lock().unwrap().get(&id.to_string())
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
