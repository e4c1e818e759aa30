//! Mock mirror store for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use super::lock;
use crate::mirror::{MirrorError, MirrorStore};

/// A recorded remote operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOp {
    Put { dir: String, name: String },
    Delete { dir: String, name: String },
}

/// In-memory [`MirrorStore`] recording every operation.
#[derive(Debug, Default)]
pub struct MockMirrorStore {
    files: Mutex<BTreeMap<(String, String), Vec<u8>>>,
    ops: Mutex<Vec<MirrorOp>>,
    fail_puts: Mutex<bool>,
    failing_names: Mutex<HashSet<String>>,
}

impl MockMirrorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate remote files.
    pub fn seed(&self, dir: &str, name: &str, content: Vec<u8>) {
        lock(&self.files).insert((dir.to_string(), name.to_string()), content);
    }

    /// Make every following `put` fail with a non-retryable error.
    /// Passing `false` also clears the failures set by [`Self::fail_put_of`].
    pub fn fail_puts(&self, fail: bool) {
        *lock(&self.fail_puts) = fail;
        if !fail {
            lock(&self.failing_names).clear();
        }
    }

    /// Make puts of files named `name` fail, in any directory.
    pub fn fail_put_of(&self, name: &str) {
        lock(&self.failing_names).insert(name.to_string());
    }

    pub fn ops(&self) -> Vec<MirrorOp> {
        lock(&self.ops).clone()
    }

    pub fn puts(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                MirrorOp::Put { name, .. } => Some(name),
                MirrorOp::Delete { .. } => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                MirrorOp::Delete { name, .. } => Some(name),
                MirrorOp::Put { .. } => None,
            })
            .collect()
    }

    pub fn clear_ops(&self) {
        lock(&self.ops).clear();
    }

    pub fn file(&self, dir: &str, name: &str) -> Option<Vec<u8>> {
        lock(&self.files)
            .get(&(dir.to_string(), name.to_string()))
            .cloned()
    }

    /// Names of the files currently stored in `dir`, sorted.
    pub fn files_in(&self, dir: &str) -> Vec<String> {
        lock(&self.files)
            .keys()
            .filter(|(d, _)| d == dir)
            .map(|(_, name)| name.clone())
            .collect()
    }
}

#[async_trait]
impl MirrorStore for MockMirrorStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn put(&self, dir: &str, file_name: &str, content: Vec<u8>) -> Result<(), MirrorError> {
        if *lock(&self.fail_puts) || lock(&self.failing_names).contains(file_name) {
            return Err(MirrorError::Remote {
                operation: format!("put {}/{}", dir, file_name),
                message: "mock failure".to_string(),
                retryable: false,
            });
        }
        lock(&self.ops).push(MirrorOp::Put {
            dir: dir.to_string(),
            name: file_name.to_string(),
        });
        lock(&self.files).insert((dir.to_string(), file_name.to_string()), content);
        Ok(())
    }

    async fn delete(&self, dir: &str, file_name: &str) -> Result<(), MirrorError> {
        lock(&self.ops).push(MirrorOp::Delete {
            dir: dir.to_string(),
            name: file_name.to_string(),
        });
        lock(&self.files).remove(&(dir.to_string(), file_name.to_string()));
        Ok(())
    }
}
