use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed snapshot {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl SnapshotError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn yaml(path: &Path, source: serde_yaml::Error) -> Self {
        SnapshotError::Yaml {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// YAML load/dump for snapshot files.
///
/// Calls are serialized through an internal lock, so one instance can be
/// shared between the crawl task and event subscribers.
#[derive(Debug)]
pub struct SnapshotCodec {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl SnapshotCodec {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a file relative to the data directory.
    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    pub fn exists(&self, file: &str) -> bool {
        self.path(file).exists()
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Load a snapshot; a missing or empty file yields `T::default()`.
    pub fn load<T: DeserializeOwned + Default>(&self, file: &str) -> Result<T, SnapshotError> {
        self.load_path(&self.path(file))
    }

    pub fn load_path<T: DeserializeOwned + Default>(&self, path: &Path) -> Result<T, SnapshotError> {
        let _guard = self.guard();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(SnapshotError::io(path, e)),
        };
        if text.trim().is_empty() {
            return Ok(T::default());
        }
        serde_yaml::from_str(&text).map_err(|e| SnapshotError::yaml(path, e))
    }

    /// Overwrite a snapshot in place.
    pub fn dump<T: Serialize>(&self, file: &str, value: &T) -> Result<(), SnapshotError> {
        self.dump_path(&self.path(file), value)
    }

    pub fn dump_path<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), SnapshotError> {
        let text = serde_yaml::to_string(value).map_err(|e| SnapshotError::yaml(path, e))?;
        let _guard = self.guard();
        ensure_parent(path)?;
        fs::write(path, text).map_err(|e| SnapshotError::io(path, e))?;
        debug!("Wrote snapshot {}", path.display());
        Ok(())
    }

    /// Write `<file>.tmp`, sync it, then rename it over `file`.
    pub fn dump_atomic<T: Serialize>(&self, file: &str, value: &T) -> Result<(), SnapshotError> {
        let path = self.path(file);
        let text = serde_yaml::to_string(value).map_err(|e| SnapshotError::yaml(&path, e))?;
        let tmp = path.with_file_name(format!("{}.tmp", file_name(&path)));

        let _guard = self.guard();
        ensure_parent(&path)?;
        {
            let mut out = fs::File::create(&tmp).map_err(|e| SnapshotError::io(&tmp, e))?;
            out.write_all(text.as_bytes())
                .map_err(|e| SnapshotError::io(&tmp, e))?;
            out.sync_all().map_err(|e| SnapshotError::io(&tmp, e))?;
        }
        fs::rename(&tmp, &path).map_err(|e| SnapshotError::io(&path, e))?;
        debug!("Committed snapshot {}", path.display());
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn ensure_parent(path: &Path) -> Result<(), SnapshotError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| SnapshotError::io(parent, e))
        }
        _ => Ok(()),
    }
}
