//! Directory-backed store
//!
//! Each key maps to `<root>/<key>.call`. Writes go to a temp file first and are
//! renamed into place, so a reader never sees a half-written call. `take`
//! claims the file by renaming it before reading, which makes consumption
//! exactly-once across threads and processes sharing the directory.

use super::{Store, StoreKey};
use crate::errors::StoreError;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const EXTENSION: &str = "call";

pub struct FileStore {
    root: PathBuf,
    /// zstd level, `None` stores raw bytes
    compression_level: Option<i32>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        Ok(Self {
            root,
            compression_level: None,
        })
    }

    /// Compress stored calls with zstd at `level` (1-22)
    pub fn with_compression(mut self, level: i32) -> Self {
        self.compression_level = Some(level);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &StoreKey) -> PathBuf {
        self.root.join(format!("{}.{}", key, EXTENSION))
    }

    fn pack(&self, bytes: &[u8]) -> Result<Vec<u8>, StoreError> {
        match self.compression_level {
            Some(level) => zstd::encode_all(bytes, level).map_err(StoreError::Compression),
            None => Ok(bytes.to_vec()),
        }
    }

    fn unpack(&self, stored: Vec<u8>) -> Result<Vec<u8>, StoreError> {
        match self.compression_level {
            Some(_) => zstd::decode_all(&stored[..]).map_err(StoreError::Compression),
            None => Ok(stored),
        }
    }

    fn read_path(&self, key: &StoreKey, path: &Path) -> Result<Vec<u8>, StoreError> {
        let stored = fs::read(path).map_err(|err| not_found_or_io(err, key))?;
        self.unpack(stored)
    }

    /// Number of stored calls
    pub fn len(&self) -> Result<usize, StoreError> {
        let mut count = 0;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.path().extension() == Some(std::ffi::OsStr::new(EXTENSION)) {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Remove every stored call
    pub fn clear(&self) -> Result<(), StoreError> {
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension() == Some(std::ffi::OsStr::new(EXTENSION)) {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

impl Store for FileStore {
    fn write(&self, key: &StoreKey, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let packed = self.pack(bytes)?;

        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&packed)?;
        file.sync_all()?;
        fs::rename(&temp_path, &path)?;

        debug!(key = %key, bytes = bytes.len(), stored = packed.len(), "Stored call");
        Ok(())
    }

    fn read(&self, key: &StoreKey) -> Result<Vec<u8>, StoreError> {
        self.read_path(key, &self.path_for(key))
    }

    fn remove(&self, key: &StoreKey) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn contains(&self, key: &StoreKey) -> bool {
        self.path_for(key).is_file()
    }

    fn take(&self, key: &StoreKey) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key);
        let claimed = path.with_extension("taken");
        fs::rename(&path, &claimed).map_err(|err| not_found_or_io(err, key))?;

        let bytes = match self.read_path(key, &claimed) {
            Ok(bytes) => bytes,
            Err(err) => {
                // Put the call back so it can be retried
                if let Err(restore) = fs::rename(&claimed, &path) {
                    warn!(key = %key, error = %restore, "Failed to restore claimed call");
                }
                return Err(err);
            }
        };

        if let Err(err) = fs::remove_file(&claimed) {
            warn!(key = %key, path = %claimed.display(), error = %err, "Failed to remove claimed call");
        }
        Ok(bytes)
    }
}

fn not_found_or_io(err: io::Error, key: &StoreKey) -> StoreError {
    if err.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound(key.to_string())
    } else {
        StoreError::Io(err)
    }
}
