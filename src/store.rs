//! Object-store capability boundary.
//!
//! The forensic tools never talk to a cluster directly; they are handed an
//! [`ObjectStore`]. Control-plane calls (`connect`, pool resolution) are
//! synchronous. Data-plane calls are completion-based, because the real
//! client completes them on an internal I/O thread; the
//! [`BlockingObjectStore`] extension turns each into a synchronous
//! one-liner via [`crate::completion::block_on`].
//!
//! Two in-tree backends:
//! - [`MemoryObjectStore`], the test fake
//! - [`FsObjectStore`], one file per object under a root directory, for
//!   running the tools against an extracted copy of a pool

use crate::completion::{block_on, Completion};
use crate::error::{JournalError, JournalResult};
use std::collections::HashMap;
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Injected object-store client capability.
pub trait ObjectStore: Send + Sync {
    /// Establish the client connection.
    fn connect(&self) -> JournalResult<()>;

    /// Resolve a pool id to its name.
    fn pool_reverse_lookup(&self, pool_id: i64) -> JournalResult<String>;

    /// Read up to `len` bytes of `object` starting at `offset`.
    ///
    /// Reads past the end of the object return the available bytes;
    /// `u64::MAX` reads the whole object. An absent object completes with
    /// [`JournalError::ObjectMissing`].
    fn read(&self, object: &str, offset: u64, len: u64, done: Completion<JournalResult<Vec<u8>>>);

    /// Write `data` into `object` at `offset`, extending it if needed.
    fn write(&self, object: &str, offset: u64, data: &[u8], done: Completion<JournalResult<()>>);

    /// Replace the entire contents of `object` with `data`.
    fn write_full(&self, object: &str, data: &[u8], done: Completion<JournalResult<()>>);
}

/// Synchronous one-liners over the completion-based data plane.
pub trait BlockingObjectStore {
    /// Blocking [`ObjectStore::read`].
    fn read_sync(&self, object: &str, offset: u64, len: u64) -> JournalResult<Vec<u8>>;
    /// Blocking [`ObjectStore::write`].
    fn write_sync(&self, object: &str, offset: u64, data: &[u8]) -> JournalResult<()>;
    /// Blocking [`ObjectStore::write_full`].
    fn write_full_sync(&self, object: &str, data: &[u8]) -> JournalResult<()>;
}

impl<S: ObjectStore + ?Sized> BlockingObjectStore for S {
    fn read_sync(&self, object: &str, offset: u64, len: u64) -> JournalResult<Vec<u8>> {
        block_on(|done| self.read(object, offset, len, done))
    }

    fn write_sync(&self, object: &str, offset: u64, data: &[u8]) -> JournalResult<()> {
        block_on(|done| self.write(object, offset, data, done))
    }

    fn write_full_sync(&self, object: &str, data: &[u8]) -> JournalResult<()> {
        block_on(|done| self.write_full(object, data, done))
    }
}

fn lock_failed(resource: &str) -> JournalError {
    JournalError::LockFailed {
        resource: resource.to_string(),
        reason: "lock poisoned".to_string(),
    }
}

fn slice_object(bytes: &[u8], offset: u64, len: u64) -> Vec<u8> {
    let start = usize::try_from(offset).unwrap_or(usize::MAX).min(bytes.len());
    let end = if len == u64::MAX {
        bytes.len()
    } else {
        usize::try_from(offset.saturating_add(len))
            .unwrap_or(usize::MAX)
            .min(bytes.len())
    };
    bytes[start..end.max(start)].to_vec()
}

/// In-memory `ObjectStore` used for tests.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    pools: Arc<RwLock<HashMap<i64, String>>>,
}

impl MemoryObjectStore {
    /// Create an empty in-memory store with no pools registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an in-memory store with one pool registered.
    pub fn with_pool(pool_id: i64, name: &str) -> Self {
        let store = Self::default();
        store.add_pool(pool_id, name);
        store
    }

    /// Register a pool id → name mapping.
    pub fn add_pool(&self, pool_id: i64, name: &str) {
        self.pools
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(pool_id, name.to_string());
    }

    /// Insert (or replace) an object's bytes.
    pub fn insert(&self, object: &str, bytes: Vec<u8>) {
        self.objects
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(object.to_string(), bytes);
    }

    /// Remove an object, if present.
    pub fn remove(&self, object: &str) {
        self.objects
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(object);
    }

    /// A copy of an object's bytes, if present.
    pub fn get(&self, object: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(object)
            .cloned()
    }

    /// Sorted names of all stored objects.
    pub fn object_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .objects
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl ObjectStore for MemoryObjectStore {
    fn connect(&self) -> JournalResult<()> {
        Ok(())
    }

    fn pool_reverse_lookup(&self, pool_id: i64) -> JournalResult<String> {
        self.pools
            .read()
            .map_err(|_| lock_failed("memory store pools"))?
            .get(&pool_id)
            .cloned()
            .ok_or(JournalError::PoolNotFound(pool_id))
    }

    fn read(&self, object: &str, offset: u64, len: u64, done: Completion<JournalResult<Vec<u8>>>) {
        let result = (|| {
            let map = self
                .objects
                .read()
                .map_err(|_| lock_failed("memory store objects"))?;
            let bytes = map
                .get(object)
                .ok_or_else(|| JournalError::ObjectMissing(object.to_string()))?;
            Ok(slice_object(bytes, offset, len))
        })();
        done.complete(result);
    }

    fn write(&self, object: &str, offset: u64, data: &[u8], done: Completion<JournalResult<()>>) {
        let result = (|| {
            let mut map = self
                .objects
                .write()
                .map_err(|_| lock_failed("memory store objects"))?;
            let bytes = map.entry(object.to_string()).or_default();
            let offset = usize::try_from(offset)
                .map_err(|_| JournalError::InvalidConfig("write offset overflows".into()))?;
            let end = offset + data.len();
            if bytes.len() < end {
                bytes.resize(end, 0);
            }
            bytes[offset..end].copy_from_slice(data);
            Ok(())
        })();
        done.complete(result);
    }

    fn write_full(&self, object: &str, data: &[u8], done: Completion<JournalResult<()>>) {
        let result = self
            .objects
            .write()
            .map_err(|_| lock_failed("memory store objects"))
            .map(|mut map| {
                map.insert(object.to_string(), data.to_vec());
            });
        done.complete(result);
    }
}

/// Filesystem-backed `ObjectStore`: one file per object under `root`.
///
/// Lets the tools run against an extracted copy of a pool with no cluster
/// available. A single `(pool id, name)` binding plays the role of pool
/// resolution.
pub struct FsObjectStore {
    root: PathBuf,
    pool_id: i64,
    pool_name: String,
}

impl FsObjectStore {
    /// Create (or open) an fs-backed store rooted at `root`.
    pub fn new(
        root: impl Into<PathBuf>,
        pool_id: i64,
        pool_name: impl Into<String>,
    ) -> JournalResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            pool_id,
            pool_name: pool_name.into(),
        })
    }

    fn object_path(&self, object: &str) -> PathBuf {
        self.root.join(object)
    }
}

impl ObjectStore for FsObjectStore {
    fn connect(&self) -> JournalResult<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(JournalError::Unavailable(format!(
                "store root {} is not a directory",
                self.root.display()
            )))
        }
    }

    fn pool_reverse_lookup(&self, pool_id: i64) -> JournalResult<String> {
        if pool_id == self.pool_id {
            Ok(self.pool_name.clone())
        } else {
            Err(JournalError::PoolNotFound(pool_id))
        }
    }

    fn read(&self, object: &str, offset: u64, len: u64, done: Completion<JournalResult<Vec<u8>>>) {
        let result = (|| {
            let bytes = std::fs::read(self.object_path(object)).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    JournalError::ObjectMissing(object.to_string())
                } else {
                    e.into()
                }
            })?;
            Ok(slice_object(&bytes, offset, len))
        })();
        done.complete(result);
    }

    fn write(&self, object: &str, offset: u64, data: &[u8], done: Completion<JournalResult<()>>) {
        let result = (|| {
            let mut file = std::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(self.object_path(object))?;
            file.seek(SeekFrom::Start(offset))?;
            file.write_all(data)?;
            Ok(())
        })();
        done.complete(result);
    }

    fn write_full(&self, object: &str, data: &[u8], done: Completion<JournalResult<()>>) {
        let result = std::fs::write(self.object_path(object), data).map_err(JournalError::from);
        done.complete(result);
    }
}
