//! Named-blob storage backend
//!
//! The trust-list tiers persist their records through this capability: a flat
//! store of blobs keyed by a fixed-size opaque [`ElementId`]. Implementations
//! wrap whatever the platform offers (flash pages, a filesystem, an EEPROM
//! driver). Open handles release on drop, so every early-error path closes
//! its file.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

/// Size of a blob identifier
pub const ELEMENT_ID_LEN: usize = 32;

/// Opaque fixed-size blob identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub [u8; ELEMENT_ID_LEN]);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Leading bytes identify the element; the tail is zero padding
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl ElementId {
    fn hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Errors from the storage backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Element not found")]
    NotFound,
    #[error("Read failed: {0}")]
    Read(String),
    #[error("Write failed: {0}")]
    Write(String),
    #[error("Delete failed: {0}")]
    Delete(String),
    #[error("Blob exceeds the backend size limit ({limit} bytes)")]
    TooLarge { limit: usize },
    #[error("Storage lock poisoned")]
    Lock,
}

/// An open blob; closed on drop
pub trait StorageFile {
    fn load(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError>;
    fn save(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError>;
    fn sync(&mut self) -> Result<(), StorageError>;
}

/// Named-blob store keyed by [`ElementId`]
pub trait StorageBackend: Send + Sync {
    /// Open a blob for reading and writing, creating it if absent
    fn open(&self, id: &ElementId) -> Result<Box<dyn StorageFile + '_>, StorageError>;

    /// Size of an existing blob, or `None` if it does not exist
    fn size(&self, id: &ElementId) -> Result<Option<usize>, StorageError>;

    /// Remove a blob; removing an absent blob is not an error
    fn delete(&self, id: &ElementId) -> Result<(), StorageError>;

    /// Largest single blob this backend accepts
    fn file_size_limit(&self) -> usize;

    /// Release backend resources
    fn deinit(&self) -> Result<(), StorageError>;
}

/// Read a whole blob
pub fn read_blob(backend: &dyn StorageBackend, id: &ElementId) -> Result<Vec<u8>, StorageError> {
    let size = backend.size(id)?.ok_or(StorageError::NotFound)?;
    let mut buf = vec![0u8; size];
    let mut file = backend.open(id)?;
    file.load(0, &mut buf)?;
    Ok(buf)
}

/// Write a whole blob and sync it
pub fn write_blob(
    backend: &dyn StorageBackend,
    id: &ElementId,
    data: &[u8],
) -> Result<(), StorageError> {
    if data.len() > backend.file_size_limit() {
        return Err(StorageError::TooLarge {
            limit: backend.file_size_limit(),
        });
    }
    let mut file = backend.open(id)?;
    file.save(0, data)?;
    file.sync()
}

const DEFAULT_FILE_SIZE_LIMIT: usize = 64 * 1024;

/// In-memory backend for tests and demos
pub struct MemoryStorage {
    blobs: Mutex<HashMap<ElementId, Vec<u8>>>,
    limit: usize,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
            limit: DEFAULT_FILE_SIZE_LIMIT,
        }
    }
}

struct MemoryFile<'a> {
    storage: &'a MemoryStorage,
    id: ElementId,
}

impl StorageFile for MemoryFile<'_> {
    fn load(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        let blobs = self.storage.blobs.lock().map_err(|_| StorageError::Lock)?;
        let blob = blobs.get(&self.id).ok_or(StorageError::NotFound)?;
        let end = offset + buf.len();
        if end > blob.len() {
            return Err(StorageError::Read(format!(
                "Range {}..{} outside blob of {} bytes",
                offset,
                end,
                blob.len()
            )));
        }
        buf.copy_from_slice(&blob[offset..end]);
        Ok(())
    }

    fn save(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        let mut blobs = self.storage.blobs.lock().map_err(|_| StorageError::Lock)?;
        let blob = blobs.entry(self.id).or_default();
        let end = offset + data.len();
        if blob.len() < end {
            blob.resize(end, 0);
        }
        blob[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn sync(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

impl StorageBackend for MemoryStorage {
    fn open(&self, id: &ElementId) -> Result<Box<dyn StorageFile + '_>, StorageError> {
        Ok(Box::new(MemoryFile {
            storage: self,
            id: *id,
        }))
    }

    fn size(&self, id: &ElementId) -> Result<Option<usize>, StorageError> {
        let blobs = self.blobs.lock().map_err(|_| StorageError::Lock)?;
        Ok(blobs.get(id).map(Vec::len))
    }

    fn delete(&self, id: &ElementId) -> Result<(), StorageError> {
        let mut blobs = self.blobs.lock().map_err(|_| StorageError::Lock)?;
        blobs.remove(id);
        Ok(())
    }

    fn file_size_limit(&self) -> usize {
        self.limit
    }

    fn deinit(&self) -> Result<(), StorageError> {
        let mut blobs = self.blobs.lock().map_err(|_| StorageError::Lock)?;
        blobs.clear();
        Ok(())
    }
}

/// Filesystem backend: one file per blob, named by the hex element id
pub struct FileStorage {
    base: PathBuf,
    limit: usize,
}

impl FileStorage {
    pub fn new(base: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base = base.into();
        fs::create_dir_all(&base).map_err(|e| StorageError::Write(e.to_string()))?;
        Ok(Self {
            base,
            limit: DEFAULT_FILE_SIZE_LIMIT,
        })
    }

    fn path_for(&self, id: &ElementId) -> PathBuf {
        self.base.join(id.hex())
    }
}

struct DiskFile {
    file: fs::File,
}

impl StorageFile for DiskFile {
    fn load(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        self.file
            .seek(SeekFrom::Start(offset as u64))
            .and_then(|_| self.file.read_exact(buf))
            .map_err(|e| StorageError::Read(e.to_string()))
    }

    fn save(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        self.file
            .seek(SeekFrom::Start(offset as u64))
            .and_then(|_| self.file.write_all(data))
            .map_err(|e| StorageError::Write(e.to_string()))
    }

    fn sync(&mut self) -> Result<(), StorageError> {
        self.file
            .sync_all()
            .map_err(|e| StorageError::Write(e.to_string()))
    }
}

impl StorageBackend for FileStorage {
    fn open(&self, id: &ElementId) -> Result<Box<dyn StorageFile + '_>, StorageError> {
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.path_for(id))
            .map_err(|e| StorageError::Write(e.to_string()))?;
        Ok(Box::new(DiskFile { file }))
    }

    fn size(&self, id: &ElementId) -> Result<Option<usize>, StorageError> {
        match fs::metadata(self.path_for(id)) {
            Ok(meta) => Ok(Some(meta.len() as usize)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Read(e.to_string())),
        }
    }

    fn delete(&self, id: &ElementId) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Delete(e.to_string())),
        }
    }

    fn file_size_limit(&self) -> usize {
        self.limit
    }

    fn deinit(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
