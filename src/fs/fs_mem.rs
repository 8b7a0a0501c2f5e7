/*!
This module contains an in-memory file system wrapper.

The in-memory file system keeps whole files as byte vectors behind locks. It exists for tests:
format-level round trips can run against it without touching a disk, and it is cheap to
inspect or truncate file contents to simulate crashes.
*/

use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::traits::{FileSystem, RandomAccessFile, SequentialFile, WritableFile};

/// The contents of one in-memory file, shared between the registry and open handles.
type SharedFileData = Arc<RwLock<Vec<u8>>>;

/// A file system wrapper that keeps all file contents in memory.
#[derive(Clone, Default)]
pub struct InMemoryFileSystem {
    /// All files known to the file system keyed by their path.
    files: Arc<RwLock<HashMap<PathBuf, SharedFileData>>>,
}

/// Public methods
impl InMemoryFileSystem {
    /// Create an instance of the [`InMemoryFileSystem`].
    pub fn new() -> Self {
        Self::default()
    }
}

/// Private methods
impl InMemoryFileSystem {
    /// Look up the file at `path`, failing with [`ErrorKind::NotFound`] if it is unknown.
    fn find_file(&self, path: &Path) -> io::Result<SharedFileData> {
        self.files.read().get(path).cloned().ok_or_else(|| {
            io::Error::new(
                ErrorKind::NotFound,
                format!("No in-memory file at {}", path.display()),
            )
        })
    }
}

impl FileSystem for InMemoryFileSystem {
    fn get_name(&self) -> String {
        "InMemoryFileSystem".to_string()
    }

    fn create_file(&self, path: &Path) -> io::Result<Box<dyn WritableFile>> {
        let data: SharedFileData = Arc::new(RwLock::new(vec![]));
        self.files
            .write()
            .insert(path.to_path_buf(), Arc::clone(&data));

        Ok(Box::new(InMemoryWritableFile { data }))
    }

    fn open_sequential_file(&self, path: &Path) -> io::Result<Box<dyn SequentialFile>> {
        let data = self.find_file(path)?;

        Ok(Box::new(InMemorySequentialFile { data, position: 0 }))
    }

    fn open_random_access_file(&self, path: &Path) -> io::Result<Box<dyn RandomAccessFile>> {
        let data = self.find_file(path)?;

        Ok(Box::new(InMemoryRandomAccessFile { data }))
    }

    fn get_file_size(&self, path: &Path) -> io::Result<u64> {
        Ok(self.find_file(path)?.read().len() as u64)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        match self.files.write().remove(path) {
            Some(_) => Ok(()),
            None => Err(io::Error::new(
                ErrorKind::NotFound,
                format!("No in-memory file at {}", path.display()),
            )),
        }
    }

    fn create_dir_all(&self, _path: &Path) -> io::Result<()> {
        // Directories are implicit for in-memory files.
        Ok(())
    }
}

/// An in-memory file being written front to back.
struct InMemoryWritableFile {
    data: SharedFileData,
}

impl WritableFile for InMemoryWritableFile {
    fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.data.write().extend_from_slice(data);

        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// An in-memory file being read front to back.
struct InMemorySequentialFile {
    data: SharedFileData,
    position: usize,
}

impl SequentialFile for InMemorySequentialFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.data.read();
        let available = data.len().saturating_sub(self.position);
        let num_bytes = std::cmp::min(buf.len(), available);
        buf[..num_bytes].copy_from_slice(&data[self.position..self.position + num_bytes]);
        self.position += num_bytes;

        Ok(num_bytes)
    }

    fn skip(&mut self, num_bytes: u64) -> io::Result<()> {
        self.position = self.position.saturating_add(num_bytes as usize);

        Ok(())
    }
}

/// An in-memory file read at arbitrary offsets.
struct InMemoryRandomAccessFile {
    data: SharedFileData,
}

impl RandomAccessFile for InMemoryRandomAccessFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let data = self.data.read();
        let start = std::cmp::min(offset as usize, data.len());
        let num_bytes = std::cmp::min(buf.len(), data.len() - start);
        buf[..num_bytes].copy_from_slice(&data[start..start + num_bytes]);

        Ok(num_bytes)
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.data.read().len() as u64)
    }
}
