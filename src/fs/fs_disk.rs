/*!
This module contains the file system wrapper for disk-based file systems.
*/

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::traits::{FileSystem, RandomAccessFile, SequentialFile, WritableFile};

/// File system implementation that delegates I/O to the operating system.
pub struct OsFileSystem {}

/// Public methods
impl OsFileSystem {
    /// Create an instance of the [`OsFileSystem`].
    pub fn new() -> Self {
        OsFileSystem {}
    }
}

impl Default for OsFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for OsFileSystem {
    fn get_name(&self) -> String {
        "OsFileSystem".to_string()
    }

    fn create_file(&self, path: &Path) -> io::Result<Box<dyn WritableFile>> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Box::new(OsWritableFile {
            writer: BufWriter::new(file),
        }))
    }

    fn open_sequential_file(&self, path: &Path) -> io::Result<Box<dyn SequentialFile>> {
        let file = File::open(path)?;
        Ok(Box::new(OsSequentialFile { file }))
    }

    fn open_random_access_file(&self, path: &Path) -> io::Result<Box<dyn RandomAccessFile>> {
        let file = File::open(path)?;
        Ok(Box::new(file))
    }

    fn get_file_size(&self, path: &Path) -> io::Result<u64> {
        Ok(fs::metadata(path)?.len())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }
}

/// A disk-backed file being written front to back with application-side buffering.
struct OsWritableFile {
    writer: BufWriter<File>,
}

impl WritableFile for OsWritableFile {
    fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    fn sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }
}

/// A disk-backed file being read front to back.
struct OsSequentialFile {
    file: File,
}

impl SequentialFile for OsSequentialFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // `File::read` may return short counts even away from the end of the file, so keep
        // reading until the buffer is full or the file runs out.
        let mut total_read = 0;
        while total_read < buf.len() {
            let bytes_read = self.file.read(&mut buf[total_read..])?;
            if bytes_read == 0 {
                break;
            }

            total_read += bytes_read;
        }

        Ok(total_read)
    }

    fn skip(&mut self, num_bytes: u64) -> io::Result<()> {
        self.file.seek(SeekFrom::Current(num_bytes as i64))?;

        Ok(())
    }
}

impl RandomAccessFile for File {
    #[cfg(target_family = "unix")]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        use std::os::unix::prelude::FileExt;

        let mut total_read = 0;
        while total_read < buf.len() {
            let bytes_read =
                FileExt::read_at(self, &mut buf[total_read..], offset + total_read as u64)?;
            if bytes_read == 0 {
                break;
            }

            total_read += bytes_read;
        }

        Ok(total_read)
    }

    #[cfg(target_family = "windows")]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        use std::os::windows::prelude::FileExt;

        let mut total_read = 0;
        while total_read < buf.len() {
            let bytes_read = self.seek_read(&mut buf[total_read..], offset + total_read as u64)?;
            if bytes_read == 0 {
                break;
            }

            total_read += bytes_read;
        }

        Ok(total_read)
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn files_round_trip_through_the_os_file_system() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("roundtrip");
        let fs = OsFileSystem::new();

        let mut writable = fs.create_file(&path).unwrap();
        writable.append(b"hello ").unwrap();
        writable.append(b"world").unwrap();
        writable.sync().unwrap();

        assert_eq!(fs.get_file_size(&path).unwrap(), 11);

        let mut sequential = fs.open_sequential_file(&path).unwrap();
        let mut buf = vec![0; 5];
        assert_eq!(sequential.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
        sequential.skip(1).unwrap();
        assert_eq!(sequential.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"world");

        let random_access = fs.open_random_access_file(&path).unwrap();
        let mut buf = vec![0; 5];
        assert_eq!(random_access.read_at(&mut buf, 6).unwrap(), 5);
        assert_eq!(&buf, b"world");
    }
}
