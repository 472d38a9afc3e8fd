//! Memory-mapped reads for large image files.
//!
//! Files of 1MB and up are mapped instead of copied into a heap buffer
//! before decoding.

use crate::error::HashError;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// Minimum file size to use memory-mapped I/O (1MB)
const MMAP_THRESHOLD: u64 = 1024 * 1024;

/// Read a file, mapping it when it is at least [`MMAP_THRESHOLD`] bytes.
pub fn read_file_bytes(path: &Path) -> Result<FileBytes, HashError> {
    let io_error = |source| HashError::IoError {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_error)?;
    let len = file.metadata().map_err(io_error)?.len();

    if len == 0 {
        return Err(HashError::EmptyImage {
            path: path.to_path_buf(),
        });
    }

    if should_use_mmap(len) {
        // SAFETY: the map is read-only and owns the file handle for its lifetime.
        // A concurrent truncation by another process surfaces as a decode error.
        let mmap = unsafe { Mmap::map(&file) }.map_err(io_error)?;
        Ok(FileBytes::Mmap(mmap))
    } else {
        let bytes = std::fs::read(path).map_err(io_error)?;
        Ok(FileBytes::Vec(bytes))
    }
}

/// File contents, either owned or memory-mapped.
pub enum FileBytes {
    Vec(Vec<u8>),
    Mmap(Mmap),
}

impl AsRef<[u8]> for FileBytes {
    fn as_ref(&self) -> &[u8] {
        match self {
            FileBytes::Vec(v) => v,
            FileBytes::Mmap(m) => m,
        }
    }
}

impl std::ops::Deref for FileBytes {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_ref()
    }
}

/// Whether a file of `size` bytes is read through a memory map.
pub fn should_use_mmap(size: u64) -> bool {
    size >= MMAP_THRESHOLD
}
