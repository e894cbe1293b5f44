// src/file.rs
//
// Whole-file helpers: read an encoded image into memory, write one back.

use crate::error::{ImageError, Result};
use crate::pool::BufferPool;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use tracing::debug;

/// Read the whole file at `path`.
///
/// The buffer is sized from the file metadata up front; reading continues
/// until EOF, so a short read from the OS does not truncate the result.
pub fn read(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    read_into(path.as_ref(), Vec::new())
}

/// Like [`read`], drawing the destination buffer from `pool`.
pub fn read_pooled(path: impl AsRef<Path>, pool: &BufferPool) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let len = std::fs::metadata(path)
        .map(|m| m.len() as usize)
        .unwrap_or(0);
    read_into(path, pool.acquire(len))
}

fn read_into(path: &Path, mut buf: Vec<u8>) -> Result<Vec<u8>> {
    let path_str = path.to_string_lossy().into_owned();
    let mut file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ImageError::file_not_found(path_str.clone()),
        _ => ImageError::file_read_failed(path_str.clone(), e),
    })?;

    let size = file
        .metadata()
        .map_err(|e| ImageError::file_read_failed(path_str.clone(), e))?
        .len() as usize;

    buf.clear();
    buf.reserve_exact(size);
    file.read_to_end(&mut buf)
        .map_err(|e| ImageError::file_read_failed(path_str.clone(), e))?;

    debug!(target: "image_dsl::file", path = %path_str, bytes = buf.len(), "read");
    Ok(buf)
}

/// Write `buf` to `path`, creating or truncating the file.
///
/// No rename or fsync: a crash mid-write leaves a truncated file.
pub fn write(path: impl AsRef<Path>, buf: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy().into_owned();
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| ImageError::file_write_failed(path_str.clone(), e))?;

    file.write_all(buf)
        .map_err(|e| ImageError::file_write_failed(path_str.clone(), e))?;

    debug!(target: "image_dsl::file", path = %path_str, bytes = buf.len(), "write");
    Ok(())
}
