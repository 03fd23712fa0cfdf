//! Content-addressed blob arena.
//!
//! Each file content is stored once under `<root>/<aa>/<sha256>`, where
//! `aa` is the first two hex digits. Writes go through a temporary file in
//! the arena and an atomic rename, so a blob path either holds the full
//! content or does not exist.

use std::{
    collections::HashSet,
    fs::{self, File},
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::models::Fingerprint;

const CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct BlobArena {
    root: PathBuf,
}

/// Blob count and total size of an arena.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaUsage {
    pub blobs: usize,
    pub bytes: u64,
}

impl BlobArena {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, blob: &str) -> PathBuf {
        let shard = blob.get(..2).unwrap_or("00");
        self.root.join(shard).join(blob)
    }

    pub fn contains(&self, blob: &str) -> bool {
        self.path_for(blob).is_file()
    }

    /// Copies the file at `source` into the arena and returns its
    /// fingerprint and size. Unchanged content is stored only once.
    pub fn put_file(&self, source: &Path) -> io::Result<(Fingerprint, u64)> {
        fs::create_dir_all(&self.root)?;
        let mut input = File::open(source)?;
        let mut staged = NamedTempFile::new_in(&self.root)?;
        let mut hasher = Sha256::new();
        let mut size = 0u64;
        let mut buffer = vec![0u8; CHUNK];
        loop {
            let read = input.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
            staged.write_all(&buffer[..read])?;
            size += read as u64;
        }
        let blob = hex::encode(hasher.finalize());

        let target = self.path_for(&blob);
        if !target.is_file() {
            if let Some(shard) = target.parent() {
                fs::create_dir_all(shard)?;
            }
            staged.as_file().sync_all()?;
            staged.persist(&target).map_err(|e| e.error)?;
        }
        Ok((blob, size))
    }

    /// Writes the blob's content to `dest` atomically.
    pub fn copy_out(&self, blob: &str, dest: &Path) -> io::Result<()> {
        let mut input = File::open(self.path_for(blob))?;
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        let mut staged = NamedTempFile::new_in(parent)?;
        io::copy(&mut input, &mut staged)?;
        staged.persist(dest).map_err(|e| e.error)?;
        Ok(())
    }

    /// Deletes every blob not in `keep`; returns how many were removed.
    pub fn sweep(&self, keep: &HashSet<Fingerprint>) -> io::Result<usize> {
        let mut removed = 0;
        for blob in self.blob_files() {
            let name = blob.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if !keep.contains(name) {
                fs::remove_file(&blob)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn usage(&self) -> ArenaUsage {
        self.blob_files()
            .iter()
            .filter_map(|path| path.metadata().ok())
            .fold(ArenaUsage::default(), |usage, meta| ArenaUsage {
                blobs: usage.blobs + 1,
                bytes: usage.bytes + meta.len(),
            })
    }

    /// Blob files only; staged temporaries sit directly under the root.
    fn blob_files(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.root)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect()
    }
}

/// SHA-256 of a file's content without storing it.
pub fn hash_file(path: &Path) -> io::Result<(Fingerprint, u64)> {
    let mut input = File::open(path)?;
    let mut hasher = Sha256::new();
    let size = io::copy(&mut input, &mut hasher)?;
    Ok((hex::encode(hasher.finalize()), size))
}
