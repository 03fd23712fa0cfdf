//! Capturing, fingerprinting and restoring filesystem nodes.

use std::{
    collections::BTreeMap,
    fs, io,
    path::Path,
};

use sha2::{Digest, Sha256};

use super::blobs::{BlobArena, hash_file};
use crate::models::{Fingerprint, NodeSnapshot};

/// Captures `path` into a manifest. With an arena, file contents are
/// stored; without one they are only hashed.
pub fn capture(path: &Path, arena: Option<&BlobArena>) -> io::Result<NodeSnapshot> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(NodeSnapshot::Missing),
        Err(e) => return Err(e),
    };

    let file_type = meta.file_type();
    if file_type.is_symlink() {
        return Ok(NodeSnapshot::Symlink {
            target: fs::read_link(path)?,
        });
    }

    if file_type.is_dir() {
        let mut entries = BTreeMap::new();
        for child in fs::read_dir(path)? {
            let child = child?;
            let name = child.file_name().to_string_lossy().into_owned();
            entries.insert(name, capture(&child.path(), arena)?);
        }
        return Ok(NodeSnapshot::Dir {
            mode: mode_of(&meta),
            entries,
        });
    }

    let (blob, size) = match arena {
        Some(arena) => arena.put_file(path)?,
        None => hash_file(path)?,
    };
    Ok(NodeSnapshot::File {
        blob,
        size,
        mode: mode_of(&meta),
    })
}

/// Stable digest of a manifest.
pub fn fingerprint(node: &NodeSnapshot) -> Fingerprint {
    let bytes = serde_json::to_vec(node).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}

/// Fingerprint of whatever currently sits at `path`.
pub fn current_fingerprint(path: &Path) -> io::Result<Fingerprint> {
    capture(path, None).map(|node| fingerprint(&node))
}

/// First blob referenced by `node` that the arena no longer holds.
pub fn missing_blob<'a>(node: &'a NodeSnapshot, arena: &BlobArena) -> Option<&'a Fingerprint> {
    node.blobs().into_iter().find(|blob| !arena.contains(blob))
}

/// Replaces whatever is at `path` with the captured node.
pub fn restore(path: &Path, node: &NodeSnapshot, arena: &BlobArena) -> io::Result<()> {
    remove_existing(path)?;
    if let Some(parent) = path.parent()
        && !matches!(node, NodeSnapshot::Missing)
    {
        fs::create_dir_all(parent)?;
    }
    write_node(path, node, arena)
}

fn remove_existing(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn write_node(path: &Path, node: &NodeSnapshot, arena: &BlobArena) -> io::Result<()> {
    match node {
        NodeSnapshot::Missing => Ok(()),
        NodeSnapshot::File { blob, mode, .. } => {
            arena.copy_out(blob, path)?;
            set_mode(path, *mode)
        }
        NodeSnapshot::Symlink { target } => make_symlink(target, path),
        NodeSnapshot::Dir { mode, entries } => {
            fs::create_dir(path)?;
            for (name, child) in entries {
                write_node(&path.join(name), child, arena)?;
            }
            set_mode(path, *mode)
        }
    }
}

#[cfg(unix)]
fn mode_of(meta: &fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn mode_of(_meta: &fs::Metadata) -> Option<u32> {
    None
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: Option<u32>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    match mode {
        Some(mode) => fs::set_permissions(path, fs::Permissions::from_mode(mode)),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: Option<u32>) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn make_symlink(target: &Path, path: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, path)
}

#[cfg(not(unix))]
fn make_symlink(target: &Path, path: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!(
            "cannot recreate symlink {} -> {}",
            path.display(),
            target.display()
        ),
    ))
}
