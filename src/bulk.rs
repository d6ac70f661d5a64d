//! Bulk create/extract helpers built on the core archive primitives

use crate::archive::Archive;
use crate::error::{ImgError, Result};
use crate::format::NAME_SIZE;
use crate::types::{ArchiveMode, NameEncoding};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Pack every file under `src_dir` into a fresh archive at `archive_path`.
///
/// Entry names are the `/`-separated paths relative to `src_dir`. A name
/// that encodes to more than 24 bytes aborts the whole creation with
/// [`ImgError::Format`] before the archive file is touched.
pub fn create_archive_from_directory(
    src_dir: impl AsRef<Path>,
    archive_path: impl AsRef<Path>,
    encoding: NameEncoding,
) -> Result<Archive> {
    let src_dir = src_dir.as_ref();

    let mut files = Vec::new();
    for dent in WalkDir::new(src_dir).sort_by_file_name() {
        let dent = dent.map_err(io::Error::from)?;
        if !dent.file_type().is_file() {
            continue;
        }
        let rel = dent
            .path()
            .strip_prefix(src_dir)
            .map_err(|e| ImgError::Format(format!("cannot relativize {:?}: {e}", dent.path())))?;
        let mut parts = Vec::new();
        for comp in rel.components() {
            match comp.as_os_str().to_str() {
                Some(part) => parts.push(part),
                None => {
                    return Err(ImgError::Format(format!("non-UTF-8 path: {rel:?}")));
                }
            }
        }
        let name = parts.join("/");
        if encoding.encode(&name).len() > NAME_SIZE {
            return Err(ImgError::Format(format!(
                "entry name exceeds {NAME_SIZE} bytes: {name}"
            )));
        }
        files.push((name, dent.into_path()));
    }

    let mut archive = Archive::create(archive_path, encoding)?;
    for (name, path) in files {
        debug!("packing {:?} as {}", path, name);
        if archive.create_entry(&name)?.is_none() {
            warn!("skipping {:?}: duplicate or invalid entry name", path);
            continue;
        }
        let mut stream = archive.open_entry(&name)?;
        stream.write_all(&fs::read(&path)?)?;
        archive.close_entry(stream)?;
    }
    Ok(archive)
}

/// Unpack every entry of the archive at `archive_path` under `dest_dir`.
///
/// Entry content is stored in whole 2048-byte blocks, so extracted files
/// keep their zero padding. Entries whose names would escape `dest_dir`
/// are skipped with a warning.
pub fn extract_archive_to_directory(
    archive_path: impl AsRef<Path>,
    dest_dir: impl AsRef<Path>,
    encoding: NameEncoding,
) -> Result<()> {
    let dest_dir = dest_dir.as_ref();
    let mut archive = Archive::open(archive_path, ArchiveMode::Read, encoding)?;
    fs::create_dir_all(dest_dir)?;

    let names: Vec<String> = archive
        .entries()
        .map(|entry| entry.full_name().to_string())
        .collect();
    for name in names {
        let Some(rel) = sanitize(&name) else {
            warn!("skipping entry with unsafe name: {}", name);
            continue;
        };
        let target = dest_dir.join(rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut stream = archive.open_entry(&name)?;
        let mut content = Vec::with_capacity(stream.len());
        stream.read_to_end(&mut content)?;
        archive.close_entry(stream)?;

        fs::write(&target, &content)?;
        debug!("extracted {} ({} bytes)", name, content.len());
    }
    Ok(())
}

/// Turn an entry name into a relative path, rejecting anything absolute or
/// traversing upwards.
fn sanitize(name: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for comp in Path::new(name).components() {
        match comp {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if out.as_os_str().is_empty() { None } else { Some(out) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_rejects_escapes() {
        assert_eq!(
            sanitize("models/fence.dff"),
            Some(PathBuf::from("models/fence.dff"))
        );
        assert_eq!(sanitize("./radar.txd"), Some(PathBuf::from("radar.txd")));
        assert_eq!(sanitize("../radar.txd"), None);
        assert_eq!(sanitize("/etc/passwd"), None);
        assert_eq!(sanitize(""), None);
    }
}
