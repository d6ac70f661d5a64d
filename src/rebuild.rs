//! Full-archive regeneration
//!
//! Every mutation is committed by rebuilding the whole container from a
//! snapshot of the current bytes plus at most one pending change. The
//! replacement image is assembled completely off to the side and only
//! swapped over the live path once it is finished, so a failed rebuild
//! leaves the previous file intact.

use crate::archive::Archive;
use crate::entry::ArchiveEntry;
use crate::error::{ImgError, Result};
use crate::format::{self, BLOCK_SIZE, HEADER_SIZE, RECORD_SIZE};
use crate::types::{ArchiveMode, NameEncoding};
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, trace};

/// The single mutation a rebuild folds into the regenerated archive.
pub(crate) enum PendingChange {
    /// Replace the content of `name`, or append it when `is_new`.
    Write {
        name: String,
        is_new: bool,
        bytes: Vec<u8>,
    },
    /// Drop `name` (already lower-cased) from the directory.
    Remove { name: String },
}

/// One entry as re-parsed from the snapshot, in directory order.
struct SnapshotEntry {
    key: String,
    name: String,
    offset: u64,
    length: u64,
}

/// Where a planned entry's content comes from.
enum Content<'a> {
    Snapshot { offset: u64, length: u64 },
    Pending(&'a [u8]),
}

struct Planned<'a> {
    name: String,
    key: String,
    length_blocks: u64,
    content: Content<'a>,
}

/// Regenerate the archive's backing file around one pending change.
///
/// No-op in `Read` mode. On success the archive's store and entry table
/// are replaced wholesale; on failure the previous file is untouched and
/// the error is [`ImgError::Rebuild`].
pub(crate) fn rebuild(archive: &mut Archive, change: PendingChange) -> Result<()> {
    if archive.mode() == ArchiveMode::Read {
        return Ok(());
    }
    let encoding = archive.encoding();

    // Full snapshot of the live bytes, independent of any table mutation
    // already applied in memory.
    let snapshot = {
        let store = archive.store_mut()?;
        store.seek(SeekFrom::Start(0)).map_err(io_failed)?;
        let mut buf = Vec::new();
        store.read_to_end(&mut buf).map_err(io_failed)?;
        buf
    };

    // Re-parse the snapshot as an independent read-only view.
    let old = parse_snapshot(&snapshot, encoding)?;

    let (pending, remove_key) = match change {
        PendingChange::Write {
            name,
            is_new,
            bytes,
        } => {
            let key = name.trim().to_lowercase();
            (Some((name, key, is_new, bytes)), None)
        }
        PendingChange::Remove { name } => (None, Some(name)),
    };

    // Final entry set: snapshot order, with a removed name dropped and a
    // pending insert appended last.
    let mut planned: Vec<Planned> = Vec::with_capacity(old.len() + 1);
    for entry in &old {
        if remove_key.as_deref() == Some(entry.key.as_str()) {
            trace!("rebuild drops entry {}", entry.name);
            continue;
        }
        match &pending {
            Some((_, key, _, bytes)) if *key == entry.key => planned.push(Planned {
                name: entry.name.clone(),
                key: entry.key.clone(),
                length_blocks: format::blocks_for(bytes.len() as u64),
                content: Content::Pending(bytes.as_slice()),
            }),
            _ => planned.push(Planned {
                name: entry.name.clone(),
                key: entry.key.clone(),
                length_blocks: entry.length / BLOCK_SIZE,
                content: Content::Snapshot {
                    offset: entry.offset,
                    length: entry.length,
                },
            }),
        }
    }
    if let Some((name, key, is_new, bytes)) = &pending {
        if *is_new && !old.iter().any(|entry| &entry.key == key) {
            planned.push(Planned {
                name: name.clone(),
                key: key.clone(),
                length_blocks: format::blocks_for(bytes.len() as u64),
                content: Content::Pending(bytes.as_slice()),
            });
        }
    }

    if planned.len() > usize::from(u16::MAX) {
        return Err(ImgError::Rebuild(format!(
            "too many entries for the 16-bit count field: {}",
            planned.len()
        )));
    }

    // Fresh header and directory table, tracking each entry's new offset.
    let mut image = Vec::with_capacity(snapshot.len());
    image.extend_from_slice(&format::encode_header(planned.len() as u16));

    let mut cursor_blocks = format::directory_blocks(planned.len() as u32);
    let mut layout = Vec::with_capacity(planned.len());
    let mut entries = HashMap::with_capacity(planned.len());
    let mut order = Vec::with_capacity(planned.len());

    for plan in &planned {
        if plan.length_blocks > u64::from(u16::MAX) {
            return Err(ImgError::Rebuild(format!(
                "entry {} spans {} blocks, above the 16-bit limit",
                plan.name, plan.length_blocks
            )));
        }
        image.extend_from_slice(&format::encode_record(
            cursor_blocks as u32,
            plan.length_blocks as u16,
            &plan.name,
            encoding,
        ));
        let offset = cursor_blocks * BLOCK_SIZE;
        layout.push(offset);
        order.push(plan.key.clone());
        entries.insert(
            plan.key.clone(),
            ArchiveEntry::new(offset, plan.length_blocks * BLOCK_SIZE, plan.name.clone()),
        );
        cursor_blocks += plan.length_blocks;
    }

    // Content region: each entry at its block-aligned offset, zero-padded
    // to its capacity.
    for (plan, &offset) in planned.iter().zip(layout.iter()) {
        pad_to(&mut image, offset);
        match plan.content {
            Content::Pending(bytes) => image.extend_from_slice(bytes),
            Content::Snapshot {
                offset: source,
                length,
            } => {
                let start = source as usize;
                let end = start + length as usize;
                let slice = snapshot.get(start..end).ok_or_else(|| {
                    ImgError::Rebuild(format!(
                        "snapshot truncated: entry {} at {start}..{end} beyond {} bytes",
                        plan.name,
                        snapshot.len()
                    ))
                })?;
                image.extend_from_slice(slice);
            }
        }
        pad_to(&mut image, offset + plan.length_blocks * BLOCK_SIZE);
    }
    // Final block alignment of the whole file.
    pad_to(&mut image, cursor_blocks * BLOCK_SIZE);

    // Atomic swap: the image replaces the live file only once complete. The
    // temp file cleans itself up on every failure path.
    let dir = archive
        .path()
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_failed)?;
    tmp.write_all(&image).map_err(io_failed)?;
    tmp.flush().map_err(io_failed)?;
    let mut file = tmp.persist(archive.path()).map_err(|e| {
        ImgError::Rebuild(format!("failed to swap rebuilt archive into place: {e}"))
    })?;
    file.seek(SeekFrom::Start(0)).map_err(io_failed)?;

    debug!(
        "rebuilt archive {:?}: {} entries, {} bytes",
        archive.path(),
        planned.len(),
        image.len()
    );
    archive.replace_store(file, entries, order);
    Ok(())
}

fn parse_snapshot(snapshot: &[u8], encoding: NameEncoding) -> Result<Vec<SnapshotEntry>> {
    let count = format::decode_header(snapshot)
        .map_err(|e| ImgError::Rebuild(format!("snapshot re-parse failed: {e}")))?;
    let mut entries = Vec::with_capacity(count as usize);
    for i in 0..count as usize {
        let start = HEADER_SIZE + i * RECORD_SIZE;
        let raw = snapshot
            .get(start..start + RECORD_SIZE)
            .ok_or_else(|| ImgError::Rebuild(format!("snapshot truncated at record {i}")))?;
        let record = format::decode_record(raw, encoding)
            .map_err(|e| ImgError::Rebuild(format!("snapshot re-parse failed: {e}")))?;
        entries.push(SnapshotEntry {
            key: record.name.to_lowercase(),
            name: record.name,
            offset: u64::from(record.offset_blocks) * BLOCK_SIZE,
            length: u64::from(record.length_blocks) * BLOCK_SIZE,
        });
    }
    Ok(entries)
}

fn pad_to(image: &mut Vec<u8>, len: u64) {
    if (image.len() as u64) < len {
        image.resize(len as usize, 0);
    }
}

fn io_failed(e: std::io::Error) -> ImgError {
    ImgError::Rebuild(e.to_string())
}
