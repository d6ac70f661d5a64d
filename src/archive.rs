//! Archive sessions: the live view of one VER2 container file

use crate::entry::ArchiveEntry;
use crate::error::{ImgError, Result};
use crate::format::{self, BLOCK_SIZE, HEADER_SIZE, RECORD_SIZE};
use crate::rebuild::{self, PendingChange};
use crate::stream::EntryStream;
use crate::types::{ArchiveMode, NameEncoding};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Characters that disqualify a name from entry creation, besides control
/// characters. Names may contain `/` as a directory separator.
const INVALID_NAME_CHARS: [char; 4] = ['<', '>', '|', '"'];

/// A live session over one VER2 archive file.
///
/// The session exclusively owns the backing file and the entry table; it
/// has no internal locking, so concurrent use from multiple threads must be
/// serialized by the caller.
#[derive(Debug)]
pub struct Archive {
    path: PathBuf,
    store: Option<File>,
    mode: ArchiveMode,
    encoding: NameEncoding,
    entries: HashMap<String, ArchiveEntry>,
    /// Lower-cased keys in directory order.
    order: Vec<String>,
}

impl Archive {
    /// Open an archive at `path`.
    ///
    /// `Create` truncates (or creates) the file and writes an empty,
    /// one-block archive. `Read` and `Update` parse the existing directory
    /// up front and fail with [`ImgError::NotFound`] when the file is
    /// missing, or [`ImgError::Format`] when the header or any record does
    /// not decode; no partial archive is ever returned.
    pub fn open(
        path: impl AsRef<Path>,
        mode: ArchiveMode,
        encoding: NameEncoding,
    ) -> Result<Self> {
        let path = path.as_ref();
        match mode {
            ArchiveMode::Create => Self::create_at(path, encoding),
            ArchiveMode::Read | ArchiveMode::Update => Self::open_existing(path, mode, encoding),
        }
    }

    /// Create a fresh archive, truncating anything already at `path`.
    pub fn create(path: impl AsRef<Path>, encoding: NameEncoding) -> Result<Self> {
        Self::open(path, ArchiveMode::Create, encoding)
    }

    /// Open an existing archive read-only with the default encoding.
    pub fn open_read(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path, ArchiveMode::Read, NameEncoding::default())
    }

    fn create_at(path: &Path, encoding: NameEncoding) -> Result<Self> {
        debug!("creating archive at {:?}", path);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(&format::encode_header(0))?;
        // Even an empty archive occupies one full block.
        file.write_all(&[0u8; BLOCK_SIZE as usize - HEADER_SIZE])?;
        file.flush()?;
        Ok(Self {
            path: path.to_path_buf(),
            store: Some(file),
            mode: ArchiveMode::Create,
            encoding,
            entries: HashMap::new(),
            order: Vec::new(),
        })
    }

    fn open_existing(path: &Path, mode: ArchiveMode, encoding: NameEncoding) -> Result<Self> {
        if !path.exists() {
            return Err(ImgError::NotFound(path.to_path_buf()));
        }
        let mut file = match mode {
            ArchiveMode::Read => OpenOptions::new().read(true).open(path)?,
            _ => OpenOptions::new().read(true).write(true).open(path)?,
        };

        let mut header = [0u8; HEADER_SIZE];
        file.read_exact(&mut header)
            .map_err(|e| ImgError::Format(format!("truncated header: {e}")))?;
        let count = format::decode_header(&header)?;
        debug!("opening archive {:?}: {} entries", path, count);

        let table_len = u64::from(count) * RECORD_SIZE as u64;
        let file_len = file.metadata()?.len();
        if file_len < HEADER_SIZE as u64 + table_len {
            return Err(ImgError::Format(format!(
                "directory table truncated: {count} entries need {} bytes, file has {file_len}",
                HEADER_SIZE as u64 + table_len
            )));
        }

        let mut table = vec![0u8; table_len as usize];
        file.read_exact(&mut table)
            .map_err(|e| ImgError::Format(format!("truncated directory table: {e}")))?;

        let mut entries = HashMap::with_capacity(count as usize);
        let mut order = Vec::with_capacity(count as usize);
        for chunk in table.chunks_exact(RECORD_SIZE) {
            let record = format::decode_record(chunk, encoding)?;
            trace!(
                offset_blocks = record.offset_blocks,
                length_blocks = record.length_blocks,
                name = %record.name,
                "directory record"
            );
            let key = record.name.to_lowercase();
            let entry = ArchiveEntry::new(
                u64::from(record.offset_blocks) * BLOCK_SIZE,
                u64::from(record.length_blocks) * BLOCK_SIZE,
                record.name,
            );
            if entries.insert(key.clone(), entry).is_none() {
                order.push(key);
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            store: Some(file),
            mode,
            encoding,
            entries,
            order,
        })
    }

    /// Access mode of this session.
    pub fn mode(&self) -> ArchiveMode {
        self.mode
    }

    /// Text codec used for the name field.
    pub fn encoding(&self) -> NameEncoding {
        self.encoding
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries currently in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive lookup. Returns `None` for the empty name or when
    /// no such entry exists.
    pub fn entry(&self, name: &str) -> Option<&ArchiveEntry> {
        if name.is_empty() {
            return None;
        }
        self.entries.get(&name.to_lowercase())
    }

    /// Entries in directory order.
    pub fn entries(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.order.iter().filter_map(|key| self.entries.get(key))
    }

    /// Stage a new, empty entry named `name`.
    ///
    /// The name is trimmed first. A name containing an invalid character,
    /// or whose lower-cased form already exists, is skipped silently and
    /// returns `Ok(None)`. The new entry has no directory record until a
    /// stream opened on it is closed, which commits it through a rebuild.
    pub fn create_entry(&mut self, name: &str) -> Result<Option<&ArchiveEntry>> {
        let store_len = self.store()?.metadata()?.len();
        let trimmed = name.trim();
        if trimmed.is_empty()
            || trimmed
                .chars()
                .any(|c| c.is_control() || INVALID_NAME_CHARS.contains(&c))
        {
            trace!("skipping entry with invalid name: {:?}", name);
            return Ok(None);
        }
        let key = trimmed.to_lowercase();
        if self.entries.contains_key(&key) {
            trace!("skipping duplicate entry: {}", key);
            return Ok(None);
        }
        debug!("staging new entry {}", trimmed);
        self.entries
            .insert(key.clone(), ArchiveEntry::pending(store_len, trimmed.to_string()));
        self.order.push(key.clone());
        Ok(self.entries.get(&key))
    }

    /// Open a staging stream over `name`'s current content.
    ///
    /// The stream is pre-loaded with the entry's block-padded bytes, read
    /// from the backing store at the entry's offset, with the cursor reset
    /// to the start. Fails with [`ImgError::Unavailable`] when the entry
    /// does not exist or has been deleted.
    pub fn open_entry(&mut self, name: &str) -> Result<EntryStream> {
        if self.store.is_none() {
            return Err(ImgError::Closed);
        }
        let entry = self
            .entry(name)
            .filter(|e| e.is_available())
            .ok_or_else(|| ImgError::Unavailable(name.to_string()))?;
        let (offset, length, full_name, is_new) = (
            entry.offset(),
            entry.length(),
            entry.full_name().to_string(),
            entry.is_new(),
        );

        let mut content = vec![0u8; length as usize];
        if length > 0 {
            let store = self.store()?;
            store.seek(SeekFrom::Start(offset))?;
            store.read_exact(&mut content)?;
        }
        trace!("staged {} bytes for entry {}", content.len(), full_name);
        Ok(EntryStream::new(full_name, is_new, content))
    }

    /// Commit a staging stream back into the archive.
    ///
    /// In `Read` mode this is a pure no-op. Otherwise the stream's final
    /// bytes become the pending mutation for a synchronous full rebuild;
    /// the entry table is replaced with the rebuilt one before this
    /// returns. Taking the stream by value makes a second close
    /// unrepresentable.
    pub fn close_entry(&mut self, stream: EntryStream) -> Result<()> {
        if self.store.is_none() {
            return Err(ImgError::Closed);
        }
        if self.mode == ArchiveMode::Read {
            return Ok(());
        }
        let (name, is_new, bytes) = stream.into_parts();
        rebuild::rebuild(self, PendingChange::Write { name, is_new, bytes })
    }

    /// Delete `name` from the archive.
    ///
    /// The entry is removed from the table and marked unavailable, then a
    /// rebuild regenerates the file without it. Fails with
    /// [`ImgError::Unavailable`] when no such entry exists.
    pub fn delete_entry(&mut self, name: &str) -> Result<()> {
        if self.store.is_none() {
            return Err(ImgError::Closed);
        }
        let key = name.to_lowercase();
        let Some(mut entry) = self.entries.remove(&key) else {
            return Err(ImgError::Unavailable(name.to_string()));
        };
        entry.mark_unavailable();
        self.order.retain(|k| k != &key);
        debug!("deleting entry {}", entry.full_name());
        rebuild::rebuild(self, PendingChange::Remove { name: key })
    }

    /// Release the backing file.
    ///
    /// Idempotent; every later operation fails with [`ImgError::Closed`].
    pub fn close(&mut self) {
        if self.store.take().is_some() {
            debug!("closed archive {:?}", self.path);
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.store.is_none()
    }

    fn store(&mut self) -> Result<&mut File> {
        self.store.as_mut().ok_or(ImgError::Closed)
    }

    pub(crate) fn store_mut(&mut self) -> Result<&mut File> {
        self.store()
    }

    pub(crate) fn replace_store(
        &mut self,
        file: File,
        entries: HashMap<String, ArchiveEntry>,
        order: Vec<String>,
    ) {
        self.store = Some(file);
        self.entries = entries;
        self.order = order;
    }
}
