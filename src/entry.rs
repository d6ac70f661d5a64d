//! In-memory directory entries

/// A named blob inside the archive: one directory record plus runtime flags.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    offset: u64,
    length: u64,
    full_name: String,
    is_new: bool,
    is_available: bool,
}

impl ArchiveEntry {
    /// Entry backed by an existing directory record.
    pub(crate) fn new(offset: u64, length: u64, full_name: String) -> Self {
        Self {
            offset,
            length,
            full_name,
            is_new: false,
            is_available: true,
        }
    }

    /// Freshly created entry with no directory record yet.
    pub(crate) fn pending(offset: u64, full_name: String) -> Self {
        Self {
            offset,
            length: 0,
            full_name,
            is_new: true,
            is_available: true,
        }
    }

    pub(crate) fn mark_unavailable(&mut self) {
        self.is_available = false;
    }

    /// Byte offset of the entry's content within the archive.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Block-padded capacity of the entry in bytes, not the exact content
    /// length. The format does not record the latter.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Full name with original casing, `/`-separated.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Final path component of the full name.
    pub fn name(&self) -> &str {
        self.full_name.rsplit('/').next().unwrap_or_default()
    }

    /// Whether the entry was created in this session and has no directory
    /// record yet.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// False once the entry has been deleted.
    pub fn is_available(&self) -> bool {
        self.is_available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_last_component() {
        let entry = ArchiveEntry::new(2048, 2048, "models/generic/fence.dff".to_string());
        assert_eq!(entry.name(), "fence.dff");
        assert_eq!(entry.full_name(), "models/generic/fence.dff");

        let flat = ArchiveEntry::new(0, 0, "radar.txd".to_string());
        assert_eq!(flat.name(), "radar.txd");
    }

    #[test]
    fn pending_entries_are_flagged() {
        let entry = ArchiveEntry::pending(4096, "new.ipl".to_string());
        assert!(entry.is_new());
        assert!(entry.is_available());
        assert_eq!(entry.length(), 0);
    }
}
