//! Shared types for archive sessions

/// How an archive session may access its backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMode {
    /// Existing archive, read-only; mutations never reach the disk.
    Read,
    /// Fresh archive, truncating whatever was at the path.
    Create,
    /// Existing archive, read-write.
    Update,
}

/// Text codec for the 24-byte name field of a directory record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NameEncoding {
    /// UTF-8; invalid sequences decode to replacement characters.
    #[default]
    Utf8,
    /// ISO 8859-1, one byte per character; characters outside the range
    /// encode as `?`.
    Latin1,
}

impl NameEncoding {
    /// Encode `name` into raw name-field bytes.
    pub fn encode(self, name: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => name.as_bytes().to_vec(),
            Self::Latin1 => name
                .chars()
                .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
                .collect(),
        }
    }

    /// Decode raw name-field bytes (already stripped of zero padding).
    pub fn decode(self, raw: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(raw).into_owned(),
            Self::Latin1 => raw.iter().map(|&b| b as char).collect(),
        }
    }
}
