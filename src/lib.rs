//! IMG (VER2) archive container for RenderWare-era game file storage
//!
//! Packs many named byte blobs into one block-aligned file: an 8-byte
//! header, a contiguous table of 32-byte directory records, and content
//! regions aligned to 2048-byte blocks. Every mutation is committed by
//! regenerating the whole file from a snapshot of the current bytes plus
//! the single pending change, so the on-disk layout stays byte-exact
//! across incremental edits.

pub mod archive;
pub mod bulk;
pub mod entry;
pub mod error;
pub mod format;
mod rebuild;
pub mod stream;
pub mod types;

pub use archive::Archive;
pub use bulk::{create_archive_from_directory, extract_archive_to_directory};
pub use entry::ArchiveEntry;
pub use error::{ImgError, Result};
pub use format::BLOCK_SIZE;
pub use stream::EntryStream;
pub use types::{ArchiveMode, NameEncoding};
