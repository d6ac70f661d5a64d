//! Content staging for a single archive entry

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

/// Staging buffer bound to one entry.
///
/// On acquisition the buffer holds the entry's current block-padded bytes
/// with the cursor at the start. All reads, writes, and seeks go against
/// the buffer only; the archive file is untouched until the stream is
/// handed back through [`Archive::close_entry`], which consumes it, so a
/// stream cannot be committed twice.
///
/// [`Archive::close_entry`]: crate::archive::Archive::close_entry
#[derive(Debug)]
pub struct EntryStream {
    name: String,
    is_new: bool,
    buf: Cursor<Vec<u8>>,
}

impl EntryStream {
    pub(crate) fn new(name: String, is_new: bool, content: Vec<u8>) -> Self {
        Self {
            name,
            is_new,
            buf: Cursor::new(content),
        }
    }

    /// Full name of the entry this stream stages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current length of the staged content in bytes.
    pub fn len(&self) -> usize {
        self.buf.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.get_ref().is_empty()
    }

    /// Shorten the staged content to `len` bytes.
    ///
    /// Writes never shrink the buffer, so replacing an entry's content with
    /// something smaller needs an explicit truncate first.
    pub fn truncate(&mut self, len: usize) {
        self.buf.get_mut().truncate(len);
        let pos = self.buf.position().min(len as u64);
        self.buf.set_position(pos);
    }

    pub(crate) fn into_parts(self) -> (String, bool, Vec<u8>) {
        (self.name, self.is_new, self.buf.into_inner())
    }
}

impl Read for EntryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.buf.read(buf)
    }
}

impl Write for EntryStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.buf.flush()
    }
}

impl Seek for EntryStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.buf.seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_access_over_staged_bytes() {
        let mut stream = EntryStream::new("a.txt".to_string(), false, vec![1, 2, 3, 4]);
        let mut buf = [0u8; 2];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2]);

        stream.seek(SeekFrom::Start(1)).unwrap();
        stream.write_all(&[9, 9]).unwrap();

        let (name, is_new, bytes) = stream.into_parts();
        assert_eq!(name, "a.txt");
        assert!(!is_new);
        assert_eq!(bytes, vec![1, 9, 9, 4]);
    }

    #[test]
    fn writes_past_end_grow_the_buffer() {
        let mut stream = EntryStream::new("a.txt".to_string(), true, Vec::new());
        stream.write_all(&[7; 10]).unwrap();
        assert_eq!(stream.len(), 10);
    }

    #[test]
    fn truncate_clamps_cursor() {
        let mut stream = EntryStream::new("a.txt".to_string(), false, vec![0; 100]);
        stream.seek(SeekFrom::End(0)).unwrap();
        stream.truncate(10);
        assert_eq!(stream.len(), 10);
        assert_eq!(stream.stream_position().unwrap(), 10);
    }
}
