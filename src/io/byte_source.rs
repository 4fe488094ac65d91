use std::fs::File;
use std::io;
#[cfg(all(not(unix), not(windows)))]
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// A thread-safe, random-access source of document bytes.
///
/// Reads are positioned and never move a shared cursor, so the metadata pass
/// and the cover pass over one document can run on different threads.
pub trait ByteSource: Send + Sync {
    /// Returns the total length of the source.
    fn len(&self) -> u64;

    /// Returns true if the source is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads bytes starting at `offset` into the provided buffer.
    /// Returns the number of bytes read (must be exactly `buf.len()` or error).
    fn read_at_into(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Reads exactly `len` bytes starting at `offset`.
    fn read_at(&self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let read = self.read_at_into(offset, &mut buf)?;
        if read != len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "not enough data",
            ));
        }
        Ok(buf)
    }

    /// Reads the leading `limit` bytes, or the whole source when `limit` is
    /// `None` or larger than the source.
    fn read_head(&self, limit: Option<u64>) -> io::Result<Vec<u8>> {
        let len = limit.map_or(self.len(), |limit| limit.min(self.len()));
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "source too large"))?;
        self.read_at(0, len)
    }
}

// --- Implementation: Local File ---

pub struct FileSource {
    file: File,
    len: u64,
}

impl FileSource {
    pub fn new(file: File) -> io::Result<Self> {
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }

    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::new(File::open(path)?)
    }
}

#[cfg(unix)]
impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at_into(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        use std::os::unix::fs::FileExt;
        self.file.read_exact_at(buf, offset)?;
        Ok(buf.len())
    }
}

#[cfg(windows)]
impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at_into(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        use std::os::windows::fs::FileExt;
        let mut filled = 0;
        while filled < buf.len() {
            let read = self.file.seek_read(&mut buf[filled..], offset + filled as u64)?;
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "not enough data",
                ));
            }
            filled += read;
        }
        Ok(filled)
    }
}

#[cfg(all(not(unix), not(windows)))]
impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at_into(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut file_clone = self.file.try_clone()?;
        file_clone.seek(SeekFrom::Start(offset))?;
        file_clone.read_exact(buf)?;
        Ok(buf.len())
    }
}

// --- Implementation: In-Memory ---

/// An in-memory ByteSource backed by a `Vec<u8>`.
///
/// Archive entries are decompressed into one of these before scanning.
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl From<Vec<u8>> for MemorySource {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl ByteSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at_into(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let end = offset.checked_add(buf.len()).unwrap_or(usize::MAX);
        match self.data.get(offset..end) {
            Some(slice) => {
                buf.copy_from_slice(slice);
                Ok(buf.len())
            }
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of document",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_memory_source_read_at() {
        let source = MemorySource::new(b"<FictionBook/>".to_vec());
        assert_eq!(source.read_at(1, 11).unwrap(), b"FictionBook");
        assert!(source.read_at(10, 10).is_err());
    }

    #[test]
    fn test_read_head_limits() {
        let source = MemorySource::new(b"0123456789".to_vec());
        assert_eq!(source.read_head(Some(4)).unwrap(), b"0123");
        assert_eq!(source.read_head(Some(400)).unwrap(), b"0123456789");
        assert_eq!(source.read_head(None).unwrap(), b"0123456789");
        assert_eq!(source.read_head(Some(0)).unwrap(), b"");
    }

    #[test]
    fn test_file_source_positioned_reads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"<description/><body/>").unwrap();
        file.flush().unwrap();

        let source = FileSource::open(file.path()).unwrap();
        assert_eq!(source.len(), 21);
        assert_eq!(source.read_at(14, 7).unwrap(), b"<body/>");
        // Positioned reads never disturb each other.
        assert_eq!(source.read_head(Some(14)).unwrap(), b"<description/>");
    }
}
