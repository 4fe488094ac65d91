//! ZIP containers of FictionBook documents.
//!
//! Handles both `.fb2.zip` files holding a single book and library archives
//! holding thousands. Each entry is decompressed into memory and scanned on
//! its own; a broken entry is recorded and scanning moves on.

use std::io::{self, Read};
use std::sync::Arc;

use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::fb2::{Cover, DocumentSummary, Fb2Book, ParseOptions, ROOT_SNIFF_LEN, is_fictionbook};
use crate::io::{ByteSource, ByteSourceCursor, MemorySource};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Options for scanning archive entries.
#[derive(Clone, Default)]
pub struct ScanOptions {
    pub parse: ParseOptions,
    /// Run the cover pass for every book.
    pub extract_covers: bool,
}

/// Metadata (and optionally the cover) of one archived book.
#[derive(Debug, Clone)]
pub struct ScannedBook {
    pub summary: DocumentSummary,
    pub cover: Option<Cover>,
}

/// Outcome of scanning one archive entry.
#[derive(Debug)]
pub struct ArchiveEntry {
    /// Path of the entry inside the archive.
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    pub result: Result<ScannedBook>,
}

/// True when the source starts with a ZIP local file header.
pub fn is_zip(source: &dyn ByteSource) -> bool {
    source
        .read_head(Some(ZIP_MAGIC.len() as u64))
        .is_ok_and(|head| head == ZIP_MAGIC)
}

/// Scan every FictionBook entry, handing each result to `on_entry` as soon
/// as it is ready. Returns the number of entries scanned.
///
/// Entries named `*.fb2` are always scanned; others only when their root
/// element is `<FictionBook>`.
pub fn scan_archive_with<F>(
    source: Arc<dyn ByteSource>,
    options: &ScanOptions,
    mut on_entry: F,
) -> Result<usize>
where
    F: FnMut(ArchiveEntry),
{
    let mut archive = ZipArchive::new(ByteSourceCursor::new(source))?;
    let mut scanned = 0;

    for i in 0..archive.len() {
        let (name, size, data) = {
            let mut file = match archive.by_index(i) {
                Ok(file) => file,
                Err(err) => {
                    log::warn!("skipping unreadable archive entry #{i}: {err}");
                    continue;
                }
            };
            if file.is_dir() {
                continue;
            }

            let name = file.name().to_string();
            let size = file.size();
            let data = read_fictionbook(&mut file, size, has_fb2_extension(&name));
            (name, size, data)
        };

        let result = match data {
            Ok(Some(data)) => scan_book(data, options),
            Ok(None) => {
                log::debug!("skipping non-FictionBook entry {name}");
                continue;
            }
            Err(err) => Err(Error::Io(err)),
        };

        if let Err(err) = &result {
            log::warn!("failed to scan {name}: {err}");
        }
        scanned += 1;
        on_entry(ArchiveEntry { name, size, result });
    }

    Ok(scanned)
}

/// Scan every FictionBook entry and collect the results.
pub fn scan_archive(source: Arc<dyn ByteSource>, options: &ScanOptions) -> Result<Vec<ArchiveEntry>> {
    let mut entries = Vec::new();
    scan_archive_with(source, options, |entry| entries.push(entry))?;
    Ok(entries)
}

/// Open the first FictionBook document inside a `.fb2.zip` container.
pub fn open_fb2_zip(source: Arc<dyn ByteSource>, options: ParseOptions) -> Result<Fb2Book> {
    let mut archive = ZipArchive::new(ByteSourceCursor::new(source))?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let named_fb2 = has_fb2_extension(file.name());
        let size = file.size();
        if let Some(data) = read_fictionbook(&mut file, size, named_fb2)? {
            return Fb2Book::from_source_with_options(Arc::new(MemorySource::new(data)), options);
        }
    }

    Err(Error::UnsupportedFormat(
        "no FictionBook document in ZIP archive".to_string(),
    ))
}

fn scan_book(data: Vec<u8>, options: &ScanOptions) -> Result<ScannedBook> {
    let book = Fb2Book::from_source_with_options(
        Arc::new(MemorySource::new(data)),
        options.parse.clone(),
    )?;
    let cover = if options.extract_covers {
        book.extract_cover_with_type()
    } else {
        None
    };
    Ok(ScannedBook {
        summary: book.into_summary(),
        cover,
    })
}

/// Read an archive entry if it holds a FictionBook document. Entries not
/// named `*.fb2` are sniffed from their first bytes and only read in full
/// when the root element matches.
fn read_fictionbook<R: Read>(
    entry: &mut R,
    size: u64,
    named_fb2: bool,
) -> io::Result<Option<Vec<u8>>> {
    let mut data = Vec::new();
    if !named_fb2 {
        entry
            .by_ref()
            .take(ROOT_SNIFF_LEN as u64)
            .read_to_end(&mut data)?;
        if !is_fictionbook(&data) {
            return Ok(None);
        }
    }
    let remaining = size.saturating_sub(data.len() as u64).min(64 << 20);
    data.reserve(remaining as usize);
    entry.read_to_end(&mut data)?;
    Ok(Some(data))
}

fn has_fb2_extension(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("fb2"))
}
