//! ZIP container tests: single-book `.fb2.zip` files and library archives.

use std::io::{Cursor, Write};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use fb2scan::archive::{self, ScanOptions};
use fb2scan::io::{ByteSource, FileSource, MemorySource};
use fb2scan::{Error, NullObserver, ParseOptions};
use tempfile::TempDir;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

fn book(title: &str) -> String {
    format!(
        "<FictionBook><description><title-info><book-title>{title}</book-title>\
         <author><first-name>Ann</first-name><last-name>Lee</last-name></author>\
         </title-info></description><body><p>{title} text</p></body></FictionBook>"
    )
}

fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (i, (name, data)) in entries.iter().enumerate() {
        if name.ends_with('/') {
            writer.add_directory(*name, stored).unwrap();
            continue;
        }
        let options = if i % 2 == 0 { stored } else { deflated };
        writer.start_file(*name, options).unwrap();
        writer.write_all(data.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn quiet_options() -> ScanOptions {
    ScanOptions {
        parse: ParseOptions::default().with_observer(Arc::new(NullObserver)),
        extract_covers: false,
    }
}

fn memory(data: Vec<u8>) -> Arc<dyn ByteSource> {
    Arc::new(MemorySource::new(data))
}

// ============================================================================
// Library Archives
// ============================================================================

#[test]
fn test_scan_continues_past_broken_entries() {
    let first = book("First");
    let third = book("Third");
    let data = build_zip(&[
        ("books/", ""),
        ("books/1.fb2", first.as_str()),
        ("books/2.fb2", "not a fictionbook at all"),
        ("books/readme.txt", "library notes"),
        ("books/3", third.as_str()),
    ]);
    let source = memory(data);
    assert!(archive::is_zip(source.as_ref()));

    let entries = archive::scan_archive(source, &quiet_options()).unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["books/1.fb2", "books/2.fb2", "books/3"]);

    let first = entries[0].result.as_ref().unwrap();
    assert_eq!(first.summary.title.as_deref(), Some("First"));
    assert_eq!(first.summary.body_sample, "First text");
    assert!(first.cover.is_none());

    assert!(matches!(entries[1].result, Err(Error::Structure(_))));

    let third = entries[2].result.as_ref().unwrap();
    assert_eq!(third.summary.title.as_deref(), Some("Third"));
    assert_eq!(entries[2].size, book("Third").len() as u64);
}

#[test]
fn test_scan_streams_entries_to_callback() {
    let a = book("A");
    let b = book("B");
    let data = build_zip(&[("a.fb2", a.as_str()), ("b.fb2", b.as_str())]);

    let mut titles = Vec::new();
    let scanned = archive::scan_archive_with(memory(data), &quiet_options(), |entry| {
        titles.push(entry.result.unwrap().summary.title.unwrap());
    })
    .unwrap();

    assert_eq!(scanned, 2);
    assert_eq!(titles, ["A", "B"]);
}

#[test]
fn test_scan_extracts_covers_when_asked() {
    let image: [u8; 6] = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
    let doc = format!(
        r##"<FictionBook xmlns:l="http://www.w3.org/1999/xlink"><description><title-info>
<book-title>Pictured</book-title><coverpage><image l:href="#c.jpg"/></coverpage>
</title-info></description><body><p>x</p></body>
<binary id="c.jpg" content-type="image/jpeg">{}</binary></FictionBook>"##,
        STANDARD.encode(image)
    );
    let data = build_zip(&[("pictured.fb2", doc.as_str())]);
    let options = ScanOptions {
        extract_covers: true,
        ..quiet_options()
    };

    let entries = archive::scan_archive(memory(data), &options).unwrap();
    let cover = entries[0].result.as_ref().unwrap().cover.as_ref().unwrap();
    assert_eq!(cover.data, image);
    assert_eq!(cover.media_type.as_deref(), Some("image/jpeg"));
}

#[test]
fn test_scan_rejects_non_zip() {
    let source = memory(book("Plain").into_bytes());
    assert!(!archive::is_zip(source.as_ref()));
    assert!(matches!(
        archive::scan_archive(source, &quiet_options()),
        Err(Error::Zip(_))
    ));
}

#[test]
fn test_scan_archive_on_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("library.zip");
    let one = book("On Disk");
    std::fs::write(&path, build_zip(&[("one.fb2", one.as_str())])).unwrap();

    let source: Arc<dyn ByteSource> = Arc::new(FileSource::open(&path).unwrap());
    let entries = archive::scan_archive(source, &quiet_options()).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].result.as_ref().unwrap().summary.title.as_deref(),
        Some("On Disk")
    );
}

// ============================================================================
// Single-book Containers
// ============================================================================

#[test]
fn test_open_fb2_zip_skips_other_files() {
    let single = book("Single");
    let data = build_zip(&[
        ("readme.txt", "about this book"),
        ("single.fb2", single.as_str()),
    ]);

    let options = ParseOptions::default().with_observer(Arc::new(NullObserver));
    let book = archive::open_fb2_zip(memory(data), options).unwrap();
    assert_eq!(book.title(), Some("Single"));
    assert_eq!(book.authors()[0].full_name(), "Ann Lee");
}

#[test]
fn test_open_fb2_zip_without_book() {
    let data = build_zip(&[("readme.txt", "nothing here")]);
    let result = archive::open_fb2_zip(memory(data), ParseOptions::default());
    assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
}
