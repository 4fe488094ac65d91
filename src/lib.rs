//! # fb2scan
//!
//! Streaming metadata extraction for FictionBook (FB2) ebooks.
//!
//! ## Features
//!
//! - Title, authors, genres, series, language, date and annotation from the
//!   `<description>` section, without building a document tree
//! - A plain-text sample of the `<body>`, for language detection and similar
//!   heuristics
//! - Cover image extraction from the referenced `<binary>` element
//! - Tolerant of malformed markup and truncated input; honours the encoding
//!   named in the XML declaration
//! - Scanning of `.fb2.zip` files and whole library archives
//!
//! ## Quick Start
//!
//! ```no_run
//! use fb2scan::Fb2Book;
//!
//! let book = Fb2Book::open("book.fb2").unwrap();
//! let summary = book.summary();
//! println!("Title: {:?}", summary.title);
//! for author in &summary.authors {
//!     println!("Author: {}", author.full_name());
//! }
//! let cover: Option<Vec<u8>> = book.extract_cover();
//! ```
//!
//! ## Reading only the header
//!
//! Metadata lives at the start of the document, so very large files can be
//! scanned from a bounded prefix:
//!
//! ```
//! use std::sync::Arc;
//! use fb2scan::{Fb2Book, ParseOptions};
//! use fb2scan::io::MemorySource;
//!
//! let doc = br#"<FictionBook><description><title-info>
//!   <book-title>Sample</book-title>
//! </title-info></description><body><p>...</p></body></FictionBook>"#;
//!
//! let options = ParseOptions::default().with_header_limit(96);
//! let book = Fb2Book::from_source_with_options(Arc::new(MemorySource::new(doc.to_vec())), options)?;
//! assert_eq!(book.title(), Some("Sample"));
//! # Ok::<(), fb2scan::Error>(())
//! ```

pub mod archive;
pub mod error;
pub mod fb2;
pub mod io;
pub mod util;

pub use error::{Error, Result};
pub use fb2::{
    Author, Cover, DocumentSummary, Fb2Book, Fb2Parser, LogObserver, NullObserver, ParseMode,
    ParseObserver, ParseOptions, ParseOutcome, Series, StopReason, is_fictionbook,
};
