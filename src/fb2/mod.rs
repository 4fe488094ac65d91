//! FictionBook (FB2) metadata extraction.
//!
//! FB2 is a single XML file: a `<description>` with the bibliographic data,
//! one or more `<body>` sections, and `<binary>` elements carrying
//! base64-encoded images. Metadata is read in one streaming pass that never
//! builds a tree; the cover image is read by a second pass on demand.
//!
//! ```no_run
//! use fb2scan::Fb2Book;
//!
//! let book = Fb2Book::open("book.fb2")?;
//! println!("{:?} by {:?}", book.title(), book.authors());
//! if let Some(cover) = book.extract_cover() {
//!     std::fs::write("cover.jpg", cover)?;
//! }
//! # Ok::<(), fb2scan::Error>(())
//! ```

mod book;
mod engine;
mod matcher;
mod names;
mod observer;
mod tokenizer;

pub use book::{
    Author, COSMETIC_SYMBOLS, Cover, DocumentSummary, Fb2Book, ParseOptions, Series,
    trim_cosmetic,
};
pub use engine::{Fb2Parser, Field, Flow, ParseMode, ParseOutcome, StopReason};
pub use matcher::{CoverMatcher, PathMatcher, TagPath};
pub use names::{Attributes, normalize_name};
pub use observer::{LogObserver, NullObserver, ParseObserver, ParseStats};

/// Bytes inspected when sniffing the root element.
pub(crate) const ROOT_SNIFF_LEN: usize = 4096;

/// True when the document's first element is `<FictionBook>`, ignoring any
/// namespace prefix and case.
pub fn is_fictionbook(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(ROOT_SNIFF_LEN)];
    tokenizer::root_element(head).is_some_and(|root| root == "fictionbook")
}
