//! FictionBook metadata facade.

use std::path::Path;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use super::engine::{Fb2Parser, Field, ParseMode, ParseOutcome};
use super::observer::{LogObserver, ParseObserver};
use crate::error::{Error, Result};
use crate::io::{ByteSource, FileSource, MemorySource};
use crate::util::detect_mime_type;

/// Characters stripped from both ends of titles, names and similar values.
pub const COSMETIC_SYMBOLS: &[char] = &[
    ' ', '»', '«', '\'', '"', '&', '\n', '\r', '\t', '-', '.', '#', '\\', '`',
];

/// Trim [`COSMETIC_SYMBOLS`] from both ends of `value`.
pub fn trim_cosmetic(value: &str) -> &str {
    value.trim_matches(COSMETIC_SYMBOLS)
}

/// One author, given and family name paired by position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Author {
    pub first_name: String,
    pub last_name: String,
}

impl Author {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// `"First Last"`, or just the family name when the given name is blank.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// `"Last First"`, the order used by library catalogs.
    pub fn catalog_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
            .trim()
            .to_string()
    }
}

/// Series membership from `<sequence name=".." number="..">`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Series {
    pub title: String,
    /// Position in the series; 0 when missing or not a number.
    pub index: u32,
}

/// Metadata extracted from one FictionBook document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct DocumentSummary {
    pub title: Option<String>,
    pub authors: Vec<Author>,
    /// Genre codes, lower-cased.
    pub tags: Vec<String>,
    pub series: Option<Series>,
    pub language: Option<String>,
    pub date: Option<String>,
    /// Annotation paragraphs joined by newlines.
    pub description: Option<String>,
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "String::is_empty"))]
    pub body_sample: String,
}

impl DocumentSummary {
    /// Build a summary from a finished metadata parse.
    pub fn from_parser(parser: &Fb2Parser) -> Self {
        Self {
            title: detect_title(parser),
            authors: detect_authors(parser),
            tags: detect_tags(parser),
            series: detect_series(parser),
            language: detect_language(parser),
            date: detect_date(parser),
            description: detect_description(parser),
            body_sample: parser.body_text(),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn detect_title(parser: &Fb2Parser) -> Option<String> {
    parser
        .field(Field::BookTitle)
        .first_value()
        .and_then(|title| non_empty(trim_cosmetic(title)))
}

fn detect_authors(parser: &Fb2Parser) -> Vec<Author> {
    let first_names = parser.field(Field::AuthorFirst).values();
    parser
        .field(Field::AuthorLast)
        .iter_values()
        .enumerate()
        .filter_map(|(idx, last_name)| {
            let last_name = trim_cosmetic(last_name);
            if last_name.is_empty() {
                return None;
            }
            let first_name = first_names.get(idx).map_or("", |name| trim_cosmetic(name));
            Some(Author::new(first_name, last_name))
        })
        .collect()
}

fn detect_tags(parser: &Fb2Parser) -> Vec<String> {
    parser
        .field(Field::Genre)
        .iter_values()
        .map(|genre| trim_cosmetic(&genre.to_lowercase()).to_string())
        .filter(|genre| !genre.is_empty())
        .collect()
}

fn detect_series(parser: &Fb2Parser) -> Option<Series> {
    let attrs = parser.field(Field::Series).attribute_history().first()?;
    let title = attrs.get("name").and_then(|name| non_empty(trim_cosmetic(name)))?;
    let index = attrs
        .get("number")
        .map(|number| trim_cosmetic(number))
        .filter(|number| !number.is_empty() && number.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|number| number.parse().ok())
        .unwrap_or(0);
    Some(Series { title, index })
}

fn detect_language(parser: &Fb2Parser) -> Option<String> {
    parser
        .field(Field::Lang)
        .first_value()
        .and_then(|lang| non_empty(trim_cosmetic(lang)))
}

fn detect_date(parser: &Fb2Parser) -> Option<String> {
    let date = parser.field(Field::DocDate);
    date.attribute("value")
        .and_then(|value| non_empty(value.trim()))
        .or_else(|| date.first_value().and_then(|text| non_empty(text.trim())))
}

fn detect_description(parser: &Fb2Parser) -> Option<String> {
    let annotation = parser.field(Field::Annotation);
    (!annotation.values().is_empty()).then(|| annotation.text("\n"))
}

/// Options for the metadata pass.
#[derive(Clone)]
pub struct ParseOptions {
    /// Scan only the first N bytes of the source for metadata. `Some(0)`
    /// reads the whole source, like `None`.
    pub header_limit: Option<u64>,
    pub observer: Arc<dyn ParseObserver>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            header_limit: None,
            observer: Arc::new(LogObserver),
        }
    }
}

impl ParseOptions {
    pub fn with_header_limit(mut self, limit: u64) -> Self {
        self.header_limit = Some(limit);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ParseObserver>) -> Self {
        self.observer = observer;
        self
    }
}

/// Decoded cover image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cover {
    pub data: Vec<u8>,
    /// `content-type` of the `<binary>` element, else sniffed from the bytes.
    pub media_type: Option<String>,
}

/// A FictionBook document whose metadata has been read.
///
/// Construction runs the metadata pass. The cover is read on demand by a
/// second, independent pass over the same source.
pub struct Fb2Book {
    source: Arc<dyn ByteSource>,
    observer: Arc<dyn ParseObserver>,
    summary: DocumentSummary,
}

impl Fb2Book {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_source(Arc::new(FileSource::open(path)?))
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_source(Arc::new(MemorySource::new(data)))
    }

    pub fn from_source(source: Arc<dyn ByteSource>) -> Result<Self> {
        Self::from_source_with_options(source, ParseOptions::default())
    }

    pub fn from_source_with_options(
        source: Arc<dyn ByteSource>,
        options: ParseOptions,
    ) -> Result<Self> {
        let limit = options.header_limit.filter(|&limit| limit > 0);
        let bytes = source.read_head(limit)?;
        let mut parser = Fb2Parser::new(ParseMode::Metadata);
        if parser.parse(&bytes, options.observer.as_ref()) == ParseOutcome::Failed {
            let message = parser.error().unwrap_or("unknown tokenizer failure");
            return Err(Error::Structure(message.to_string()));
        }

        Ok(Self {
            source,
            observer: options.observer,
            summary: DocumentSummary::from_parser(&parser),
        })
    }

    pub fn summary(&self) -> &DocumentSummary {
        &self.summary
    }

    pub fn into_summary(self) -> DocumentSummary {
        self.summary
    }

    pub fn title(&self) -> Option<&str> {
        self.summary.title.as_deref()
    }

    pub fn authors(&self) -> &[Author] {
        &self.summary.authors
    }

    pub fn tags(&self) -> &[String] {
        &self.summary.tags
    }

    pub fn series(&self) -> Option<&Series> {
        self.summary.series.as_ref()
    }

    pub fn language(&self) -> Option<&str> {
        self.summary.language.as_deref()
    }

    pub fn date(&self) -> Option<&str> {
        self.summary.date.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.summary.description.as_deref()
    }

    pub fn body_sample(&self) -> &str {
        &self.summary.body_sample
    }

    /// Re-read the whole source in cover mode and decode the cover image.
    ///
    /// Missing covers, I/O failures and undecodable payloads all yield
    /// `None`; failures are reported to the observer.
    pub fn extract_cover(&self) -> Option<Vec<u8>> {
        self.extract_cover_with_type().map(|cover| cover.data)
    }

    pub fn extract_cover_with_type(&self) -> Option<Cover> {
        let bytes = match self.source.read_head(None) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.observer
                    .on_error(&format!("failed to read source for cover: {err}"));
                return None;
            }
        };

        let mut parser = Fb2Parser::new(ParseMode::Cover);
        parser.parse(&bytes, self.observer.as_ref());
        let cover = parser.cover()?;
        let payload = cover.payload();
        if payload.is_empty() {
            return None;
        }

        match decode_base64(&payload) {
            Ok(data) => {
                let media_type = cover
                    .attributes()
                    .get("content-type")
                    .map(|ct| ct.trim().to_string())
                    .filter(|ct| !ct.is_empty())
                    .or_else(|| detect_mime_type(&data).map(str::to_string));
                Some(Cover { data, media_type })
            }
            Err(err) => {
                self.observer
                    .on_error(&format!("failed to decode cover image: {err}"));
                None
            }
        }
    }
}

/// Decode a base64 payload, ignoring embedded whitespace.
pub(crate) fn decode_base64(payload: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let compact: Vec<u8> = payload
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD.decode(compact)
}
