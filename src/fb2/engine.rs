//! Metadata extraction engine.
//!
//! [`Fb2Parser`] owns one [`PathMatcher`] per metadata field and reacts to
//! start-tag, end-tag and character-data events. Every handler returns a
//! [`Flow`]; `Flow::Stop` ends the parse successfully once nothing more can
//! be learned from the rest of the document.

use std::fmt;

use super::matcher::{CoverMatcher, PathMatcher, TagPath};
use super::names::Attributes;
use super::observer::{ParseObserver, ParseStats};
use super::tokenizer;

const DESCRIPTION_TAG: &str = "description";
const BODY_TAG: &str = "body";
const AUTHOR_TAG: &str = "author";
const AUTHOR_PLACEHOLDER: &str = " ";

/// Metadata fields tracked by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    AuthorFirst,
    AuthorLast,
    Genre,
    Lang,
    BookTitle,
    Annotation,
    DocDate,
    Series,
}

impl Field {
    /// All fields, in dispatch order.
    pub const ALL: [Field; 8] = [
        Field::AuthorFirst,
        Field::AuthorLast,
        Field::Genre,
        Field::Lang,
        Field::BookTitle,
        Field::Annotation,
        Field::DocDate,
        Field::Series,
    ];

    pub fn path(self) -> &'static [&'static str] {
        match self {
            Field::AuthorFirst => &["description", "title-info", "author", "first-name"],
            Field::AuthorLast => &["description", "title-info", "author", "last-name"],
            Field::Genre => &["description", "title-info", "genre"],
            Field::Lang => &["description", "title-info", "lang"],
            Field::BookTitle => &["description", "title-info", "book-title"],
            Field::Annotation => &["description", "title-info", "annotation", "p"],
            Field::DocDate => &["description", "document-info", "date"],
            Field::Series => &["description", "title-info", "sequence"],
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

const COVER_REFERENCE_PATH: &[&str] = &["description", "title-info", "coverpage", "image"];
const COVER_BINARY_PATH: &[&str] = &["binary"];

/// What the engine is scanning for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Description fields and the body sample.
    #[default]
    Metadata,
    /// Additionally resolve the cover reference and capture its payload.
    Cover,
}

/// Result of one event handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop(StopReason),
}

/// Why a parse ended before the end of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The referenced cover binary has been fully read.
    CoverFound,
    /// The description closed without naming a cover image.
    NoCoverReference,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::CoverFound => f.write_str("cover found"),
            StopReason::NoCoverReference => f.write_str("no cover reference"),
        }
    }
}

/// How a call to [`Fb2Parser::parse`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The tokenizer reached the end of its input.
    Completed,
    /// The engine requested an early stop. This is a success.
    Stopped(StopReason),
    /// The tokenizer could not produce usable events; see [`Fb2Parser::error`].
    Failed,
}

impl ParseOutcome {
    pub fn is_success(self) -> bool {
        !matches!(self, ParseOutcome::Failed)
    }
}

/// Cover-mode matchers.
#[derive(Debug, Clone)]
struct CoverScan {
    reference: PathMatcher,
    binary: CoverMatcher,
}

/// Streaming FictionBook metadata extractor.
///
/// Event handlers expect names and attribute keys already normalized with
/// [`normalize_name`](super::normalize_name).
#[derive(Debug, Clone)]
pub struct Fb2Parser {
    mode: ParseMode,
    fields: Vec<PathMatcher>,
    cover: Option<CoverScan>,
    collecting_description: bool,
    in_body: bool,
    body_chunks: Vec<String>,
    error: Option<String>,
}

impl Fb2Parser {
    pub fn new(mode: ParseMode) -> Self {
        let fields = Field::ALL
            .iter()
            .map(|field| PathMatcher::new(TagPath::new(field.path())))
            .collect();

        let cover = (mode == ParseMode::Cover).then(|| CoverScan {
            reference: PathMatcher::new(TagPath::new(COVER_REFERENCE_PATH)),
            binary: CoverMatcher::new(TagPath::new(COVER_BINARY_PATH)),
        });

        Self {
            mode,
            fields,
            cover,
            collecting_description: true,
            in_body: false,
            body_chunks: Vec::new(),
            error: None,
        }
    }

    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    /// Return every matcher and the session state to their initial values.
    pub fn reset(&mut self) {
        self.collecting_description = true;
        self.in_body = false;
        self.body_chunks.clear();
        self.error = None;
        for matcher in &mut self.fields {
            matcher.reset();
        }
        if let Some(cover) = &mut self.cover {
            cover.reference.reset();
            cover.binary.reset();
        }
    }

    /// Reset, then tokenize `bytes` and feed every event to the engine.
    ///
    /// A fatal tokenizer failure is recorded rather than returned: the
    /// outcome is [`ParseOutcome::Failed`] and [`error`](Self::error) holds
    /// the message.
    pub fn parse(&mut self, bytes: &[u8], observer: &dyn ParseObserver) -> ParseOutcome {
        self.reset();

        let mut stats = ParseStats {
            bytes: bytes.len(),
            ..ParseStats::default()
        };
        let outcome = match tokenizer::drive(self, bytes, observer, &mut stats) {
            Ok(Flow::Continue) => ParseOutcome::Completed,
            Ok(Flow::Stop(reason)) => {
                observer.on_stop(reason);
                ParseOutcome::Stopped(reason)
            }
            Err(err) => {
                let message = err.to_string();
                observer.on_error(&format!("parsing error: {message}"));
                self.error = Some(message);
                ParseOutcome::Failed
            }
        };

        observer.on_finished(&stats);
        outcome
    }

    pub fn start(&mut self, name: &str, attributes: &Attributes) -> Flow {
        if name == BODY_TAG {
            self.in_body = true;
        }

        if self.collecting_description {
            for matcher in &mut self.fields {
                matcher.open(name, attributes);
            }

            if let Some(cover) = &mut self.cover
                && cover.reference.open(name, attributes)
            {
                cover.binary.set_target(cover.reference.attribute("href"));
            }
        }

        // Binaries normally follow the body, outside the description.
        if let Some(cover) = &mut self.cover {
            cover.binary.open(name, attributes);
        }

        Flow::Continue
    }

    pub fn end(&mut self, name: &str) -> Flow {
        if name == BODY_TAG {
            self.in_body = false;
        }

        if self.collecting_description {
            for matcher in &mut self.fields {
                matcher.close(name);
            }
            if let Some(cover) = &mut self.cover {
                cover.reference.close(name);
            }
        }

        if let Some(cover) = &mut self.cover {
            cover.binary.close(name);
            if cover.binary.is_found() {
                return Flow::Stop(StopReason::CoverFound);
            }
        }

        if name == AUTHOR_TAG {
            self.pair_author_names();
        }

        if name == DESCRIPTION_TAG {
            if let Some(cover) = &self.cover
                && !cover.binary.has_target()
            {
                return Flow::Stop(StopReason::NoCoverReference);
            }
            self.collecting_description = false;
        }

        Flow::Continue
    }

    pub fn data(&mut self, text: &str) -> Flow {
        if self.in_body {
            self.body_chunks.push(text.to_string());
        }

        if self.collecting_description {
            for matcher in &mut self.fields {
                matcher.set_text(text);
            }
            if let Some(cover) = &mut self.cover {
                cover.reference.set_text(text);
            }
        }

        if let Some(cover) = &mut self.cover {
            cover.binary.add_data(text);
        }

        Flow::Continue
    }

    /// End of input. Results are whatever has been accumulated.
    pub fn finish(&mut self) -> Flow {
        Flow::Continue
    }

    /// Keep given and family names aligned by author index: when an author
    /// element closes with only one of the two, the other list gets a blank.
    fn pair_author_names(&mut self) {
        let first = self.fields[Field::AuthorFirst.index()].values().len();
        let last = self.fields[Field::AuthorLast.index()].values().len();
        if last > first {
            self.fields[Field::AuthorFirst.index()].push_value(AUTHOR_PLACEHOLDER);
        } else if last < first {
            self.fields[Field::AuthorLast.index()].push_value(AUTHOR_PLACEHOLDER);
        }
    }

    pub fn field(&self, field: Field) -> &PathMatcher {
        &self.fields[field.index()]
    }

    /// The cover binary matcher; only present in [`ParseMode::Cover`].
    pub fn cover(&self) -> Option<&CoverMatcher> {
        self.cover.as_ref().map(|cover| &cover.binary)
    }

    pub fn is_collecting_description(&self) -> bool {
        self.collecting_description
    }

    pub fn in_body(&self) -> bool {
        self.in_body
    }

    /// Body text concatenated and trimmed.
    pub fn body_text(&self) -> String {
        self.body_chunks.concat().trim().to_string()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
