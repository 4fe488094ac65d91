//! Fixed-path recognizers driven by the parse engine.
//!
//! A [`PathMatcher`] tracks exactly one path such as
//! `description/title-info/genre`. It keeps a single cursor into the path
//! instead of a tag stack, so it only stays in sync when no unrelated element
//! with the same name as a tracked segment appears at a tracked depth. The
//! FictionBook schema never does that for the paths used here.

use std::fmt;

use super::names::{Attributes, normalize_name};

/// An ordered, non-empty sequence of normalized tag names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPath {
    segments: Box<[String]>,
}

impl TagPath {
    /// Build a path from its segments, normalizing each one.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let segments = segments
            .into_iter()
            .map(|s| normalize_name(s.as_ref()).into_owned())
            .filter(|s| !s.is_empty())
            .collect();
        Self { segments }
    }

    /// Parse a slash-separated path, e.g. `"description/title-info/lang"`.
    pub fn parse(path: &str) -> Self {
        Self::new(path.split('/'))
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(String::as_str)
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }
}

impl fmt::Display for TagPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Single-path depth automaton.
///
/// Each time the full path is entered the element's attributes are recorded,
/// and each time it is left the text seen inside it becomes one value.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    path: TagPath,
    /// Index of the deepest consumed segment; `None` means nothing matched.
    cursor: Option<usize>,
    current_attributes: Attributes,
    attribute_history: Vec<Attributes>,
    values: Vec<String>,
    pending: Option<String>,
}

impl PathMatcher {
    pub fn new(path: TagPath) -> Self {
        Self {
            path,
            cursor: None,
            current_attributes: Attributes::new(),
            attribute_history: Vec::new(),
            values: Vec::new(),
            pending: None,
        }
    }

    pub fn path(&self) -> &TagPath {
        &self.path
    }

    /// Number of consumed path segments.
    pub fn depth(&self) -> usize {
        self.cursor.map_or(0, |c| c + 1)
    }

    /// True while the cursor sits on the last segment.
    pub fn is_matched(&self) -> bool {
        !self.path.is_empty() && self.cursor == Some(self.path.len() - 1)
    }

    /// Feed an opening tag. Returns true when the full path is matched.
    ///
    /// Tags that do not extend the path leave the cursor where it is; the
    /// matcher never descends into unrelated subtrees.
    pub fn open(&mut self, tag: &str, attributes: &Attributes) -> bool {
        let next = self.depth();
        if self.path.segment(next) == Some(tag) {
            self.cursor = Some(next);
        }

        if self.is_matched() {
            self.current_attributes = attributes.clone();
            self.attribute_history.push(attributes.clone());
            true
        } else {
            false
        }
    }

    /// Feed a closing tag, retreating the cursor when it names the current
    /// segment and flushing any accumulated text as a trimmed value.
    pub fn close(&mut self, tag: &str) {
        let Some(cursor) = self.cursor else {
            return;
        };
        if self.path.segment(cursor) != Some(tag) {
            return;
        }

        self.cursor = cursor.checked_sub(1);
        if let Some(text) = self.pending.take() {
            self.values.push(text.trim().to_string());
        }
    }

    /// Accumulate character data while inside the fully matched element.
    pub fn set_text(&mut self, data: &str) {
        if self.is_matched() {
            self.pending.get_or_insert_with(String::new).push_str(data);
        }
    }

    /// Append a value directly, bypassing the automaton.
    pub fn push_value(&mut self, value: impl Into<String>) {
        self.values.push(value.into());
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn iter_values(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }

    pub fn first_value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    pub fn text(&self, separator: &str) -> String {
        self.values.join(separator)
    }

    /// Attributes of the most recent full match.
    pub fn attributes(&self) -> &Attributes {
        &self.current_attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.current_attributes.get(name).map(String::as_str)
    }

    /// Attributes of every full match, in document order.
    pub fn attribute_history(&self) -> &[Attributes] {
        &self.attribute_history
    }

    /// Values of one attribute across all matches that carry it.
    pub fn attribute_values(&self, name: &str) -> Vec<&str> {
        self.attribute_history
            .iter()
            .filter_map(|attrs| attrs.get(name).map(String::as_str))
            .collect()
    }

    pub fn reset(&mut self) {
        self.cursor = None;
        self.current_attributes.clear();
        self.attribute_history.clear();
        self.values.clear();
        self.pending = None;
    }
}

/// Path matcher that captures the base64 payload of one `<binary>` element.
///
/// The element to capture is chosen by [`set_target`](Self::set_target),
/// normally from the `coverpage/image` reference seen in the description.
#[derive(Debug, Clone)]
pub struct CoverMatcher {
    matcher: PathMatcher,
    target: String,
    inside: bool,
    found: bool,
    chunks: Vec<String>,
}

impl CoverMatcher {
    pub fn new(path: TagPath) -> Self {
        Self {
            matcher: PathMatcher::new(path),
            target: String::new(),
            inside: false,
            found: false,
            chunks: Vec::new(),
        }
    }

    /// Set the identifier to capture from a fragment reference like
    /// `#cover.jpg`. References that are empty or not fragments disable
    /// cover detection.
    pub fn set_target(&mut self, reference: Option<&str>) {
        self.target = match reference {
            Some(r) if r.starts_with('#') => r.trim_matches('#').to_lowercase(),
            _ => String::new(),
        };
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn has_target(&self) -> bool {
        !self.target.is_empty()
    }

    pub fn open(&mut self, tag: &str, attributes: &Attributes) -> bool {
        let matched = self.matcher.open(tag, attributes);
        if matched
            && self.has_target()
            && self
                .matcher
                .attribute("id")
                .is_some_and(|id| id.to_lowercase() == self.target)
        {
            self.inside = true;
        }
        matched
    }

    /// `found` becomes true the moment the target element closes, whether or
    /// not any data arrived.
    pub fn close(&mut self, tag: &str) {
        if self.inside {
            self.found = true;
            self.inside = false;
        }
        self.matcher.close(tag);
    }

    pub fn add_data(&mut self, chunk: &str) {
        if self.inside && chunk != "\n" {
            self.chunks.push(chunk.to_string());
        }
    }

    pub fn is_inside(&self) -> bool {
        self.inside
    }

    pub fn is_found(&self) -> bool {
        self.found
    }

    /// Accumulated base64 text.
    pub fn payload(&self) -> String {
        self.chunks.concat()
    }

    /// Attributes of the most recently matched element, e.g. `content-type`.
    pub fn attributes(&self) -> &Attributes {
        self.matcher.attributes()
    }

    pub fn matcher(&self) -> &PathMatcher {
        &self.matcher
    }

    pub fn reset(&mut self) {
        self.matcher.reset();
        self.target.clear();
        self.inside = false;
        self.found = false;
        self.chunks.clear();
    }
}
