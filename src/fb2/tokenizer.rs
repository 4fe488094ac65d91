//! Tolerant event source for the engine.
//!
//! Decodes the raw document, runs quick-xml over it with end-name checks
//! disabled, and feeds normalized start/end/text events to [`Fb2Parser`].
//! Ill-formed constructs are skipped with a warning. Any other tokenizer
//! error after the first element is treated as a truncated document: the
//! parse ends there and keeps what it collected.

use std::borrow::Cow;

use encoding_rs::Encoding;
use memchr::memmem;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

use super::engine::{Fb2Parser, Flow};
use super::names::{Attributes, normalize_name_bytes};
use super::observer::{NullObserver, ParseObserver, ParseStats};

/// Failures that leave the tokenizer with nothing usable.
#[derive(Debug, Error)]
pub(crate) enum TokenizeError {
    #[error("{0}")]
    Xml(quick_xml::Error),

    #[error("document contains no elements")]
    NoElements,
}

/// Tokenize `bytes` and dispatch every event to `parser` until the input
/// ends or the engine asks to stop.
pub(crate) fn drive(
    parser: &mut Fb2Parser,
    bytes: &[u8],
    observer: &dyn ParseObserver,
    stats: &mut ParseStats,
) -> Result<Flow, TokenizeError> {
    let text = decode_document(bytes, observer);
    let text = normalize_line_ends(text);
    let text = escape_stray_angles(text, observer);
    let mut reader = Reader::from_str(&text);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.allow_dangling_amp = true;
    config.check_comments = false;

    let mut last_error_at = None;
    loop {
        let flow = match reader.read_event() {
            Ok(Event::Start(e)) => {
                stats.elements += 1;
                let name = normalize_name_bytes(e.name().as_ref());
                parser.start(&name, &collect_attributes(&e, observer))
            }
            Ok(Event::Empty(e)) => {
                stats.elements += 1;
                let name = normalize_name_bytes(e.name().as_ref());
                match parser.start(&name, &collect_attributes(&e, observer)) {
                    Flow::Continue => parser.end(&name),
                    stop => stop,
                }
            }
            Ok(Event::End(e)) => parser.end(&normalize_name_bytes(e.name().as_ref())),
            Ok(Event::Text(e)) => {
                stats.text_events += 1;
                parser.data(&String::from_utf8_lossy(e.as_ref()))
            }
            Ok(Event::CData(e)) => {
                stats.text_events += 1;
                parser.data(&String::from_utf8_lossy(&e))
            }
            Ok(Event::GeneralRef(e)) => {
                stats.text_events += 1;
                let entity = String::from_utf8_lossy(e.as_ref());
                match resolve_entity(&entity) {
                    Some(resolved) => parser.data(&resolved),
                    None => {
                        observer.on_warning(&format!("unknown entity &{entity}; kept as text"));
                        parser.data(&format!("&{entity};"))
                    }
                }
            }
            Ok(Event::Eof) => {
                if stats.elements == 0 {
                    return Err(TokenizeError::NoElements);
                }
                return Ok(parser.finish());
            }
            // Ill-formed constructs are consumed whole; the reader can go on
            // as long as it keeps advancing.
            Err(err @ quick_xml::Error::IllFormed(_))
                if last_error_at != Some(reader.buffer_position()) =>
            {
                last_error_at = Some(reader.buffer_position());
                observer.on_warning(&format!(
                    "skipped ill-formed markup at byte {}: {err}",
                    reader.error_position()
                ));
                Flow::Continue
            }
            Err(err) => {
                if stats.elements == 0 {
                    return Err(TokenizeError::Xml(err));
                }
                observer.on_warning(&format!(
                    "markup recovery stopped at byte {}: {err}",
                    reader.error_position()
                ));
                return Ok(parser.finish());
            }
            Ok(_) => Flow::Continue,
        };

        if let Flow::Stop(_) = flow {
            return Ok(flow);
        }
    }
}

/// Normalized name of the first element in the document, if any.
pub(crate) fn root_element(bytes: &[u8]) -> Option<String> {
    let text = decode_document(bytes, &NullObserver);
    let mut reader = Reader::from_str(&text);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(normalize_name_bytes(e.name().as_ref()));
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

fn collect_attributes(start: &BytesStart<'_>, observer: &dyn ParseObserver) -> Attributes {
    let mut attributes = Attributes::new();
    for attr in start.attributes().with_checks(false) {
        match attr {
            Ok(attr) => {
                let key = normalize_name_bytes(attr.key.as_ref());
                let raw = String::from_utf8_lossy(attr.value.as_ref());
                attributes.insert(key, unescape_attribute(&raw).into_owned());
            }
            Err(err) => observer.on_warning(&format!("skipping malformed attribute: {err}")),
        }
    }
    attributes
}

/// Decode document bytes to text.
///
/// A byte-order mark wins, then the encoding named in the XML declaration,
/// then UTF-8. Undecodable sequences are replaced and reported.
pub(crate) fn decode_document<'a>(bytes: &'a [u8], observer: &dyn ParseObserver) -> Cow<'a, str> {
    let encoding = extract_xml_encoding(bytes)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .map_or(encoding_rs::UTF_8, Encoding::output_encoding);

    let (text, used, malformed) = encoding.decode(bytes);
    if malformed {
        observer.on_warning(&format!(
            "replaced malformed {} byte sequences",
            used.name()
        ));
    }
    text
}

/// Translate `\r\n` and lone `\r` to `\n`, as an XML processor does before
/// parsing.
pub(crate) fn normalize_line_ends(text: Cow<'_, str>) -> Cow<'_, str> {
    if !text.contains('\r') {
        return text;
    }
    Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Escape `<` characters that cannot open markup (`a < b`, `<<`, `< 3`) so
/// the reader keeps them as text instead of swallowing the next tag.
pub(crate) fn escape_stray_angles<'a>(
    text: Cow<'a, str>,
    observer: &dyn ParseObserver,
) -> Cow<'a, str> {
    let bytes = text.as_bytes();
    let is_stray = |pos: usize| bytes.get(pos + 1).is_some_and(|&next| !opens_markup(next));
    if !memchr::memchr_iter(b'<', bytes).any(is_stray) {
        return text;
    }

    let mut out = String::with_capacity(text.len() + 16);
    let mut escaped = 0usize;
    let mut copied = 0;
    for pos in memchr::memchr_iter(b'<', bytes).filter(|&pos| is_stray(pos)) {
        out.push_str(&text[copied..pos]);
        out.push_str("&lt;");
        copied = pos + 1;
        escaped += 1;
    }
    out.push_str(&text[copied..]);
    observer.on_warning(&format!("escaped {escaped} stray '<' characters in text"));
    Cow::Owned(out)
}

/// Bytes that may follow `<` in markup: a name start, `/`, `!` or `?`.
/// Non-ASCII bytes count as name starts.
fn opens_markup(next: u8) -> bool {
    next.is_ascii_alphabetic()
        || matches!(next, b'_' | b':' | b'/' | b'!' | b'?')
        || next >= 0x80
}

/// Extract the encoding label from an XML declaration in the first bytes.
pub(crate) fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    let prefix = &bytes[..bytes.len().min(200)];
    let decl_start = memmem::find(prefix, b"<?xml")?;
    let decl = &prefix[decl_start..];
    let decl = &decl[..memmem::find(decl, b"?>").unwrap_or(decl.len())];

    let enc_pos = decl
        .windows(8)
        .position(|w| w.eq_ignore_ascii_case(b"encoding"))?;
    let after = decl[enc_pos + 8..].trim_ascii_start();
    let after = after.strip_prefix(b"=")?.trim_ascii_start();

    let (&quote, rest) = after.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let end = memchr::memchr(quote, rest)?;
    std::str::from_utf8(&rest[..end]).ok()
}

/// Resolve XML entity references.
fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    let code = if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        entity.strip_prefix('#')?.parse::<u32>().ok()?
    };
    char::from_u32(code).map(String::from)
}

/// Replace entity references inside an attribute value. Unknown references
/// are left as written.
fn unescape_attribute(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match tail.find(';').and_then(|semi| {
            resolve_entity(&tail[1..semi]).map(|resolved| (resolved, semi))
        }) {
            Some((resolved, semi)) => {
                out.push_str(&resolved);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_xml_encoding() {
        assert_eq!(
            extract_xml_encoding(br#"<?xml version="1.0" encoding="windows-1251"?><a/>"#),
            Some("windows-1251")
        );
        assert_eq!(
            extract_xml_encoding(b"<?xml version='1.0' encoding = 'UTF-8' ?>"),
            Some("UTF-8")
        );
        assert_eq!(extract_xml_encoding(b"<?xml version=\"1.0\"?><a/>"), None);
        assert_eq!(extract_xml_encoding(b"<FictionBook/>"), None);
        assert_eq!(extract_xml_encoding(b""), None);
    }

    #[test]
    fn test_encoding_outside_declaration_ignored() {
        let doc = br#"<?xml version="1.0"?><a encoding="koi8-r"/>"#;
        assert_eq!(extract_xml_encoding(doc), None);
    }

    #[test]
    fn test_decode_declared_windows_1251() {
        let mut doc = br#"<?xml version="1.0" encoding="windows-1251"?><a>"#.to_vec();
        // "Мир" in windows-1251
        doc.extend_from_slice(&[0xCC, 0xE8, 0xF0]);
        doc.extend_from_slice(b"</a>");
        let text = decode_document(&doc, &NullObserver);
        assert!(text.ends_with("<a>Мир</a>"));
    }

    #[test]
    fn test_decode_utf8_with_bom() {
        let mut doc = vec![0xEF, 0xBB, 0xBF];
        doc.extend_from_slice("<a>ёж</a>".as_bytes());
        assert_eq!(decode_document(&doc, &NullObserver), "<a>ёж</a>");
    }

    #[test]
    fn test_resolve_entity() {
        assert_eq!(resolve_entity("amp"), Some("&".to_string()));
        assert_eq!(resolve_entity("quot"), Some("\"".to_string()));
        assert_eq!(resolve_entity("#65"), Some("A".to_string()));
        assert_eq!(resolve_entity("#x2014"), Some("\u{2014}".to_string()));
        assert_eq!(resolve_entity("#X41"), Some("A".to_string()));
        assert_eq!(resolve_entity("nbsp"), None);
        assert_eq!(resolve_entity("#xZZ"), None);
    }

    #[test]
    fn test_unescape_attribute() {
        assert_eq!(unescape_attribute("plain"), "plain");
        assert_eq!(unescape_attribute("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(unescape_attribute("&#x41;&#66;"), "AB");
        assert_eq!(unescape_attribute("a &unknown; b"), "a &unknown; b");
        assert_eq!(unescape_attribute("dangling &"), "dangling &");
    }

    #[test]
    fn test_root_element() {
        let doc = br#"<?xml version="1.0"?>
<!-- generated -->
<FictionBook xmlns="http://www.gribuser.ru/xml/fictionbook/2.0"><description/></FictionBook>"#;
        assert_eq!(root_element(doc).as_deref(), Some("fictionbook"));
        assert_eq!(root_element(b"<fb:FictionBook/>").as_deref(), Some("fictionbook"));
        assert_eq!(root_element(b"no markup here"), None);
    }

    #[test]
    fn test_normalize_line_ends() {
        let text = normalize_line_ends(Cow::Borrowed("a\r\nb\rc\nd"));
        assert_eq!(text, "a\nb\nc\nd");
        assert!(matches!(
            normalize_line_ends(Cow::Borrowed("plain\n")),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn test_escape_stray_angles() {
        let text = escape_stray_angles(Cow::Borrowed("<p>1 < 2 <<x</p>"), &NullObserver);
        assert_eq!(text, "<p>1 &lt; 2 &lt;<x</p>");

        let markup = "<?xml version=\"1.0\"?><!-- c --><a><b/><_x/></a>";
        assert!(matches!(
            escape_stray_angles(Cow::Borrowed(markup), &NullObserver),
            Cow::Borrowed(_)
        ));
        // A trailing '<' is a cut-off tag, not text.
        assert_eq!(escape_stray_angles(Cow::Borrowed("<a>x<"), &NullObserver), "<a>x<");
    }

    #[test]
    fn test_ill_formed_doctype_skipped() {
        let doc = b"<!DOCTYPE><FictionBook><description><title-info>\
                    <lang>en</lang></title-info></description></FictionBook>";
        let mut parser = Fb2Parser::new(crate::fb2::ParseMode::Metadata);
        let mut stats = ParseStats::default();
        let flow = drive(&mut parser, doc, &NullObserver, &mut stats).unwrap();

        assert_eq!(flow, Flow::Continue);
        assert_eq!(parser.field(crate::fb2::Field::Lang).values(), ["en"]);
    }
}
