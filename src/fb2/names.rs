//! Tag and attribute name normalization.
//!
//! Matchers compare plain local names, so every name coming out of the
//! tokenizer passes through here first: `{uri}local`, `prefix:local` and
//! `LOCAL` all become `local`.

use std::borrow::Cow;
use std::collections::BTreeMap;

/// Attributes of one element, keyed by normalized name.
pub type Attributes = BTreeMap<String, String>;

/// Strip any namespace or prefix from `name` and lower-case the rest.
///
/// Malformed qualified names degrade to best-effort stripping: a trailing
/// separator is dropped rather than producing an empty name.
pub fn normalize_name(name: &str) -> Cow<'_, str> {
    let local = local_part(name);
    if local.bytes().any(|b| b.is_ascii_uppercase()) || !local.is_ascii() {
        Cow::Owned(local.to_lowercase())
    } else {
        Cow::Borrowed(local)
    }
}

/// Byte-slice variant used directly on tokenizer output.
pub fn normalize_name_bytes(name: &[u8]) -> String {
    normalize_name(&String::from_utf8_lossy(name)).into_owned()
}

fn local_part(name: &str) -> &str {
    let after_uri = match name.rfind('}') {
        Some(pos) => &name[pos + 1..],
        None => name,
    };

    match after_uri.rfind(':') {
        Some(pos) if pos + 1 < after_uri.len() => &after_uri[pos + 1..],
        Some(_) => {
            let trimmed = after_uri.trim_end_matches(':');
            match trimmed.rfind(':') {
                Some(pos) => &trimmed[pos + 1..],
                None => trimmed,
            }
        }
        None => after_uri,
    }
}
