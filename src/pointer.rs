//! JSON Pointer handling and canonical node URLs.
//!
//! A node URL is `<document URL>#<pointer>`. Pointer segments are escaped per
//! RFC 6901 (`~0`, `~1`) and then percent-encoded, so the same location always
//! serializes to the same URL no matter how a `$ref` spelled it.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::Value;
use url::Url;

/// Characters percent-encoded inside one pointer segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Escape a raw key for use as a pointer segment (`~` -> `~0`, `/` -> `~1`).
pub fn escape_segment(raw: &str) -> String {
    raw.replace('~', "~0").replace('/', "~1")
}

/// Undo [`escape_segment`].
pub fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Build the encoded pointer for raw segments (empty slice -> `""`).
pub fn encode_pointer<S: AsRef<str>>(segments: &[S]) -> String {
    let mut pointer = String::new();
    for segment in segments {
        pointer.push('/');
        pointer.extend(utf8_percent_encode(&escape_segment(segment.as_ref()), SEGMENT));
    }
    pointer
}

/// Split an encoded fragment into raw segments.
///
/// `""` and `"/"`-less fragments that are not pointers yield no segments.
pub fn decode_pointer(fragment: &str) -> Vec<String> {
    let Some(rest) = fragment.strip_prefix('/') else {
        return Vec::new();
    };
    rest.split('/')
        .map(|part| unescape_segment(&percent_decode_str(part).decode_utf8_lossy()))
        .collect()
}

/// Whether a fragment is a JSON pointer (as opposed to a plain-name anchor).
pub fn is_pointer_fragment(fragment: &str) -> bool {
    fragment.is_empty() || fragment.starts_with('/')
}

/// Decoded fragment text of `url` (empty when absent).
pub fn fragment_text(url: &Url) -> String {
    url.fragment()
        .map(|f| percent_decode_str(f).decode_utf8_lossy().into_owned())
        .unwrap_or_default()
}

/// `url` without its fragment.
pub fn document_of(url: &Url) -> Url {
    let mut document = url.clone();
    document.set_fragment(None);
    document
}

/// Canonical URL of the node at `segments` inside `document`.
pub fn node_url<S: AsRef<str>>(document: &Url, segments: &[S]) -> Url {
    let mut url = document.clone();
    url.set_fragment(Some(&encode_pointer(segments)));
    url
}

/// URL naming a plain-name anchor inside `document`.
pub fn anchor_url(document: &Url, name: &str) -> Url {
    let mut url = document.clone();
    url.set_fragment(Some(name));
    url
}

/// Step into one child of `value` by raw segment.
pub fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Navigate raw segments from `root`.
pub fn navigate<'a, S: AsRef<str>>(root: &'a Value, segments: &[S]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(root, |current, segment| child(current, segment.as_ref()))
}

/// Navigate a pointer fragment (e.g. `"#/$defs/foo"` or `"/properties/bar"`).
pub fn navigate_fragment<'a>(schema: &'a Value, fragment: &str) -> Option<&'a Value> {
    let fragment = fragment.trim_start_matches('#');
    if fragment.is_empty() {
        return Some(schema);
    }
    if !fragment.starts_with('/') {
        return None;
    }
    navigate(schema, &decode_pointer(fragment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn escape_round_trip() {
        assert_eq!(escape_segment("a/b~c"), "a~1b~0c");
        assert_eq!(unescape_segment("a~1b~0c"), "a/b~c");
        // ~01 must decode to ~1, not /
        assert_eq!(unescape_segment("~01"), "~1");
    }

    #[test]
    fn encode_pointer_percent_encodes_segments() {
        assert_eq!(encode_pointer::<&str>(&[]), "");
        assert_eq!(
            encode_pointer(&["properties", "first name"]),
            "/properties/first%20name"
        );
        assert_eq!(encode_pointer(&["definitions", "a/b"]), "/definitions/a~1b");
        assert_eq!(encode_pointer(&["x", "50%"]), "/x/50%25");
        assert_eq!(encode_pointer(&["x", "ü"]), "/x/%C3%BC");
    }

    #[test]
    fn decode_pointer_inverts_encode() {
        let raw = vec!["properties".to_string(), "a b/c%".to_string(), "ü".to_string()];
        assert_eq!(decode_pointer(&encode_pointer(&raw)), raw);
        assert!(decode_pointer("").is_empty());
        assert!(decode_pointer("anchor").is_empty());
    }

    #[test]
    fn node_urls_are_canonical() {
        let doc = url("https://example.com/schema.json");
        assert_eq!(
            node_url::<&str>(&doc, &[]).as_str(),
            "https://example.com/schema.json#"
        );
        assert_eq!(
            node_url(&doc, &["$defs", "a b"]).as_str(),
            "https://example.com/schema.json#/$defs/a%20b"
        );

        // A reference spelling the same location resolves to the same URL.
        let joined = doc.join("#/$defs/a%20b").unwrap();
        assert_eq!(joined, node_url(&doc, &["$defs", "a b"]));
    }

    #[test]
    fn document_of_strips_fragment() {
        let node = url("https://example.com/a.json#/properties/x");
        assert_eq!(document_of(&node).as_str(), "https://example.com/a.json");
    }

    #[test]
    fn navigate_objects_and_arrays() {
        let schema = json!({
            "$defs": { "a/b": { "oneOf": [{ "type": "string" }, { "type": "null" }] } }
        });
        let found = navigate_fragment(&schema, "#/$defs/a~1b/oneOf/1").unwrap();
        assert_eq!(found, &json!({ "type": "null" }));
        assert_eq!(navigate_fragment(&schema, "#"), Some(&schema));
        assert!(navigate_fragment(&schema, "#/$defs/missing").is_none());
        assert!(navigate_fragment(&schema, "#/$defs/a~1b/oneOf/7").is_none());
        assert!(navigate_fragment(&schema, "#anchor").is_none());
    }

    #[test]
    fn fragment_classification() {
        assert!(is_pointer_fragment(""));
        assert!(is_pointer_fragment("/definitions/a"));
        assert!(!is_pointer_fragment("meta"));
        assert_eq!(fragment_text(&url("https://example.com/a#meta")), "meta");
        assert_eq!(fragment_text(&url("https://example.com/a")), "");
    }
}
