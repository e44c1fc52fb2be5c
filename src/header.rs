//! Embedded metadata header blocks.
//!
//! Content files open with a YAML key→value document terminated by a line
//! containing exactly `...`. Everything after the terminator is the body.
//! Reaching end-of-file before the terminator is a fatal parse error.

use crate::model::Scalar;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// End-of-header marker line.
const TERMINATOR: &str = "...";

/// Open header value: integer or text. Any other YAML shape (bool,
/// float, list, mapping) fails deserialization, which aborts the run —
/// such values could never be ordered by the sorter anyway.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged, expecting = "an integer or a string")]
pub enum RawScalar {
    Int(i64),
    Text(String),
}

impl From<RawScalar> for Scalar {
    fn from(raw: RawScalar) -> Self {
        match raw {
            RawScalar::Int(n) => Scalar::Int(n),
            RawScalar::Text(s) => Scalar::Text(s),
        }
    }
}

/// Raw header document. Reserved keys land in typed fields; everything
/// else flattens into `extra` and becomes a user attribute.
#[derive(Debug, Default, Deserialize)]
pub struct Header {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub slug: Option<String>,
    /// Kept as the literal string; date resolution happens in the
    /// extractor, not here.
    pub date: Option<String>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub tags: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, RawScalar>,
}

impl Header {
    /// The open keys as typed scalars for an item's user attribute map.
    pub fn user_scalars(&self) -> BTreeMap<String, Scalar> {
        self.extra
            .iter()
            .map(|(key, value)| (key.clone(), value.clone().into()))
            .collect()
    }
}

/// Split a file's content into header text and body.
///
/// Returns the raw YAML block (without the terminator) and the byte offset
/// where the body starts.
pub fn split_header(path: &Path, content: &str) -> Result<(String, usize)> {
    let mut header = String::new();
    let mut offset = 0;

    for raw in content.split_inclusive('\n') {
        let line = raw.strip_suffix('\n').unwrap_or(raw);
        let line = line.strip_suffix('\r').unwrap_or(line);
        offset += raw.len();
        if line == TERMINATOR {
            return Ok((header, offset));
        }
        header.push_str(raw);
    }

    bail!(
        "{}: reached end of file while scanning for the `...` header terminator",
        path.display()
    )
}

/// Read and parse a file's header block.
pub fn read_header(path: &Path) -> Result<Header> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let (text, _) = split_header(path, &content)?;
    parse_header(path, &text)
}

pub fn parse_header(path: &Path, text: &str) -> Result<Header> {
    // A file may open directly with the terminator; an empty header is
    // legal (the rule's mandatory-field checks still apply).
    if text.trim().is_empty() {
        return Ok(Header::default());
    }
    serde_yaml_bw::from_str(text)
        .with_context(|| format!("{}: malformed header block", path.display()))
}

/// Read a file's body (everything after the header terminator). For
/// header-less rules the whole file is the body.
pub fn read_body(path: &Path, no_header: bool) -> Result<String> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    if no_header {
        return Ok(content);
    }
    let (_, offset) = split_header(path, &content)?;
    Ok(content[offset..].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> &'static Path {
        Path::new("posts/hello.md")
    }

    #[test]
    fn test_split_header_concrete_scenario() {
        let (text, offset) = split_header(path(), "title: Hello\nslug: hi\n...\nbody text\n").unwrap();
        assert_eq!(text, "title: Hello\nslug: hi\n");
        let header = parse_header(path(), &text).unwrap();
        assert_eq!(header.title.as_deref(), Some("Hello"));
        assert_eq!(header.slug.as_deref(), Some("hi"));
        assert_eq!(
            &"title: Hello\nslug: hi\n...\nbody text\n"[offset..],
            "body text\n"
        );
    }

    #[test]
    fn test_split_header_missing_terminator_is_fatal() {
        let err = split_header(path(), "title: Hello\nslug: hi\n").unwrap_err();
        assert!(err.to_string().contains("header terminator"));
    }

    #[test]
    fn test_split_header_terminator_must_be_exact() {
        // `....` is not the terminator
        assert!(split_header(path(), "title: T\n....\n").is_err());
        // indented terminator does not count
        assert!(split_header(path(), "title: T\n ...\n").is_err());
    }

    #[test]
    fn test_split_header_crlf() {
        let (text, _) = split_header(path(), "title: T\r\n...\r\nbody").unwrap();
        assert_eq!(text, "title: T\r\n");
    }

    #[test]
    fn test_parse_header_reserved_and_open_keys() {
        let header = parse_header(
            path(),
            "title: Hello\nslug: hi\nid: 3\ntags: [x, y]\nweight: 10\nkind: essay\n",
        )
        .unwrap();
        assert_eq!(header.id, Some(3));
        assert_eq!(header.tags.as_deref(), Some(&["x".to_string(), "y".to_string()][..]));
        let user = header.user_scalars();
        assert_eq!(user.get("weight"), Some(&Scalar::Int(10)));
        assert_eq!(user.get("kind"), Some(&Scalar::Text("essay".into())));
    }

    #[test]
    fn test_parse_header_date_stays_raw() {
        let header = parse_header(path(), "date: 2021-03-05\n").unwrap();
        assert_eq!(header.date.as_deref(), Some("2021-03-05"));
    }

    #[test]
    fn test_parse_header_rejects_unorderable_values() {
        // booleans and floats cannot participate in user-key sorting
        assert!(parse_header(path(), "flag: true\n").is_err());
        assert!(parse_header(path(), "ratio: 1.5\n").is_err());
    }

    #[test]
    fn test_parse_header_malformed_yaml_is_fatal() {
        assert!(parse_header(path(), "title: [unclosed\n").is_err());
    }
}
