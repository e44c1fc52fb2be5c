//! Declarative path patterns.
//!
//! A pattern like `{year}-{month}-{day}-{slug}.md` compiles two ways:
//! into an anchored matcher with named capture groups (input side), and
//! into an output path template substituting item fields (output side).
//!
//! Recognized placeholders: `{id}`, `{slug}`, `{year}`, `{month}`,
//! `{day}`, `{title}`, and `{user.<name>}` for open attributes. Digits
//! are fixed-width for date parts (4/2/2); slug, title, and user fields
//! match any non-slash run.

use crate::model::Item;
use anyhow::{Context, Result};
use regex::Regex;
use thiserror::Error;

/// Errors surfaced while compiling a pattern. All of them are fatal
/// configuration errors reported before any file is processed.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("pattern `{pattern}`: unbalanced `{{` at byte {pos}")]
    Unbalanced { pattern: String, pos: usize },

    #[error("pattern `{pattern}`: unknown placeholder `{{{name}}}`")]
    UnknownPlaceholder { pattern: String, name: String },

    #[error("pattern `{pattern}`: invalid user field name `{name}`")]
    BadFieldName { pattern: String, name: String },

    #[error("pattern `{pattern}` compiled to an invalid expression")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A placeholder inside a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    Id,
    Slug,
    Year,
    Month,
    Day,
    Title,
    User(String),
}

impl Placeholder {
    fn parse(pattern: &str, name: &str) -> Result<Self, PatternError> {
        match name {
            "id" => Ok(Placeholder::Id),
            "slug" => Ok(Placeholder::Slug),
            "year" => Ok(Placeholder::Year),
            "month" => Ok(Placeholder::Month),
            "day" => Ok(Placeholder::Day),
            "title" => Ok(Placeholder::Title),
            _ => match name.strip_prefix("user.") {
                Some(field) if is_valid_field_name(field) => {
                    Ok(Placeholder::User(field.to_string()))
                }
                Some(field) => Err(PatternError::BadFieldName {
                    pattern: pattern.to_string(),
                    name: field.to_string(),
                }),
                None => Err(PatternError::UnknownPlaceholder {
                    pattern: pattern.to_string(),
                    name: name.to_string(),
                }),
            },
        }
    }

    /// Capture group expression for the input side.
    fn group_expr(&self) -> String {
        match self {
            Placeholder::Id => r"(?P<id>[0-9]+)".to_string(),
            Placeholder::Slug => r"(?P<slug>[^/]+)".to_string(),
            Placeholder::Year => r"(?P<year>[0-9]{4})".to_string(),
            Placeholder::Month => r"(?P<month>[0-9]{2})".to_string(),
            Placeholder::Day => r"(?P<day>[0-9]{2})".to_string(),
            Placeholder::Title => r"(?P<title>[^/]+)".to_string(),
            Placeholder::User(name) => format!(r"(?P<{name}>[^/]+)"),
        }
    }
}

/// Capture group names must be valid regex identifiers.
fn is_valid_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// One parsed piece of a pattern.
#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Field(Placeholder),
}

/// Split a pattern into literal and placeholder segments.
fn parse_segments(pattern: &str) -> Result<Vec<Segment>, PatternError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = pattern;
    let mut offset = 0;

    while let Some(open) = rest.find('{') {
        literal.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| PatternError::Unbalanced {
            pattern: pattern.to_string(),
            pos: offset + open,
        })?;
        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Field(Placeholder::parse(pattern, &after[..close])?));
        offset += open + 1 + close + 1;
        rest = &after[close + 1..];
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    Ok(segments)
}

/// Section directory prefix shared by both pattern sides. A section
/// rooted at `.` matches paths without any prefix.
fn dir_prefix(dir: &str) -> String {
    if dir.is_empty() || dir == "." {
        String::new()
    } else {
        format!("{dir}/")
    }
}

/// Compile an input pattern into a matcher anchored to the full
/// section-relative path.
pub fn compile_matcher(pattern: &str, dir: &str) -> Result<Regex, PatternError> {
    let mut expr = String::from("^");
    expr.push_str(&regex::escape(&dir_prefix(dir)));
    for segment in parse_segments(pattern)? {
        match segment {
            Segment::Literal(text) => expr.push_str(&regex::escape(&text)),
            Segment::Field(ph) => expr.push_str(&ph.group_expr()),
        }
    }
    expr.push('$');

    Regex::new(&expr).map_err(|source| PatternError::Regex {
        pattern: pattern.to_string(),
        source,
    })
}

/// Compiled output path template. Rendering substitutes the fields of an
/// already-populated item.
#[derive(Debug, Clone)]
pub struct OutPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl OutPattern {
    pub fn compile(pattern: &str, dir: &str) -> Result<Self, PatternError> {
        let prefixed = format!("{}{}", dir_prefix(dir), pattern);
        let segments = parse_segments(&prefixed)?;
        Ok(Self {
            raw: prefixed,
            segments,
        })
    }

    /// Render the template against an item. Date parts are zero-padded to
    /// the widths the input side matches, so a mirror template round-trips.
    pub fn render(&self, item: &Item) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(ph) => match ph {
                    Placeholder::Id => out.push_str(&item.id.to_string()),
                    Placeholder::Slug => out.push_str(&item.slug),
                    Placeholder::Title => out.push_str(&item.title),
                    Placeholder::Year => {
                        let year = item.year.with_context(|| {
                            format!("`{}`: item {:?} has no year", self.raw, item.rel)
                        })?;
                        out.push_str(&format!("{year:04}"));
                    }
                    Placeholder::Month => {
                        let month = item.month.with_context(|| {
                            format!("`{}`: item {:?} has no month", self.raw, item.rel)
                        })?;
                        out.push_str(&format!("{month:02}"));
                    }
                    Placeholder::Day => {
                        let day = item.day.with_context(|| {
                            format!("`{}`: item {:?} has no day", self.raw, item.rel)
                        })?;
                        out.push_str(&format!("{day:02}"));
                    }
                    Placeholder::User(name) => {
                        let value = item.user.get(name).with_context(|| {
                            format!("`{}`: item {:?} has no user field `{name}`", self.raw, item.rel)
                        })?;
                        out.push_str(&value.to_string());
                    }
                },
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RuleId, Scalar};

    fn test_item() -> Item {
        let mut item = Item::new("posts/2021-03-05-hello.md", RuleId { section: 0, rule: 0 });
        item.id = 7;
        item.slug = "hello".into();
        item.title = "Hello".into();
        item.year = Some(2021);
        item.month = Some(3);
        item.day = Some(5);
        item.user.insert("lang".into(), Scalar::Text("en".into()));
        item
    }

    #[test]
    fn test_matcher_accepts_consistent_paths() {
        let re = compile_matcher("{year}-{month}-{day}-{slug}.md", "posts").unwrap();
        assert!(re.is_match("posts/2021-03-05-hello.md"));
        // year must be exactly four digits
        assert!(!re.is_match("posts/21-03-05-hello.md"));
        assert!(!re.is_match("posts/20211-03-05-hello.md"));
        // anchored: no trailing garbage, no missing prefix
        assert!(!re.is_match("posts/2021-03-05-hello.md.bak"));
        assert!(!re.is_match("2021-03-05-hello.md"));
    }

    #[test]
    fn test_matcher_group_names_follow_placeholders() {
        let re = compile_matcher("{id}-{slug}.md", "notes").unwrap();
        let caps = re.captures("notes/12-intro.md").unwrap();
        assert_eq!(&caps["id"], "12");
        assert_eq!(&caps["slug"], "intro");
    }

    #[test]
    fn test_matcher_slug_rejects_slash() {
        let re = compile_matcher("{slug}.md", "posts").unwrap();
        assert!(!re.is_match("posts/a/b.md"));
    }

    #[test]
    fn test_matcher_user_placeholder() {
        let re = compile_matcher("{user.lang}/{slug}.md", "posts").unwrap();
        let caps = re.captures("posts/en/hello.md").unwrap();
        assert_eq!(&caps["lang"], "en");
    }

    #[test]
    fn test_matcher_escapes_literal_metacharacters() {
        let re = compile_matcher("{slug}.md", "posts").unwrap();
        assert!(!re.is_match("posts/helloxmd"));
    }

    #[test]
    fn test_matcher_root_section_has_no_prefix() {
        let re = compile_matcher("{slug}.md", ".").unwrap();
        assert!(re.is_match("about.md"));
        assert!(!re.is_match("sub/about.md"));
    }

    #[test]
    fn test_unbalanced_brace_is_error() {
        let err = compile_matcher("{slug.md", "posts").unwrap_err();
        assert!(matches!(err, PatternError::Unbalanced { .. }));
    }

    #[test]
    fn test_unknown_placeholder_is_error() {
        let err = compile_matcher("{bogus}.md", "posts").unwrap_err();
        assert!(matches!(err, PatternError::UnknownPlaceholder { .. }));
    }

    #[test]
    fn test_bad_user_field_name_is_error() {
        let err = compile_matcher("{user.1x}.md", "posts").unwrap_err();
        assert!(matches!(err, PatternError::BadFieldName { .. }));
    }

    #[test]
    fn test_out_render_concrete_scenario() {
        // posts/{year}-{month}-{day}-{slug}.md -> posts/{year}/{slug}.html
        let out = OutPattern::compile("{year}/{slug}.html", "posts").unwrap();
        assert_eq!(out.render(&test_item()).unwrap(), "posts/2021/hello.html");
    }

    #[test]
    fn test_out_render_pads_date_parts() {
        let out = OutPattern::compile("{year}-{month}-{day}.html", "posts").unwrap();
        assert_eq!(out.render(&test_item()).unwrap(), "posts/2021-03-05.html");
    }

    #[test]
    fn test_out_render_user_field() {
        let out = OutPattern::compile("{user.lang}/{id}.html", "posts").unwrap();
        assert_eq!(out.render(&test_item()).unwrap(), "posts/en/7.html");
    }

    #[test]
    fn test_out_render_missing_user_field_is_error() {
        let out = OutPattern::compile("{user.missing}.html", "posts").unwrap();
        assert!(out.render(&test_item()).is_err());
    }

    #[test]
    fn test_out_render_missing_date_part_is_error() {
        let out = OutPattern::compile("{year}/{slug}.html", "posts").unwrap();
        let mut item = test_item();
        item.year = None;
        assert!(out.render(&item).is_err());
    }
}
