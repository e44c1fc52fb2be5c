//! Core site graph: sections, rules, and collected items.
//!
//! The graph is built once from configuration, grown by the collector
//! (items are appended in walk order), and read-only during rendering.

use crate::pattern::OutPattern;
use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::{cmp::Ordering, collections::BTreeMap, fmt, path::PathBuf};

/// Sentinel for "no id declared" (header-less items and items whose
/// header simply omits `id`).
pub const NO_ID: i64 = -1;

/// The whole in-memory site: resolved paths plus the section graph.
///
/// Replaces process-wide registries with an explicitly constructed
/// context object passed through collection and rendering.
#[derive(Debug)]
pub struct Site {
    /// Source tree root.
    pub root: PathBuf,
    /// Output tree root.
    pub output: PathBuf,
    /// Directory holding one subdirectory per style.
    pub styles: PathBuf,
    /// Absolute site URL used for sitemap/feed links.
    pub url: String,
    /// Site-wide title.
    pub title: String,
    /// Site-wide description (feeds require one).
    pub description: String,
    pub sections: Vec<Section>,
}

impl Site {
    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.sections[id.section].rules[id.rule]
    }

    pub fn section_of(&self, id: RuleId) -> &Section {
        &self.sections[id.section]
    }

    /// Absolute input path of an item.
    pub fn inpath(&self, item: &Item) -> PathBuf {
        self.root.join(&item.rel)
    }

    /// Absolute output path of an item.
    pub fn outpath(&self, item: &Item) -> PathBuf {
        self.output.join(&item.outrel)
    }

    /// Join a site-relative URL path onto the configured base URL.
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), path)
    }
}

/// A configured collection root: directory, style, rules, and the items
/// collected for it.
#[derive(Debug)]
pub struct Section {
    pub dir: String,
    pub title: String,
    pub excerpt: String,
    pub style: String,
    pub include_css: Vec<String>,
    pub include_js: Vec<String>,
    /// Sort keys for the synthesized index page.
    pub index_sort: Vec<String>,
    pub feed: bool,
    pub rules: Vec<Rule>,
    /// Insertion order follows the filesystem walk, not any sort.
    pub items: Vec<Item>,
}

impl Section {
    /// Site-relative URL of the section index, always slash-terminated.
    pub fn url(&self) -> String {
        format!("/{}/", self.dir)
    }

    pub fn tags_url(&self) -> String {
        format!("/{}/tags", self.dir)
    }

    pub fn tag_url(&self, tag: &str) -> String {
        format!("/{}/tag/{}", self.dir, tag)
    }
}

/// One declarative pattern: input matcher, optional output template,
/// optional content command.
#[derive(Debug)]
pub struct Rule {
    /// Raw input pattern, kept for diagnostics.
    pub raw_in: String,
    /// Anchored matcher over section-relative paths.
    pub matcher: Regex,
    /// Output path template; `None` mirrors the input path.
    pub out: Option<OutPattern>,
    /// Shell command producing the rendered body. `None` makes this a
    /// copy rule: matched files are copied verbatim and never become items.
    pub exec: Option<String>,
    pub no_header: bool,
    /// Dependency glob templates, rendered per item for staleness checks.
    pub dependencies: Vec<String>,
}

impl Rule {
    pub fn is_copy(&self) -> bool {
        self.exec.is_none()
    }
}

/// Index pair locating a rule inside the section graph. Items carry this
/// instead of a borrow; the graph outlives every item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleId {
    pub section: usize,
    pub rule: usize,
}

/// One classified content file with extracted and merged metadata.
#[derive(Debug, Clone)]
pub struct Item {
    pub id: i64,
    pub title: String,
    pub excerpt: String,
    pub slug: String,
    pub date: DateField,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub tags: Vec<String>,
    /// Open user attributes from path placeholders and unknown header keys.
    pub user: BTreeMap<String, Scalar>,
    /// Input path relative to the source root.
    pub rel: String,
    /// Output path relative to the output root.
    pub outrel: String,
    pub rule: RuleId,
}

impl Item {
    pub fn new(rel: &str, rule: RuleId) -> Self {
        Self {
            id: NO_ID,
            title: String::new(),
            excerpt: String::new(),
            slug: String::new(),
            date: DateField::Unset,
            year: None,
            month: None,
            day: None,
            tags: Vec::new(),
            user: BTreeMap::new(),
            rel: rel.to_string(),
            outrel: String::new(),
            rule,
        }
    }

    /// Resolved creation date, if any. "No date" stays `None` all the way
    /// downstream; it is never a zero timestamp.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        match self.date {
            DateField::Resolved(d) => Some(d),
            _ => None,
        }
    }

    /// Site-relative URL of the rendered page. `index.html` leaves collapse
    /// to their directory, other pages drop the `.html` suffix. Only a
    /// whole `index.html` component collapses; `reindex.html` is a page.
    pub fn url(&self) -> String {
        let path = format!("/{}", self.outrel);
        if let Some(dir) = path.strip_suffix("/index.html") {
            format!("{dir}/")
        } else if let Some(page) = path.strip_suffix(".html") {
            page.to_string()
        } else {
            path
        }
    }
}

/// Date metadata as it progresses through extraction.
///
/// Moves `Unset` → `Raw` → `Resolved` and never regresses. `Raw` holds the
/// literal header string and never survives extraction: it either parses
/// into `Resolved` or aborts the run.
#[derive(Debug, Clone, PartialEq)]
pub enum DateField {
    Unset,
    Raw(String),
    Resolved(DateTime<Utc>),
}

/// Closed scalar variant for user attributes: integers and text only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Text(String),
}

impl Scalar {
    /// Total order within a variant; comparing across variants is a
    /// configuration error, not a panic.
    pub fn try_cmp(&self, other: &Scalar) -> Result<Ordering> {
        match (self, other) {
            (Scalar::Int(a), Scalar::Int(b)) => Ok(a.cmp(b)),
            (Scalar::Text(a), Scalar::Text(b)) => Ok(a.cmp(b)),
            _ => bail!(
                "cannot order {} `{self}` against {} `{other}`",
                self.type_name(),
                other.type_name()
            ),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Int(_) => "integer",
            Scalar::Text(_) => "text",
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(n) => write!(f, "{n}"),
            Scalar::Text(s) => write!(f, "{s}"),
        }
    }
}
