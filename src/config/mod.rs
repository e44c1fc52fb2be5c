//! Site configuration management for `folia.toml`.
//!
//! # Sections
//!
//! | Section       | Purpose                                        |
//! |---------------|------------------------------------------------|
//! | `[base]`      | Site metadata (title, description, url)        |
//! | `[build]`     | Build paths (output, styles)                   |
//! | `[[section]]` | One content section: dir, style, rules, feed   |
//!
//! # Example
//!
//! ```toml
//! [base]
//! title = "My Site"
//! url = "https://example.com"
//!
//! [build]
//! output = "public"
//! styles = "styles"
//!
//! [[section]]
//! dir = "posts"
//! title = "Posts"
//! index_sort = ["-date"]
//! feed = true
//!
//! [[section.rule]]
//! in = "{year}-{month}-{day}-{slug}.md"
//! out = "{year}/{slug}.html"
//! exec = "markdown"
//! ```
//!
//! Loading stops at the first problem: a malformed pattern or a missing
//! mandatory field fails the run before any content file is read.

mod error;

pub use error::ConfigError;

use crate::log;
use crate::model::{Section, Site};
use crate::pattern::{OutPattern, compile_matcher};
use anyhow::{Result, bail};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Style assumed when a section declares none.
pub const DEFAULT_STYLE: &str = "default";

/// Default sort keys for a synthesized section index.
fn default_index_sort() -> Vec<String> {
    vec!["id".to_string()]
}

fn default_output() -> PathBuf {
    PathBuf::from("public")
}

fn default_styles() -> PathBuf {
    PathBuf::from("styles")
}

// ============================================================================
// Raw configuration (serde view of folia.toml)
// ============================================================================

/// Root configuration structure representing folia.toml.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    #[serde(default)]
    pub base: BaseConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default, rename = "section")]
    pub sections: Vec<SectionConfig>,
}

/// Basic site information.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BaseConfig {
    pub title: String,
    pub description: String,
    /// Absolute site URL. Required when any section enables feeds.
    pub url: String,
}

/// Build paths, relative to the project root.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BuildConfig {
    pub output: PathBuf,
    pub styles: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            styles: default_styles(),
        }
    }
}

/// One content section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionConfig {
    pub dir: String,
    pub title: Option<String>,
    #[serde(default)]
    pub excerpt: String,
    pub style: Option<String>,
    #[serde(default)]
    pub include_css: Vec<String>,
    #[serde(default)]
    pub include_js: Vec<String>,
    #[serde(default = "default_index_sort")]
    pub index_sort: Vec<String>,
    #[serde(default)]
    pub feed: bool,
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleConfig>,
}

/// One declarative rule inside a section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    #[serde(rename = "in")]
    pub input: String,
    pub out: Option<String>,
    /// Shell command rendering the body. Absent means the rule copies
    /// matched files verbatim.
    pub exec: Option<String>,
    #[serde(default)]
    pub no_header: bool,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl SiteConfig {
    /// Parse configuration from TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Validate and compile into the site graph. Every pattern is
    /// compiled here, so malformed rules fail before collection starts.
    pub fn into_site(self, root: &Path, output_override: Option<&Path>) -> Result<Site> {
        let output = output_override
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.join(&self.build.output));
        let styles = root.join(&self.build.styles);

        if self.sections.iter().any(|s| s.feed) && self.base.url.is_empty() {
            bail!(ConfigError::Validation(
                "[base.url] is required when a section enables feeds".into()
            ));
        }

        let mut sections = Vec::with_capacity(self.sections.len());
        for (si, sc) in self.sections.into_iter().enumerate() {
            sections.push(compile_section(si, sc)?);
        }

        Ok(Site {
            root: root.to_path_buf(),
            output,
            styles,
            url: self.base.url,
            title: self.base.title,
            description: self.base.description,
            sections,
        })
    }
}

fn compile_section(si: usize, sc: SectionConfig) -> Result<Section> {
    if sc.dir.is_empty() {
        bail!(ConfigError::Validation(format!(
            "no `dir` specified for section n. {}",
            si + 1
        )));
    }
    if sc.rules.is_empty() {
        bail!(ConfigError::Validation(format!(
            "no rules specified for section n. {} (`{}`)",
            si + 1,
            sc.dir
        )));
    }

    let mut rules = Vec::with_capacity(sc.rules.len());
    for (ri, rc) in sc.rules.into_iter().enumerate() {
        if rc.input.is_empty() {
            bail!(ConfigError::Validation(format!(
                "no `in` pattern for rule n. {} in section `{}`",
                ri + 1,
                sc.dir
            )));
        }
        if rc.exec.is_some() && rc.out.is_none() {
            log!("config"; "rule n. {} in section `{}` has no `out` template, mirroring input path", ri + 1, sc.dir);
        }

        let matcher = compile_matcher(&rc.input, &sc.dir)?;
        let out = rc
            .out
            .as_deref()
            .map(|o| OutPattern::compile(o, &sc.dir))
            .transpose()?;
        let copy = rc.exec.is_none();

        rules.push(crate::model::Rule {
            raw_in: rc.input,
            matcher,
            out,
            exec: rc.exec,
            // Copy rules never read file content, so they never have headers.
            no_header: rc.no_header || copy,
            dependencies: rc.dependencies,
        });
    }

    Ok(Section {
        dir: sc.dir,
        title: sc.title.unwrap_or_else(|| "(no title)".to_string()),
        excerpt: sc.excerpt,
        style: sc.style.unwrap_or_else(|| DEFAULT_STYLE.to_string()),
        include_css: sc.include_css,
        include_js: sc.include_js,
        index_sort: sc.index_sort,
        feed: sc.feed,
        rules,
        items: Vec::new(),
    })
}

// ============================================================================
// Tests
// ============================================================================
