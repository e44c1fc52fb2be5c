//! Page rendering: drives templates over the collected site and writes
//! the output tree.
//!
//! Tag listings are cheap and always rewritten; per-item pages go
//! through the staleness check first. Feeds, the sitemap, and style
//! assets come last, once the page set is final.

use crate::aggregate::build_tag_index;
use crate::generator::{feed::write_feed, sitemap::write_sitemap};
use crate::header::read_body;
use crate::log;
use crate::model::{Item, Scalar, Section, Site};
use crate::sort::sort_items_by;
use crate::stale::needs_update;
use crate::style::{StyleCache, copy_assets, include_links};
use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tera::Tera;

// ============================================================================
// Template contexts
// ============================================================================

#[derive(Serialize)]
struct SiteContext<'a> {
    title: &'a str,
    description: &'a str,
    url: &'a str,
}

#[derive(Serialize)]
struct SectionContext<'a> {
    title: &'a str,
    excerpt: &'a str,
    url: String,
    tags_url: String,
    feed: bool,
}

#[derive(Serialize)]
struct ItemContext<'a> {
    id: i64,
    title: &'a str,
    excerpt: &'a str,
    slug: &'a str,
    /// RFC 3339 creation timestamp, absent for undated items.
    date: Option<String>,
    /// `YYYY-MM-DD` shorthand for templates that only print the day.
    date_ymd: Option<String>,
    tags: &'a [String],
    user: &'a BTreeMap<String, Scalar>,
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
}

#[derive(Serialize)]
struct TagContext<'a> {
    name: &'a str,
    url: String,
    count: usize,
}

impl<'a> ItemContext<'a> {
    fn new(item: &'a Item, body: Option<String>) -> Self {
        Self {
            id: item.id,
            title: &item.title,
            excerpt: &item.excerpt,
            slug: &item.slug,
            date: item.date().map(|d| d.to_rfc3339()),
            date_ymd: item.date().map(|d| d.format("%Y-%m-%d").to_string()),
            tags: &item.tags,
            user: &item.user,
            url: item.url(),
            body,
        }
    }
}

fn base_context(site: &Site, section: &Section, includes: &str) -> tera::Context {
    let mut ctx = tera::Context::new();
    ctx.insert(
        "site",
        &SiteContext {
            title: &site.title,
            description: &site.description,
            url: &site.url,
        },
    );
    ctx.insert(
        "section",
        &SectionContext {
            title: &section.title,
            excerpt: &section.excerpt,
            url: section.url(),
            tags_url: section.tags_url(),
            feed: section.feed,
        },
    );
    ctx.insert("includes", includes);
    ctx
}

// ============================================================================
// Driver
// ============================================================================

#[derive(Debug, Default)]
pub struct RenderStats {
    /// Item pages actually rendered this pass.
    pub rendered: usize,
    /// Item pages skipped as up to date.
    pub skipped: usize,
}

/// Render every page of the site, then feeds, sitemap, and style assets.
pub fn render_all(site: &Site, cache: &mut StyleCache) -> Result<RenderStats> {
    check_collisions(site)?;

    let mut stats = RenderStats::default();
    for section in &site.sections {
        let includes = include_links(site, section)?;
        let tera = cache.get(&site.styles, &section.style)?;

        let mut ordered: Vec<&Item> = section.items.iter().collect();
        sort_items_by(&mut ordered, &section.index_sort)?;

        render_tag_pages(site, section, tera, &ordered, &includes)?;

        for item in &section.items {
            if needs_update(site, item)? {
                render_single(site, section, tera, item, &includes)?;
                stats.rendered += 1;
            } else {
                stats.skipped += 1;
            }
        }

        if !has_index(section) {
            render_index(site, section, tera, &ordered, &includes)?;
        }

        write_feed(site, section)?;
    }

    write_sitemap(site)?;
    copy_assets(site)?;

    log!("render"; "{} rendered, {} up to date", stats.rendered, stats.skipped);
    Ok(stats)
}

/// Two rules producing the same output silently shadow each other, so
/// collisions are fatal before anything is written. Checked across all
/// sections, not per section.
fn check_collisions(site: &Site) -> Result<()> {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for section in &site.sections {
        for item in &section.items {
            if let Some(prev) = seen.insert(&item.outrel, &item.rel) {
                bail!(
                    "output collision: `{}` and `{}` both produce `{}`",
                    prev,
                    item.rel,
                    item.outrel
                );
            }
        }
    }
    Ok(())
}

fn has_index(section: &Section) -> bool {
    section
        .items
        .iter()
        .any(|item| Path::new(&item.outrel).file_name().is_some_and(|n| n == "index.html"))
}

// ============================================================================
// Page renderers
// ============================================================================

fn render_single(
    site: &Site,
    section: &Section,
    tera: &Tera,
    item: &Item,
    includes: &str,
) -> Result<()> {
    let rule = site.rule(item.rule);
    let exec = rule
        .exec
        .as_deref()
        .ok_or_else(|| anyhow!("copy rule cannot render `{}`", item.rel))?;
    let source = read_body(&site.inpath(item), rule.no_header)?;
    let body = run_exec(exec, &source, &item.rel)?;

    let mut ctx = base_context(site, section, includes);
    ctx.insert("item", &ItemContext::new(item, Some(body)));
    render_to_file(tera, "single.html", &ctx, &site.outpath(item))?;

    log!("render"; "{}", item.outrel);
    Ok(())
}

fn render_index(
    site: &Site,
    section: &Section,
    tera: &Tera,
    ordered: &[&Item],
    includes: &str,
) -> Result<()> {
    let items: Vec<ItemContext> = ordered
        .iter()
        .map(|item| ItemContext::new(item, None))
        .collect();
    let mut ctx = base_context(site, section, includes);
    ctx.insert("items", &items);

    let path = site.output.join(&section.dir).join("index.html");
    render_to_file(tera, "index.html", &ctx, &path)
}

/// The per-tag pages plus the tag overview. Item order inside a tag page
/// follows the section's index ordering.
fn render_tag_pages(
    site: &Site,
    section: &Section,
    tera: &Tera,
    ordered: &[&Item],
    includes: &str,
) -> Result<()> {
    let index = build_tag_index(ordered);

    let tags: Vec<TagContext> = index
        .iter()
        .map(|(tag, ids)| TagContext {
            name: tag,
            url: section.tag_url(tag),
            count: ids.len(),
        })
        .collect();
    let mut ctx = base_context(site, section, includes);
    ctx.insert("tags", &tags);
    let path = site.output.join(&section.dir).join("tags.html");
    render_to_file(tera, "tags.html", &ctx, &path)?;

    for (tag, ids) in &index {
        let items: Vec<ItemContext> = ids
            .iter()
            .map(|&i| ItemContext::new(ordered[i], None))
            .collect();
        let mut ctx = base_context(site, section, includes);
        ctx.insert("tag", tag);
        ctx.insert("items", &items);

        let path = site
            .output
            .join(&section.dir)
            .join("tag")
            .join(format!("{tag}.html"));
        render_to_file(tera, "tag.html", &ctx, &path)?;
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Pipe `input` through the rule's shell command and capture its stdout.
/// A non-zero exit is fatal and carries the command's stderr.
fn run_exec(exec: &str, input: &str, rel: &str) -> Result<String> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(exec)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to run `{exec}`"))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("no stdin handle for `{exec}`"))?;
    // Write from a separate thread while draining stdout here, otherwise
    // a body larger than the pipe capacity deadlocks both processes.
    let body = input.to_string();
    let writer = std::thread::spawn(move || stdin.write_all(body.as_bytes()));

    let output = child
        .wait_with_output()
        .with_context(|| format!("failed to wait for `{exec}`"))?;

    match writer.join() {
        Ok(Ok(())) => {}
        // The command is free to exit without consuming its input.
        Ok(Err(err)) if err.kind() == std::io::ErrorKind::BrokenPipe => {}
        Ok(Err(err)) => return Err(err).with_context(|| format!("failed to feed `{exec}`")),
        Err(_) => bail!("stdin writer panicked for `{exec}`"),
    }
    if !output.status.success() {
        bail!(
            "`{exec}` failed on {rel} ({}): {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    String::from_utf8(output.stdout).with_context(|| format!("`{exec}` wrote non-UTF-8 output"))
}

fn render_to_file(tera: &Tera, template: &str, ctx: &tera::Context, path: &Path) -> Result<()> {
    let html = tera
        .render(template, ctx)
        .with_context(|| format!("failed to render {template}"))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, html).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::collect;
    use crate::config::SiteConfig;
    use crate::model::RuleId;
    use std::fs;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
        [base]
        title = "Example"
        description = "example site"
        url = "https://example.org"

        [[section]]
        dir = "posts"
        title = "Posts"
        feed = true
        [[section.rule]]
        in = "{slug}.md"
        out = "{slug}.html"
        exec = "cat"
    "#;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn scaffold(dir: &TempDir) {
        write(
            dir.path(),
            "styles/default/single.html",
            "<h1>{{ item.title }}</h1>{{ item.body }}",
        );
        write(
            dir.path(),
            "styles/default/index.html",
            "{% for i in items %}<a href=\"{{ i.url }}\">{{ i.title }}</a>{% endfor %}",
        );
        write(
            dir.path(),
            "styles/default/tags.html",
            "{% for t in tags %}{{ t.name }}:{{ t.count }} {% endfor %}",
        );
        write(
            dir.path(),
            "styles/default/tag.html",
            "{{ tag }}: {% for i in items %}{{ i.title }} {% endfor %}",
        );
        write(
            dir.path(),
            "posts/hello.md",
            "title: Hello\ntags: [rust]\n...\nbody text\n",
        );
    }

    fn build(dir: &TempDir) -> (Site, RenderStats) {
        let mut site = SiteConfig::from_str(CONFIG)
            .unwrap()
            .into_site(dir.path(), None)
            .unwrap();
        collect(&mut site).unwrap();
        let mut cache = StyleCache::default();
        let stats = render_all(&site, &mut cache).unwrap();
        (site, stats)
    }

    #[test]
    fn test_full_build_produces_all_pages() {
        let dir = TempDir::new().unwrap();
        scaffold(&dir);
        let (site, stats) = build(&dir);

        assert_eq!(stats.rendered, 1);
        let html = fs::read_to_string(site.output.join("posts/hello.html")).unwrap();
        assert!(html.contains("<h1>Hello</h1>"));
        assert!(html.contains("body text"));
        assert!(site.output.join("posts/index.html").exists());
        assert!(site.output.join("posts/tags.html").exists());
        assert!(site.output.join("posts/tag/rust.html").exists());
        assert!(site.output.join("posts/rss.xml").exists());
        assert!(site.output.join("sitemap.xml").exists());
    }

    #[test]
    fn test_second_pass_skips_fresh_items() {
        let dir = TempDir::new().unwrap();
        scaffold(&dir);
        build(&dir);
        let (_, stats) = build(&dir);
        assert_eq!(stats.rendered, 0);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn test_index_synthesized_only_when_absent() {
        let dir = TempDir::new().unwrap();
        scaffold(&dir);
        let (site, _) = build(&dir);
        let index = fs::read_to_string(site.output.join("posts/index.html")).unwrap();
        assert!(index.contains("/posts/hello"));
    }

    #[test]
    fn test_output_collision_is_fatal() {
        let dir = TempDir::new().unwrap();
        scaffold(&dir);
        let mut site = SiteConfig::from_str(CONFIG)
            .unwrap()
            .into_site(dir.path(), None)
            .unwrap();
        let mut a = Item::new("posts/a.md", RuleId { section: 0, rule: 0 });
        a.slug = "a".into();
        a.title = "A".into();
        a.outrel = "posts/same.html".into();
        let mut b = a.clone();
        b.rel = "posts/b.md".into();
        site.sections[0].items.extend([a, b]);

        let mut cache = StyleCache::default();
        let err = render_all(&site, &mut cache).unwrap_err();
        assert!(err.to_string().contains("posts/same.html"));
    }

    #[test]
    fn test_failing_exec_is_fatal_with_stderr() {
        let dir = TempDir::new().unwrap();
        scaffold(&dir);
        write(dir.path(), "posts/hello.md", "title: Hello\n...\nbody\n");

        let config = CONFIG.replace("exec = \"cat\"", "exec = \"echo boom >&2; false\"");
        let mut site = SiteConfig::from_str(&config)
            .unwrap()
            .into_site(dir.path(), None)
            .unwrap();
        collect(&mut site).unwrap();
        let mut cache = StyleCache::default();
        let err = render_all(&site, &mut cache).unwrap_err();
        assert!(format!("{err:#}").contains("boom"));
    }

    #[test]
    fn test_run_exec_pipes_stdin() {
        let out = run_exec("tr a-z A-Z", "hello", "x.md").unwrap();
        assert_eq!(out.trim(), "HELLO");
    }

    #[test]
    fn test_run_exec_survives_bodies_larger_than_the_pipe() {
        let body = "x".repeat(1 << 20);
        let out = run_exec("cat", &body, "big.md").unwrap();
        assert_eq!(out.len(), body.len());
    }

    #[test]
    fn test_run_exec_command_may_ignore_stdin() {
        let body = "y".repeat(1 << 20);
        let out = run_exec("echo done", &body, "x.md").unwrap();
        assert_eq!(out.trim(), "done");
    }
}
