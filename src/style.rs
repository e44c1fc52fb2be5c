//! Style loading: per-style template sets, asset copying, and the
//! `<head>` include links sections inject into every page.

use crate::log;
use crate::model::{Section, Site};
use crate::stale::copy_if_newer;
use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::path::Path;
use tera::Tera;

/// Glob matching every template of a style, e.g. `styles/default/*.html`.
pub fn template_glob(styles: &Path, style: &str) -> String {
    format!("{}/{}/*.html", styles.display(), style)
}

/// Lazily loaded tera instances, one per style name. Sections sharing a
/// style share the compiled templates.
#[derive(Default)]
pub struct StyleCache {
    styles: HashMap<String, Tera>,
}

impl StyleCache {
    /// Fetch the templates of `style`, compiling them on first use.
    /// A style with no templates at all is a configuration error.
    pub fn get(&mut self, styles_dir: &Path, style: &str) -> Result<&Tera> {
        if !self.styles.contains_key(style) {
            let pattern = template_glob(styles_dir, style);
            let mut tera = Tera::new(&pattern)
                .map_err(|err| anyhow!("failed to load style `{style}`: {err}"))?;
            // Item bodies are pre-rendered HTML from the rule's exec
            // command and must reach the page unescaped.
            tera.autoescape_on(vec![]);
            if tera.get_template_names().next().is_none() {
                return Err(anyhow!("style `{style}` has no templates under {pattern}"));
            }
            log!("style"; "loaded style `{}`", style);
            self.styles.insert(style.to_string(), tera);
        }
        // Just inserted above when absent.
        Ok(&self.styles[style])
    }
}

/// Copy the css and js assets of every style used by `site` into the
/// output tree, under `css/<style>/` and `js/<style>/`.
pub fn copy_assets(site: &Site) -> Result<()> {
    let mut done: Vec<&str> = Vec::new();
    for section in &site.sections {
        if done.contains(&section.style.as_str()) {
            continue;
        }
        done.push(&section.style);
        copy_asset_kind(site, &section.style, "css")?;
        copy_asset_kind(site, &section.style, "js")?;
    }
    Ok(())
}

fn copy_asset_kind(site: &Site, style: &str, kind: &str) -> Result<()> {
    let pattern = format!("{}/{}/*.{}", site.styles.display(), style, kind);
    for entry in glob::glob(&pattern).with_context(|| format!("bad glob `{pattern}`"))? {
        let src = entry.with_context(|| format!("expanding glob `{pattern}`"))?;
        let name = src
            .file_name()
            .ok_or_else(|| anyhow!("asset without a file name: {}", src.display()))?;
        let dst = site.output.join(kind).join(style).join(name);
        copy_if_newer(&src, &dst)?;
    }
    Ok(())
}

/// Build the `<head>` link/script tags for one section: the style's own
/// css first, then the section's extra includes, then the feed link.
pub fn include_links(site: &Site, section: &Section) -> Result<String> {
    let mut links = String::new();

    let pattern = format!("{}/{}/*.css", site.styles.display(), section.style);
    for entry in glob::glob(&pattern).with_context(|| format!("bad glob `{pattern}`"))? {
        let src = entry.with_context(|| format!("expanding glob `{pattern}`"))?;
        let name = src
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("non-UTF-8 asset name: {}", src.display()))?;
        css_link(&mut links, &format!("/css/{}/{}", section.style, name));
    }
    for href in &section.include_css {
        css_link(&mut links, href);
    }

    let pattern = format!("{}/{}/*.js", site.styles.display(), section.style);
    for entry in glob::glob(&pattern).with_context(|| format!("bad glob `{pattern}`"))? {
        let src = entry.with_context(|| format!("expanding glob `{pattern}`"))?;
        let name = src
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("non-UTF-8 asset name: {}", src.display()))?;
        js_link(&mut links, &format!("/js/{}/{}", section.style, name));
    }
    for src in &section.include_js {
        js_link(&mut links, src);
    }

    if section.feed {
        links.push_str(&format!(
            "<link rel=\"alternate\" type=\"application/rss+xml\" title=\"{}\" href=\"/{}/rss.xml\">\n",
            section.title, section.dir
        ));
    }

    Ok(links)
}

fn css_link(out: &mut String, href: &str) {
    out.push_str(&format!(
        "<link rel=\"stylesheet\" type=\"text/css\" href=\"{href}\">\n"
    ));
}

fn js_link(out: &mut String, src: &str) {
    out.push_str(&format!("<script src=\"{src}\" defer></script>\n"));
}
