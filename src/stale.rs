//! Modification-time staleness checks.
//!
//! The cache-invalidation scheme is purely timestamp based and
//! conservative: an unnecessary rebuild is always safe, a skipped one is
//! not, so every comparison errs toward "rebuild".

use crate::model::{Item, Site};
use crate::pattern::OutPattern;
use crate::style::template_glob;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::SystemTime;

/// Is `a` strictly newer than `b`? A missing `b` counts as stale (true);
/// a missing `a` is a broken invariant and fatal.
pub fn newer(a: &Path, b: &Path) -> Result<bool> {
    let a_time = mtime(a).with_context(|| format!("failed to stat {}", a.display()))?;
    let Ok(b_time) = mtime(b) else {
        return Ok(true);
    };
    Ok(a_time > b_time)
}

fn mtime(path: &Path) -> std::io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}

/// Is any file matching `pattern` newer than `b`?
pub fn newer_glob(pattern: &str, b: &Path) -> Result<bool> {
    let entries = glob::glob(pattern)
        .with_context(|| format!("bad glob expression `{pattern}`"))?;
    for entry in entries {
        let path = entry.with_context(|| format!("expanding glob `{pattern}`"))?;
        if newer(&path, b)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Copy `src` over `dst` when `dst` is missing or older. Used for
/// copy-rule matches and style assets.
pub fn copy_if_newer(src: &Path, dst: &Path) -> Result<()> {
    if !newer(src, dst)? {
        return Ok(());
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::copy(src, dst)
        .with_context(|| format!("failed to copy {} to {}", src.display(), dst.display()))?;
    Ok(())
}

/// Decide whether an item's output must be regenerated: the source, any
/// template of the item's style, or any declared dependency being newer
/// than the output forces a render.
pub fn needs_update(site: &Site, item: &Item) -> Result<bool> {
    let outpath = site.outpath(item);

    if newer(&site.inpath(item), &outpath)? {
        return Ok(true);
    }

    // A style edit invalidates every item rendered with that style.
    let section = site.section_of(item.rule);
    if newer_glob(&template_glob(&site.styles, &section.style), &outpath)? {
        return Ok(true);
    }

    // Per-item dependency globs, rendered through the output templating
    // engine so a dependency can vary with the item's own fields.
    for dep in &site.rule(item.rule).dependencies {
        let tpl = OutPattern::compile(dep, &section.dir)?;
        let expr = site.root.join(tpl.render(item)?);
        let expr = expr
            .to_str()
            .with_context(|| format!("non-UTF-8 dependency glob for `{}`", item.rel))?;
        if newer_glob(expr, &outpath)? {
            return Ok(true);
        }
    }

    Ok(false)
}
