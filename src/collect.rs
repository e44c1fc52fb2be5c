//! Content collection.
//!
//! Walks the source tree, classifies each file by the first matching rule
//! across all sections, and either copies it verbatim (copy rules) or
//! extracts a metadata-bearing item into its section.
//!
//! Files matched by no rule are deliberately ignored: everything in the
//! output tree must be claimed by some rule.

use crate::header::{Header, read_header};
use crate::log;
use crate::model::{DateField, Item, Rule, RuleId, Site};
use crate::stale::copy_if_newer;
use anyhow::{Context, Result, bail};
use chrono::{Datelike, NaiveDate, NaiveTime};
use regex::Captures;
use std::path::Path;
use walkdir::WalkDir;

/// Collect all items into the site graph, copying copy-rule matches on
/// the spot. Walk order is sorted, so collection is deterministic.
pub fn collect(site: &mut Site) -> Result<()> {
    let root = site.root.clone();
    let output = site.output.clone();
    let styles = site.styles.clone();

    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        // The output and style trees live under the root but are never
        // content sources.
        if path.starts_with(&output) || path.starts_with(&styles) {
            continue;
        }
        let rel = match path.strip_prefix(&root)?.to_str() {
            Some(rel) => rel.to_string(),
            None => bail!("non-UTF-8 path: {}", path.display()),
        };

        collect_file(site, &rel)?;
    }

    let total: usize = site.sections.iter().map(|s| s.items.len()).sum();
    log!("collect"; "{} items in {} sections", total, site.sections.len());
    Ok(())
}

/// Match one relative path against every rule in declaration order. The
/// first match wins; later rules, even in other sections, never see it.
fn collect_file(site: &mut Site, rel: &str) -> Result<()> {
    for si in 0..site.sections.len() {
        for ri in 0..site.sections[si].rules.len() {
            let (item, is_copy) = {
                let rule = &site.sections[si].rules[ri];
                let Some(caps) = rule.matcher.captures(rel) else {
                    continue;
                };
                let id = RuleId { section: si, rule: ri };
                (extract(&site.root, rule, id, rel, &caps)?, rule.is_copy())
            };

            if is_copy {
                copy_if_newer(&site.inpath(&item), &site.outpath(&item))?;
            } else {
                site.sections[si].items.push(item);
            }
            return Ok(());
        }
    }
    Ok(())
}

/// Build one item from a matched path: path captures, then the embedded
/// header (header fields win), then date inference, then mandatory-field
/// checks, then output path resolution.
pub fn extract(
    root: &Path,
    rule: &Rule,
    rule_id: RuleId,
    rel: &str,
    caps: &Captures,
) -> Result<Item> {
    let mut item = Item::new(rel, rule_id);

    meta_from_path(&mut item, rule, caps)?;
    if !rule.no_header {
        let header = read_header(&root.join(rel))?;
        merge_header(&mut item, &header);
    }
    infer_date(&mut item)?;

    if !rule.no_header {
        if item.title.is_empty() {
            bail!("item `{rel}` (rule `{}`) has no `title`", rule.raw_in);
        }
        if item.slug.is_empty() {
            bail!("item `{rel}` (rule `{}`) has no `slug`", rule.raw_in);
        }
        if item.id < 0 {
            log!("warn"; "item `{rel}` has no `id`");
        }
    }

    item.outrel = match &rule.out {
        // No output template: the output tree mirrors the input path.
        None => rel.to_string(),
        Some(out) => out.render(&item)?,
    };

    Ok(item)
}

/// Typed dispatch over the matcher's named groups. Numeric captures are
/// fixed-width digit runs, so a parse failure means pathological input
/// (overflow) and is fatal.
fn meta_from_path(item: &mut Item, rule: &Rule, caps: &Captures) -> Result<()> {
    for name in rule.matcher.capture_names().flatten() {
        let Some(m) = caps.name(name) else { continue };
        let text = m.as_str();
        match name {
            "id" => {
                item.id = text
                    .parse()
                    .with_context(|| format!("`{}`: bad id `{text}`", item.rel))?;
            }
            "slug" => item.slug = text.to_string(),
            "title" => item.title = text.to_string(),
            "year" => {
                item.year = Some(
                    text.parse()
                        .with_context(|| format!("`{}`: bad year `{text}`", item.rel))?,
                );
            }
            "month" => {
                item.month = Some(
                    text.parse()
                        .with_context(|| format!("`{}`: bad month `{text}`", item.rel))?,
                );
            }
            "day" => {
                item.day = Some(
                    text.parse()
                        .with_context(|| format!("`{}`: bad day `{text}`", item.rel))?,
                );
            }
            // User placeholder: integers preferred, text fallback.
            _ => {
                let scalar = match text.parse::<i64>() {
                    Ok(n) => crate::model::Scalar::Int(n),
                    Err(_) => crate::model::Scalar::Text(text.to_string()),
                };
                item.user.insert(name.to_string(), scalar);
            }
        }
    }
    Ok(())
}

/// Merge header fields into the item. Header values override anything
/// derived from the path for overlapping names.
fn merge_header(item: &mut Item, header: &Header) {
    if let Some(id) = header.id {
        item.id = id;
    }
    if let Some(title) = &header.title {
        item.title = title.clone();
    }
    if let Some(excerpt) = &header.excerpt {
        item.excerpt = excerpt.clone();
    }
    if let Some(slug) = &header.slug {
        item.slug = slug.clone();
    }
    if let Some(date) = &header.date {
        item.date = DateField::Raw(date.clone());
    }
    if let Some(year) = header.year {
        item.year = Some(year);
    }
    if let Some(month) = header.month {
        item.month = Some(month);
    }
    if let Some(day) = header.day {
        item.day = Some(day);
    }
    if let Some(tags) = &header.tags {
        item.tags = tags.clone();
    }
    item.user.extend(header.user_scalars());
}

/// Resolve the date field.
///
/// An explicit `date:` string must be `YYYY-MM-DD` and overrides any
/// path-derived year/month/day. Without one, a complete year/month/day
/// triple synthesizes midnight UTC. Anything less leaves the item
/// dateless, which is legal.
fn infer_date(item: &mut Item) -> Result<()> {
    match std::mem::replace(&mut item.date, DateField::Unset) {
        DateField::Raw(text) => {
            let date = NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                .with_context(|| format!("`{}`: bad date `{text}` (expected YYYY-MM-DD)", item.rel))?;
            item.year = Some(date.year());
            item.month = Some(date.month());
            item.day = Some(date.day());
            item.date = DateField::Resolved(date.and_time(NaiveTime::MIN).and_utc());
        }
        DateField::Unset => {
            if let (Some(y), Some(m), Some(d)) = (item.year, item.month, item.day) {
                let date = NaiveDate::from_ymd_opt(y, m, d).with_context(|| {
                    format!("`{}`: invalid date {y:04}-{m:02}-{d:02}", item.rel)
                })?;
                item.date = DateField::Resolved(date.and_time(NaiveTime::MIN).and_utc());
            }
        }
        resolved @ DateField::Resolved(_) => item.date = resolved,
    }
    Ok(())
}
