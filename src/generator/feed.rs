//! RSS feed generation, one feed per section that opts in.

use crate::log;
use crate::model::{Item, Section, Site};
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use rss::{ChannelBuilder, GuidBuilder, ItemBuilder, validation::Validate};
use std::fs;

// ============================================================================
// Public API
// ============================================================================

/// Write the section's feed to `<output>/<dir>/rss.xml` when enabled.
pub fn write_feed(site: &Site, section: &Section) -> Result<()> {
    if !section.feed {
        return Ok(());
    }

    let channel = build_channel(site, section)?;
    let path = site.output.join(&section.dir).join("rss.xml");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, channel.to_string())
        .with_context(|| format!("failed to write feed to {}", path.display()))?;

    log!("feed"; "{} ({} entries)", path.display(), channel.items().len());
    Ok(())
}

// ============================================================================
// Channel assembly
// ============================================================================

/// Entries go newest-first. Undated items take the epoch default and
/// sink to the bottom rather than failing the feed.
fn created(item: &Item) -> DateTime<Utc> {
    item.date().unwrap_or(DateTime::UNIX_EPOCH)
}

fn build_channel(site: &Site, section: &Section) -> Result<rss::Channel> {
    let mut entries: Vec<&Item> = section.items.iter().collect();
    entries.sort_by_key(|item| std::cmp::Reverse(created(item)));

    let items: Vec<rss::Item> = entries
        .iter()
        .map(|item| to_rss_item(site, item))
        .collect();

    let channel = ChannelBuilder::default()
        .title(&section.title)
        .link(site.absolute_url(&section.url()))
        .description(&site.description)
        .generator("folia".to_string())
        .items(items)
        .build();

    channel
        .validate()
        .map_err(|err| anyhow!("rss validation failed for `{}`: {err}", section.dir))?;
    Ok(channel)
}

fn to_rss_item(site: &Site, item: &Item) -> rss::Item {
    let link = site.absolute_url(&item.url());
    ItemBuilder::default()
        .title(item.title.clone())
        .link(Some(link.clone()))
        .guid(GuidBuilder::default().permalink(true).value(link).build())
        .description((!item.excerpt.is_empty()).then(|| item.excerpt.clone()))
        .pub_date(created(item).to_rfc2822())
        .build()
}
