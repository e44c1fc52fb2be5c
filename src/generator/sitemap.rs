//! Sitemap generation.
//!
//! Emits a flat `sitemap.xml` listing every page the build produces:
//! the site root, each section index, tag listings, and items.
//!
//! # Sitemap Format
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//!   <url>
//!     <loc>https://example.com/</loc>
//!   </url>
//! </urlset>
//! ```

use crate::aggregate::build_tag_index;
use crate::log;
use crate::model::Site;
use anyhow::{Context, Result};
use std::fs;

/// XML namespace for sitemap
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

// ============================================================================
// Public API
// ============================================================================

/// Write `<output>/sitemap.xml` covering every generated page.
pub fn write_sitemap(site: &Site) -> Result<()> {
    Sitemap::from_site(site).write(site)
}

// ============================================================================
// Sitemap Implementation
// ============================================================================

/// Flat list of absolute URL entries.
struct Sitemap {
    urls: Vec<String>,
}

impl Sitemap {
    fn from_site(site: &Site) -> Self {
        let mut urls = vec![site.absolute_url("/")];

        for section in &site.sections {
            urls.push(site.absolute_url(&section.url()));
            urls.push(site.absolute_url(&section.tags_url()));
            for (tag, _) in build_tag_index(&section.items) {
                urls.push(site.absolute_url(&section.tag_url(&tag)));
            }
            for item in &section.items {
                urls.push(site.absolute_url(&item.url()));
            }
        }

        Self { urls }
    }

    /// Generate sitemap XML string.
    fn into_xml(self) -> String {
        let mut xml = String::with_capacity(4096);

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(&format!(r#"<urlset xmlns="{SITEMAP_NS}">"#));
        xml.push('\n');

        for url in self.urls {
            xml.push_str("  <url>\n");
            xml.push_str(&format!("    <loc>{}</loc>\n", escape_xml(&url)));
            xml.push_str("  </url>\n");
        }

        xml.push_str("</urlset>\n");
        xml
    }

    fn write(self, site: &Site) -> Result<()> {
        // A site with no sections still gets an output tree and a sitemap.
        fs::create_dir_all(&site.output)
            .with_context(|| format!("failed to create {}", site.output.display()))?;
        let path = site.output.join("sitemap.xml");
        let count = self.urls.len();
        fs::write(&path, self.into_xml())
            .with_context(|| format!("failed to write sitemap to {}", path.display()))?;

        log!("sitemap"; "{} ({} urls)", path.display(), count);
        Ok(())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Escape special XML characters.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

// ============================================================================
// Tests
// ============================================================================
