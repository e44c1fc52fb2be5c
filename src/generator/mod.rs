//! Non-page outputs derived from the collected site: feeds and the
//! sitemap.

pub mod feed;
pub mod sitemap;
