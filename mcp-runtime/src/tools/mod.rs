//! One module per Search Console tool: schema, argument parsing and rendering.

pub mod list_sites;
pub mod search_analytics;
pub mod sitemaps;
pub mod url_inspection;
