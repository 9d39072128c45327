use crate::models::{Listing, PageContent};

/// Extracts listings from one deal site's pages.
///
/// Implementations never fail: markup they do not recognize yields an empty
/// list, and the caller decides how loudly to report it.
pub trait SiteParser: Send + Sync {
    /// Stable identifier, also used as the state file name for the site.
    fn name(&self) -> &str;

    /// Page to fetch when watching `keyword` on this site.
    fn search_url(&self, keyword: &str) -> String;

    /// Listings on `page` relevant to `keyword`, newest first.
    fn parse(&self, keyword: &str, page: &PageContent) -> Vec<Listing>;
}
