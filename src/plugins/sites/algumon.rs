use scraper::Html;
use url::Url;

use super::{normalize_base, selector, text_of};
use crate::models::{Listing, PageContent};
use crate::plugins::traits::SiteParser;
use crate::Result;

pub const ALGUMON_BASE_URL: &str = "https://www.algumon.com";

/// Keyword search results on algumon, an aggregator of Korean hot-deal boards.
pub struct AlgumonParser {
    base_url: String,
}

impl AlgumonParser {
    pub fn new() -> Self {
        Self {
            base_url: ALGUMON_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: normalize_base(base_url)?,
        })
    }
}

impl Default for AlgumonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteParser for AlgumonParser {
    fn name(&self) -> &str {
        "algumon"
    }

    fn search_url(&self, keyword: &str) -> String {
        match Url::parse(&self.base_url) {
            Ok(mut url) => {
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments.pop_if_empty().push("search").push(keyword);
                }
                url.into()
            }
            Err(_) => format!("{}/search/{}", self.base_url, keyword),
        }
    }

    fn parse(&self, _keyword: &str, page: &PageContent) -> Vec<Listing> {
        let (Some(items), Some(link_sel), Some(price_sel), Some(meta_sel)) = (
            selector("ul.product.post-list > li"),
            selector("a.product-link"),
            selector("small.product-price"),
            selector("small.deal-price-meta-info"),
        ) else {
            return Vec::new();
        };

        let document = Html::parse_document(&page.body);
        let mut listings = Vec::new();

        for item in document.select(&items) {
            let value = item.value();
            let (Some(id), Some(action_uri)) = (
                value.attr("data-post-id").map(str::trim).filter(|v| !v.is_empty()),
                value.attr("data-action-uri").map(str::trim).filter(|v| !v.is_empty()),
            ) else {
                continue;
            };
            let Some(title_link) = item.select(&link_sel).next() else {
                continue;
            };

            let price = item.select(&price_sel).next().map(text_of).unwrap_or_default();
            let metadata: String = item
                .select(&meta_sel)
                .next()
                .map(|meta| meta.text().collect::<String>())
                .unwrap_or_default()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();

            listings.push(
                Listing::new(
                    id,
                    text_of(title_link),
                    format!("{}{}", self.base_url, action_uri),
                )
                .with_price(price)
                .with_metadata(metadata),
            );
        }

        listings
    }
}
