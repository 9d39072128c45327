use scraper::Html;
use url::Url;

use super::{normalize_base, selector, text_of};
use crate::models::{Listing, PageContent};
use crate::plugins::traits::SiteParser;
use crate::Result;

pub const FMKOREA_BASE_URL: &str = "https://www.fmkorea.com";

const PRICE_LABEL: &str = "가격:";

/// The fmkorea hot-deal board. The board has no search, so the first page is
/// fetched and filtered by keyword containment in the title.
pub struct FmKoreaParser {
    base_url: String,
}

impl FmKoreaParser {
    pub fn new() -> Self {
        Self {
            base_url: FMKOREA_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: normalize_base(base_url)?,
        })
    }

    fn absolute(&self, href: &str) -> Option<Url> {
        Url::parse(&self.base_url).ok()?.join(href).ok()
    }
}

impl Default for FmKoreaParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Drops the trailing comment counter, e.g. `"SSD 특가 [12]"` -> `"SSD 특가"`.
fn strip_comment_count(title: &str) -> &str {
    let trimmed = title.trim_end();
    if let Some(body) = trimmed.strip_suffix(']') {
        if let Some(open) = body.rfind('[') {
            let count = &body[open + 1..];
            if !count.is_empty() && count.chars().all(|c| c.is_ascii_digit()) {
                return body[..open].trim_end();
            }
        }
    }
    trimmed
}

/// Document id from `?document_srl=N` or a trailing numeric path segment.
fn document_id(link: &Url) -> Option<String> {
    if let Some((_, srl)) = link.query_pairs().find(|(key, _)| key == "document_srl") {
        if !srl.is_empty() && srl.chars().all(|c| c.is_ascii_digit()) {
            return Some(srl.into_owned());
        }
    }

    link.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .filter(|segment| segment.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
}

impl SiteParser for FmKoreaParser {
    fn name(&self) -> &str {
        "fmkorea"
    }

    fn search_url(&self, _keyword: &str) -> String {
        format!("{}/index.php?mid=hotdeal&page=1", self.base_url)
    }

    fn parse(&self, keyword: &str, page: &PageContent) -> Vec<Listing> {
        let (Some(items), Some(title_sel), Some(info_sel)) = (
            selector(".fm_best_widget li"),
            selector("h3.title a"),
            selector(".hotdeal_info span"),
        ) else {
            return Vec::new();
        };

        let needle = keyword.trim().to_lowercase();
        let document = Html::parse_document(&page.body);
        let mut listings = Vec::new();

        for item in document.select(&items) {
            let Some(anchor) = item.select(&title_sel).next() else {
                continue;
            };
            let title = strip_comment_count(&text_of(anchor)).to_string();
            if title.is_empty() || !title.to_lowercase().contains(&needle) {
                continue;
            }
            let Some(link) = anchor.value().attr("href").and_then(|href| self.absolute(href)) else {
                continue;
            };
            let Some(id) = document_id(&link) else {
                continue;
            };

            let mut price = String::new();
            let mut details = Vec::new();
            for entry in item.select(&info_sel).map(text_of) {
                match entry.strip_prefix(PRICE_LABEL) {
                    Some(value) => price = value.trim().to_string(),
                    None if !entry.is_empty() => details.push(entry),
                    None => {}
                }
            }

            listings.push(
                Listing::new(id, title, link.to_string())
                    .with_price(price)
                    .with_metadata(details.join(" / ")),
            );
        }

        listings
    }
}
