use serde::{Deserialize, Serialize};

/// One parsed deal entry from a site's listing page.
///
/// Identity is the `id` field alone; two listings with the same id are the
/// same deal even if title or price changed between fetches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub metadata: String,
}

impl Listing {
    pub fn new(id: impl Into<String>, title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            link: link.into(),
            price: String::new(),
            metadata: String::new(),
        }
    }

    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = price.into();
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = metadata.into();
        self
    }

    /// Listings are the same deal when their ids match; title and price may drift.
    pub fn same_deal(&self, other: &Listing) -> bool {
        self.id == other.id
    }
}

/// Raw body of a fetched listing page, handed to a site parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    pub url: String,
    pub body: String,
    pub via_proxy: Option<String>,
}

impl PageContent {
    pub fn direct(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
            via_proxy: None,
        }
    }
}
