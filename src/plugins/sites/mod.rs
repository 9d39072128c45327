// Site parser implementations
pub mod algumon;
pub mod fmkorea;

pub use algumon::AlgumonParser;
pub use fmkorea::FmKoreaParser;

use scraper::{ElementRef, Selector};

fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            tracing::error!(css, "invalid selector: {:?}", e);
            None
        }
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn normalize_base(base_url: &str) -> crate::Result<String> {
    let parsed = url::Url::parse(base_url).map_err(|e| crate::AppError::Plugin {
        plugin_type: "site".to_string(),
        message: format!("invalid base url {}: {}", base_url, e),
    })?;
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}
