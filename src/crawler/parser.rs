//! HTML parser for extracting asset references and same-host links
//!
//! Parsing is synchronous and returns owned data only, so no parsed document
//! is ever held across an `.await`.

use crate::crawler::classifier::AssetCategory;
use crate::url::{is_same_host, normalize_page_url, resolve_link, save_path_for};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Selector group for every asset-bearing element, matched in document order
const ASSET_SELECTOR: &str = r#"img[src], link[rel="stylesheet"][href], script[src]"#;

/// An asset reference as written in the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    pub category: AssetCategory,
    /// Attribute value exactly as found in the document
    pub raw: String,
}

/// A page waiting to be fetched and saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTask {
    /// Absolute URL to fetch
    pub url: Url,
    /// Visited-set key (see `normalize_page_url`)
    pub key: String,
    /// Where the page is saved, relative to the snapshot root
    pub save_path: String,
}

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Asset references in document order, repeats included
    pub assets: Vec<AssetRef>,

    /// Same-host links in document order, one per visited-set key
    pub links: Vec<PageTask>,
}

/// Parses HTML content and extracts asset references and crawlable links
///
/// # Asset Extraction
///
/// - `<img src>` → image
/// - `<link rel="stylesheet" href>` → stylesheet
/// - `<script src>` → script
///
/// # Link Extraction
///
/// `<a href>` values are resolved against `base_url`; `mailto:`, `tel:`,
/// `javascript:` and fragment-only links are dropped, as is anything whose
/// host differs from `hostname`. Links that normalize to the same key are
/// kept once.
///
/// # Example
///
/// ```
/// use snapkeep::crawler::parse_page;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_page(html, &base_url, "example.com");
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].save_path, "page.html");
/// ```
pub fn parse_page(html: &str, base_url: &Url, hostname: &str) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        assets: extract_assets(&document),
        links: extract_links(&document, base_url, hostname),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_assets(document: &Html) -> Vec<AssetRef> {
    let Ok(selector) = Selector::parse(ASSET_SELECTOR) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| {
            let category = category_of(&element)?;
            let raw = element.value().attr(category.attribute())?.trim();
            if raw.is_empty() {
                return None;
            }
            Some(AssetRef {
                category,
                raw: raw.to_string(),
            })
        })
        .collect()
}

fn category_of(element: &ElementRef) -> Option<AssetCategory> {
    match element.value().name() {
        "img" => Some(AssetCategory::Image),
        "link" => Some(AssetCategory::Stylesheet),
        "script" => Some(AssetCategory::Script),
        _ => None,
    }
}

fn extract_links(document: &Html, base_url: &Url, hostname: &str) -> Vec<PageTask> {
    let Ok(a_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&a_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_link(href, base_url) else {
            continue;
        };
        if !is_same_host(&url, hostname) {
            continue;
        }

        let key = normalize_page_url(url.as_str());
        if seen.insert(key.clone()) {
            links.push(PageTask {
                save_path: save_path_for(&url),
                url,
                key,
            });
        }
    }

    links
}
