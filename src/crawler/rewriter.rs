//! Streaming rewrite of asset references to their local copies

use crate::crawler::classifier::AssetCategory;
use crate::{Result, SnapError};
use lol_html::html_content::Element;
use lol_html::{element, HandlerResult, HtmlRewriter, Settings};
use scraper::{ElementRef, Html};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Local hrefs keyed by element category and the parsed reference value
pub type Replacements = HashMap<(AssetCategory, String), String>;

/// Rewrites asset-bearing attributes in `html` using `replacements`
///
/// An element is rewritten only when its category and reference are both in
/// the map, so a reference skipped for one category stays untouched on that
/// element even if another category saved it. Everything else in the document
/// is left as it was.
///
/// Returns the rewritten document and the number of attributes changed.
pub fn rewrite_asset_refs(
    html: &str,
    page_url: &str,
    replacements: &Replacements,
) -> Result<(String, usize)> {
    if replacements.is_empty() {
        return Ok((html.to_string(), 0));
    }

    let mut output = Vec::with_capacity(html.len());
    let rewrite_count = AtomicUsize::new(0);

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("img[src]", |el| {
                    rewrite_attr(el, AssetCategory::Image, replacements, &rewrite_count)
                }),
                element!(r#"link[rel="stylesheet"][href]"#, |el| {
                    rewrite_attr(el, AssetCategory::Stylesheet, replacements, &rewrite_count)
                }),
                element!("script[src]", |el| {
                    rewrite_attr(el, AssetCategory::Script, replacements, &rewrite_count)
                }),
            ],
            ..Settings::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );

    rewriter
        .write(html.as_bytes())
        .map_err(|e| rewrite_error(page_url, e))?;
    rewriter.end().map_err(|e| rewrite_error(page_url, e))?;

    let result = String::from_utf8(output).map_err(|e| rewrite_error(page_url, e))?;
    Ok((result, rewrite_count.load(Ordering::Relaxed)))
}

fn rewrite_attr(
    el: &mut Element,
    category: AssetCategory,
    replacements: &Replacements,
    rewrite_count: &AtomicUsize,
) -> HandlerResult {
    let attr = category.attribute();
    let Some(value) = el.get_attribute(attr) else {
        return Ok(());
    };

    // Attribute values arrive undecoded; the map is keyed by decoded values
    let key = (category, decode_attribute_value(&value).trim().to_string());
    if let Some(local) = replacements.get(&key) {
        el.set_attribute(attr, local)?;
        rewrite_count.fetch_add(1, Ordering::Relaxed);
    }
    Ok(())
}

/// Decodes character references in a raw attribute value
///
/// Runs the value through the same HTML parser that extracted the asset
/// references, so both sides agree on every named and numeric entity.
fn decode_attribute_value(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let fragment = Html::parse_fragment(&format!(
        r#"<a data-ref="{}"></a>"#,
        raw.replace('"', "&quot;")
    ));
    fragment
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "a")
        .and_then(|el| el.value().attr("data-ref"))
        .map(str::to_string)
        .unwrap_or_else(|| raw.to_string())
}

fn rewrite_error(page_url: &str, e: impl std::fmt::Display) -> SnapError {
    SnapError::Rewrite {
        url: page_url.to_string(),
        message: e.to_string(),
    }
}
