use crate::{UrlError, UrlResult};
use sha2::{Digest, Sha256};
use url::Url;

/// Longest path segment kept verbatim in a save path
const MAX_SEGMENT_LEN: usize = 100;

/// Resolves a raw asset reference against the page it was found on
///
/// # Reference Forms
///
/// | Form | Example | Resolution |
/// |------|---------|------------|
/// | absolute | `https://cdn.example.com/a.js` | used as-is |
/// | protocol-relative | `//cdn.example.com/a.js` | page scheme + reference |
/// | root-relative | `/static/a.js` | page origin + reference |
/// | other-relative | `img/a.png` | page origin + `/` + reference |
///
/// Other-relative references are anchored at the origin, not the page's
/// directory.
///
/// # Examples
///
/// ```
/// use snapkeep::url::resolve_asset_url;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/blog/post").unwrap();
/// let url = resolve_asset_url("img/a.png", &base).unwrap();
/// assert_eq!(url.as_str(), "https://example.com/img/a.png");
/// ```
pub fn resolve_asset_url(raw: &str, base: &Url) -> UrlResult<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlError::Parse("empty reference".to_string()));
    }

    let absolute = if has_http_scheme(raw) {
        raw.to_string()
    } else if raw.starts_with("//") {
        format!("{}:{}", base.scheme(), raw)
    } else if raw.starts_with('/') {
        format!("{}{}", origin_of(base), raw)
    } else if has_scheme(raw) {
        return Err(UrlError::InvalidScheme(raw.to_string()));
    } else {
        format!("{}/{}", origin_of(base), raw)
    };

    let url = Url::parse(&absolute).map_err(|e| UrlError::Parse(format!("{}: {}", absolute, e)))?;
    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }
    Ok(url)
}

/// Resolves an anchor href to an absolute, crawlable URL
///
/// Returns None if the link should be ignored:
/// - `mailto:`, `tel:`, `javascript:` links
/// - fragment-only links (same page anchors)
/// - empty hrefs and anything that does not resolve to HTTP(S)
pub fn resolve_link(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("mailto:") || lower.starts_with("tel:") || lower.starts_with("javascript:")
    {
        return None;
    }

    resolve_asset_url(href, base).ok()
}

/// Computes the path, relative to the snapshot root, a linked page is saved at
///
/// - root path → `index.html`
/// - trailing slash → append `index.html`
/// - anything not already ending in `.html` → append `.html`
///
/// Segments longer than 100 bytes are truncated and tagged with a short hash
/// of the full segment so they stay within filesystem name limits.
///
/// # Examples
///
/// ```
/// use snapkeep::url::save_path_for;
/// use url::Url;
///
/// assert_eq!(save_path_for(&Url::parse("https://a.com/").unwrap()), "index.html");
/// assert_eq!(save_path_for(&Url::parse("https://a.com/docs/").unwrap()), "docs/index.html");
/// assert_eq!(save_path_for(&Url::parse("https://a.com/about").unwrap()), "about.html");
/// ```
pub fn save_path_for(url: &Url) -> String {
    let mut path = url.path().trim_start_matches('/').to_string();

    if path.is_empty() || path.ends_with('/') {
        path.push_str("index.html");
    } else if !path.ends_with(".html") {
        path.push_str(".html");
    }

    path.split('/')
        .map(shorten_segment)
        .collect::<Vec<_>>()
        .join("/")
}

fn shorten_segment(segment: &str) -> String {
    if segment.len() <= MAX_SEGMENT_LEN {
        return segment.to_string();
    }

    let (stem, ext) = match segment.strip_suffix(".html") {
        Some(stem) => (stem, ".html"),
        None => (segment, ""),
    };
    let mut cut = MAX_SEGMENT_LEN.min(stem.len());
    while !stem.is_char_boundary(cut) {
        cut -= 1;
    }
    let digest = hex::encode(Sha256::digest(segment.as_bytes()));
    format!("{}-{}{}", &stem[..cut], &digest[..8], ext)
}

/// `scheme://host[:port]` of an HTTP(S) URL
fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}

fn has_http_scheme(raw: &str) -> bool {
    let lower = raw.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// True for references such as `data:...` or `ftp://...`
fn has_scheme(raw: &str) -> bool {
    match raw.find(':') {
        Some(idx) => {
            let scheme = &raw[..idx];
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
        }
        None => false,
    }
}
