/// Normalizes a page URL into its visited-set key
///
/// # Normalization Steps
///
/// 1. Remove the fragment (everything from the first `#`)
/// 2. Remove trailing slashes
///
/// Nothing else is touched: scheme, host case, query strings and dot segments
/// are left exactly as the caller produced them. Stripping every trailing
/// slash (not just one) keeps the function idempotent.
///
/// # Examples
///
/// ```
/// use snapkeep::url::normalize_page_url;
///
/// assert_eq!(normalize_page_url("https://example.com/docs/#intro"), "https://example.com/docs");
/// assert_eq!(normalize_page_url("https://example.com/"), "https://example.com");
/// ```
pub fn normalize_page_url(url: &str) -> String {
    let without_fragment = match url.find('#') {
        Some(idx) => &url[..idx],
        None => url,
    };
    without_fragment.trim_end_matches('/').to_string()
}
