use crate::{UrlError, UrlResult};
use url::Url;

/// Extracts the lowercase hostname from a URL
///
/// The port is not part of the hostname, so `http://127.0.0.1:8080/` and
/// `http://127.0.0.1:9090/` share the hostname `127.0.0.1`.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use snapkeep::url::extract_hostname;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_hostname(&url), Some("example.com".to_string()));
/// ```
pub fn extract_hostname(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if `url` lives on `hostname`
pub fn is_same_host(url: &Url, hostname: &str) -> bool {
    extract_hostname(url).as_deref() == Some(hostname)
}

/// Parses and validates a seed URL submitted for archiving
///
/// The URL must parse, use HTTP or HTTPS, and carry a host.
pub fn parse_seed_url(raw: &str) -> UrlResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(format!("'{}': {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlError::MissingHost),
    }
}
