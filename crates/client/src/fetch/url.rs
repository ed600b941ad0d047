//! URL canonicalization and resource identity for rating pages.

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize a URL string so every spelling of a page fetches and keys
/// the same way.
///
/// Trims whitespace, defaults the scheme to `https`, lowercases the host and
/// drops the fragment. The query string is kept in its original order.
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let with_scheme = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };
    let mut parsed = url::Url::parse(&with_scheme).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(UrlError::UnsupportedScheme(parsed.scheme().to_string()));
    }

    if let Some(host) = parsed.host_str().map(str::to_lowercase) {
        parsed.set_host(Some(&host)).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }
    parsed.set_fragment(None);

    Ok(parsed)
}

/// Identity of the rated resource behind a paginated URL.
///
/// The canonical URL with every `page_param` query parameter removed, so
/// every page of the same listing shares one cache key.
pub fn resource_id(input: &str, page_param: &str) -> Result<String, UrlError> {
    let mut url = canonicalize(input)?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| name != page_param)
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else if kept.len() != url.query_pairs().count() {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    Ok(url.to_string())
}
