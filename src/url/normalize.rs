use crate::UrlError;
use url::Url;

/// Query parameters that never identify an item
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
];

/// Resolves a link against the page it was found on and canonicalizes it
///
/// # Canonicalization Steps
///
/// 1. Resolve `href` against `base`; reject if malformed
/// 2. Accept only HTTP and HTTPS
/// 3. Lowercase the host (done by the parser)
/// 4. Normalize the path:
///    - Remove dot segments (. and ..)
///    - Collapse repeated slashes
///    - Remove trailing slash (except for root /)
/// 5. Remove the fragment
/// 6. Remove tracking query parameters and sort the rest
///
/// The scheme and host are otherwise kept as they are, since the result is
/// also the URL that gets fetched.
///
/// # Examples
///
/// ```
/// use folio_sweep::url::canonicalize_url;
/// use url::Url;
///
/// let base = Url::parse("https://droit.example.org/publications?page=2").unwrap();
/// let url = canonicalize_url("/ouvrage/traite-de-droit/#resume", &base).unwrap();
/// assert_eq!(url.as_str(), "https://droit.example.org/ouvrage/traite-de-droit");
/// ```
pub fn canonicalize_url(href: &str, base: &Url) -> Result<Url, UrlError> {
    let mut url = base
        .join(href.trim())
        .map_err(|e| UrlError::Parse(format!("{}: {}", href, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    format!("/{}", segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    params.sort_by(|a, b| a.0.cmp(&b.0));

    params
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
