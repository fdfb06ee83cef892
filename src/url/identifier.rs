use crate::UrlError;
use url::Url;

/// Derives the storage identifier of an item from its canonical URL
///
/// The identifier is the URL path without its leading and trailing slashes.
/// It is the join key against the store, so the same item must always map to
/// the same identifier, whatever query string or fragment its link carried.
///
/// # Examples
///
/// ```
/// use folio_sweep::url::identifier_from_url;
/// use url::Url;
///
/// let url = Url::parse("https://droit.example.org/ouvrage/traite-de-droit/").unwrap();
/// assert_eq!(identifier_from_url(&url).unwrap(), "ouvrage/traite-de-droit");
/// ```
pub fn identifier_from_url(url: &Url) -> Result<String, UrlError> {
    let identifier = url.path().trim_matches('/');
    if identifier.is_empty() {
        return Err(UrlError::EmptyPath(url.to_string()));
    }
    Ok(identifier.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::canonicalize_url;

    #[test]
    fn test_identifier_ignores_query_and_fragment() {
        let a = Url::parse("https://shs.example.org/ouvrage/x?from=list#top").unwrap();
        let b = Url::parse("https://shs.example.org/ouvrage/x").unwrap();
        assert_eq!(identifier_from_url(&a).unwrap(), "ouvrage/x");
        assert_eq!(identifier_from_url(&a).unwrap(), identifier_from_url(&b).unwrap());
    }

    #[test]
    fn test_identifier_is_stable_across_link_forms() {
        let base = Url::parse("https://shs.example.org/publications?page=3").unwrap();
        let forms = [
            "/ouvrage/le-livre",
            "/ouvrage/le-livre/",
            "ouvrage/le-livre",
            "https://shs.example.org//ouvrage/./le-livre/#resume",
        ];

        for href in forms {
            let url = canonicalize_url(href, &base).unwrap();
            assert_eq!(identifier_from_url(&url).unwrap(), "ouvrage/le-livre", "{}", href);
        }
    }

    #[test]
    fn test_root_has_no_identifier() {
        let url = Url::parse("https://shs.example.org/").unwrap();
        assert!(matches!(identifier_from_url(&url), Err(UrlError::EmptyPath(_))));
    }
}
