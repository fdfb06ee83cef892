use url::Url;

/// Builds the URL of listing page `page` from a section base URL
///
/// The page parameter is replaced in place if the base URL already carries
/// it, appended otherwise. All other parameters are kept in their order.
///
/// # Examples
///
/// ```
/// use folio_sweep::url::build_page_url;
/// use url::Url;
///
/// let base = Url::parse("https://droit.example.org/publications?lang=fr&tab=ouvrages").unwrap();
/// let page = build_page_url(&base, "page", 3);
/// assert_eq!(page.as_str(), "https://droit.example.org/publications?lang=fr&tab=ouvrages&page=3");
/// ```
pub fn build_page_url(base: &Url, parameter: &str, page: u32) -> Url {
    let mut params: Vec<(String, String)> = base
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let value = page.to_string();
    match params.iter().position(|(key, _)| key == parameter) {
        Some(index) => {
            params[index].1 = value;
            let mut seen = 0;
            params.retain(|(key, _)| {
                if key != parameter {
                    return true;
                }
                seen += 1;
                seen == 1
            });
        }
        None => params.push((parameter.to_string(), value)),
    }

    let mut url = base.clone();
    url.set_fragment(None);
    url.query_pairs_mut().clear().extend_pairs(params);
    url
}

/// Returns the URL of the first page a section run fetches
///
/// Page 1 is the base URL itself.
pub fn listing_page_url(base: &Url, parameter: &str, page: u32) -> Url {
    if page <= 1 {
        base.clone()
    } else {
        build_page_url(base, parameter, page)
    }
}
