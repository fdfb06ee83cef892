use url::Url;

/// Returns the key the throttle uses to group requests by origin host
///
/// The port is part of the key: two servers on one machine are throttled
/// independently.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use folio_sweep::url::host_key;
///
/// let url = Url::parse("https://Shs.Example.org/publications").unwrap();
/// assert_eq!(host_key(&url), Some("shs.example.org".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/publications").unwrap();
/// assert_eq!(host_key(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port_is_omitted() {
        let url = Url::parse("https://shs.example.org:443/ouvrage/x").unwrap();
        assert_eq!(host_key(&url), Some("shs.example.org".to_string()));
    }

    #[test]
    fn test_explicit_port_is_kept() {
        let a = Url::parse("http://localhost:8001/").unwrap();
        let b = Url::parse("http://localhost:8002/").unwrap();
        assert_ne!(host_key(&a), host_key(&b));
    }

    #[test]
    fn test_same_host_different_paths() {
        let a = Url::parse("https://shs.example.org/publications?page=2").unwrap();
        let b = Url::parse("https://shs.example.org/ouvrage/y").unwrap();
        assert_eq!(host_key(&a), host_key(&b));
    }
}
