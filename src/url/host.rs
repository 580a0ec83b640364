use url::Url;

/// Extracts the lowercase host of a URL, including a non-default port
///
/// # Examples
///
/// ```
/// use url::Url;
/// use policy_crawler::url::extract_host;
///
/// let url = Url::parse("https://SEC.gov.ph/path").unwrap();
/// assert_eq!(extract_host(&url), Some("sec.gov.ph".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(extract_host(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

/// Returns true if both URLs share scheme, host and port
///
/// Discovered links are only followed when they stay on the source's site.
pub fn same_site(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str().map(str::to_lowercase) == b.host_str().map(str::to_lowercase)
        && a.port_or_known_default() == b.port_or_known_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_host() {
        let url = Url::parse("https://pse.com.ph/").unwrap();
        assert_eq!(extract_host(&url), Some("pse.com.ph".to_string()));
    }

    #[test]
    fn test_default_port_omitted() {
        let url = Url::parse("https://example.com:443/").unwrap();
        assert_eq!(extract_host(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_same_site() {
        let base = Url::parse("https://sec.gov.ph/").unwrap();
        let inner = Url::parse("https://SEC.gov.ph/memos/2024").unwrap();
        let other = Url::parse("https://bsp.gov.ph/").unwrap();
        let insecure = Url::parse("http://sec.gov.ph/").unwrap();

        assert!(same_site(&base, &inner));
        assert!(!same_site(&base, &other));
        assert!(!same_site(&base, &insecure));
    }

    #[test]
    fn test_same_site_respects_port() {
        let a = Url::parse("http://127.0.0.1:8080/").unwrap();
        let b = Url::parse("http://127.0.0.1:9090/").unwrap();
        assert!(!same_site(&a, &b));
    }
}
