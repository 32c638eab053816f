use http::HeaderMap;

/// Pull a single cookie value out of the raw `Cookie` header. No cookie jar
/// crate in the dependency stack for this — the gateway only ever needs one
/// named value, never the full set.
pub fn read(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(http::header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        if k == name && !v.is_empty() {
            Some(v.to_string())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_cookie(raw: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(http::header::COOKIE, raw.parse().unwrap());
        h
    }

    #[test]
    fn finds_named_cookie_among_several() {
        let h = headers_with_cookie("foo=bar; SESSION=abc123; other=x");
        assert_eq!(read(&h, "SESSION"), Some("abc123".to_string()));
    }

    #[test]
    fn missing_cookie_header_returns_none() {
        let h = HeaderMap::new();
        assert_eq!(read(&h, "SESSION"), None);
    }

    #[test]
    fn missing_named_cookie_returns_none() {
        let h = headers_with_cookie("foo=bar");
        assert_eq!(read(&h, "SESSION"), None);
    }

    #[test]
    fn empty_cookie_value_is_treated_as_absent() {
        let h = headers_with_cookie("SESSION=");
        assert_eq!(read(&h, "SESSION"), None);
    }
}
