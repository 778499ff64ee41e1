//! Session cookie extraction.

use axum::http::HeaderMap;
use axum::http::header::COOKIE;

/// Name of the session cookie issued by the OAuth2 callback.
pub const SESSION_COOKIE: &str = "session";

/// Pull the session cookie value out of the request headers.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?.to_str().ok()?;
    for pair in header.split(';') {
        let Some((name, value)) = pair.trim().split_once('=') else {
            continue;
        };
        if name == SESSION_COOKIE {
            return Some(value.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extracts_session_cookie() {
        let headers = headers_with("session=abc123");
        assert_eq!(session_cookie(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_extracts_among_other_cookies() {
        let headers = headers_with("theme=dark; session=abc123; lang=en");
        assert_eq!(session_cookie(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_missing_cookie() {
        let headers = headers_with("theme=dark");
        assert_eq!(session_cookie(&headers), None);
        assert_eq!(session_cookie(&HeaderMap::new()), None);
    }
}
