use axum::http::HeaderMap;
use trust::model::Identity;

pub const USER_ID_HEADER: &str = "x-auth-user-id";
pub const EMAIL_HEADER: &str = "x-auth-email";

/// Read the verified principal installed by the upstream session layer.
///
/// The headers are only ever set by the authenticating proxy, so their
/// contents are trusted as-is; absence of both simply yields an anonymous
/// identity, which the guard rejects.
pub fn identity_from_headers(headers: &HeaderMap) -> Identity {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i64>().ok());
    let email = headers
        .get(EMAIL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    Identity { user_id, email }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_headers_mean_anonymous() {
        let identity = identity_from_headers(&HeaderMap::new());
        assert!(identity.is_anonymous());
    }

    #[test]
    fn both_header_kinds_are_read() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("42"));
        headers.insert(EMAIL_HEADER, HeaderValue::from_static("a@b.com"));

        let identity = identity_from_headers(&headers);
        assert_eq!(identity.user_id, Some(42));
        assert_eq!(identity.email.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn malformed_user_id_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("not-a-number"));

        let identity = identity_from_headers(&headers);
        assert_eq!(identity.user_id, None);
        assert!(identity.is_anonymous());
    }
}
