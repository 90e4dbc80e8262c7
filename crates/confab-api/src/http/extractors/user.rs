//! Caller identity taken from the `X-User-Id` header.
//!
//! Authentication happens upstream; this service only scopes conversations
//! by the id it is handed.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

pub const USER_ID_HEADER: &str = "x-user-id";

pub const ANONYMOUS: &str = "anonymous";

/// The user a request acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: String,
}

impl UserContext {
    fn from_parts(parts: &Parts) -> Self {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(ANONYMOUS);
        Self {
            user_id: user_id.to_string(),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for UserContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header("X-User-Id", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_reads_header() {
        assert_eq!(UserContext::from_parts(&parts(Some(" u-42 "))).user_id, "u-42");
    }

    #[test]
    fn test_missing_or_blank_is_anonymous() {
        assert_eq!(UserContext::from_parts(&parts(None)).user_id, ANONYMOUS);
        assert_eq!(UserContext::from_parts(&parts(Some("  "))).user_id, ANONYMOUS);
    }
}
