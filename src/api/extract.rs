//! Request extractors for caller identity and client address.
//!
//! Identity comes from the auth proxy in front of this service, which
//! verifies the session and forwards the result as headers.

use std::net::SocketAddr;

use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::domain::aggregates::{CustomerContext, Role};
use crate::CommerceError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_ROLES_HEADER: &str = "x-user-roles";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim).filter(|v| !v.is_empty())
}

pub fn customer_from_headers(headers: &HeaderMap) -> Result<CustomerContext, CommerceError> {
    let user_id = header(headers, USER_ID_HEADER)
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or(CommerceError::Unauthenticated)?;
    let email = header(headers, USER_EMAIL_HEADER).ok_or(CommerceError::Unauthenticated)?.to_string();
    let roles = header(headers, USER_ROLES_HEADER)
        .map(|raw| {
            raw.split(',')
                .filter(|r| !r.trim().is_empty())
                .map(|r| r.parse::<Role>().map_err(|_| CommerceError::Unauthenticated))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        .unwrap_or_else(|| vec![Role::User]);
    Ok(CustomerContext { user_id, email, roles })
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CustomerContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(customer_from_headers(&parts.headers)?)
    }
}

/// Caller address as reported to the payment gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientIp(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = header(&parts.headers, "x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string());
        let peer = || parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(ClientIp(forwarded.or_else(peer).unwrap_or_else(|| "127.0.0.1".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn test_identity_from_proxy_headers() {
        let id = Uuid::new_v4().to_string();
        let caller = customer_from_headers(&headers(&[
            (USER_ID_HEADER, id.as_str()),
            (USER_EMAIL_HEADER, "staff@example.vn"),
            (USER_ROLES_HEADER, "ROLE_USER, ROLE_STAFF"),
        ]))
        .unwrap();
        assert!(caller.is_staff());
        assert_eq!(caller.email, "staff@example.vn");
    }

    #[test]
    fn test_missing_or_bad_identity_is_unauthenticated() {
        assert!(matches!(customer_from_headers(&HeaderMap::new()), Err(CommerceError::Unauthenticated)));
        let bad = headers(&[(USER_ID_HEADER, "not-a-uuid"), (USER_EMAIL_HEADER, "a@b.vn")]);
        assert!(matches!(customer_from_headers(&bad), Err(CommerceError::Unauthenticated)));
    }

    #[test]
    fn test_roles_default_to_user() {
        let caller = customer_from_headers(&headers(&[
            (USER_ID_HEADER, "0190a8c6-7b1e-7cc0-9d4e-1f2a3b4c5d6e"),
            (USER_EMAIL_HEADER, "a@b.vn"),
        ]))
        .unwrap();
        assert_eq!(caller.roles, vec![Role::User]);
    }
}
