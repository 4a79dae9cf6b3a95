//! Request-derived caller identity.
//!
//! The caller's user id arrives in `X-User-Id`, set by the authenticating
//! gateway in front of this service.
//!
//! The voter IP is the peer address unless `TRUSTED_PROXY_HOPS` says how many
//! reverse proxies sit in front. Then it is the `X-Forwarded-For` entry that
//! many hops from the right, the one the outermost trusted proxy appended.
//! Entries further left are whatever the client sent and are ignored.

use std::net::{IpAddr, SocketAddr};

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use uuid::Uuid;

use crate::error::WebError;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

pub struct Caller(pub Uuid);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| WebError::Unauthorized("Missing X-User-Id header".to_string()))?;

        raw.trim()
            .parse()
            .map(Caller)
            .map_err(|_| WebError::BadRequest("X-User-Id must be a UUID".to_string()))
    }
}

pub struct ClientIp(pub IpAddr);

#[async_trait]
impl FromRequestParts<AppState> for ClientIp {
    type Rejection = WebError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(ip) = forwarded_ip(&parts.headers, state.trusted_proxy_hops) {
            return Ok(ClientIp(ip));
        }

        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| ClientIp(addr.ip()))
            .ok_or_else(|| WebError::BadRequest("Cannot determine client address".to_string()))
    }
}

/// Client address as seen by the outermost of `trusted_hops` proxies.
///
/// With fewer entries than trusted hops every entry was written by a trusted
/// proxy, so the leftmost one is used.
fn forwarded_ip(headers: &HeaderMap, trusted_hops: usize) -> Option<IpAddr> {
    if trusted_hops == 0 {
        return None;
    }

    let hops: Vec<&str> = headers
        .get(FORWARDED_FOR_HEADER)?
        .to_str()
        .ok()?
        .split(',')
        .map(str::trim)
        .collect();

    hops.get(hops.len().saturating_sub(trusted_hops))?.parse().ok()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_forwarded_header_ignored_without_trusted_proxies() {
        let headers = forwarded("203.0.113.5, 198.51.100.9");

        assert_eq!(forwarded_ip(&headers, 0), None);
    }

    #[test]
    fn test_spoofed_leading_hops_do_not_change_the_address() {
        for n in 1..=12 {
            let value = format!("203.0.113.{n}, 198.51.100.9");
            let mut headers = HeaderMap::new();
            headers.insert(
                FORWARDED_FOR_HEADER,
                HeaderValue::from_str(&value).unwrap(),
            );

            assert_eq!(forwarded_ip(&headers, 1), "198.51.100.9".parse().ok());
        }
    }

    #[test]
    fn test_counts_trusted_hops_from_the_right() {
        let headers = forwarded("1.1.1.1, 203.0.113.5, 10.0.0.1");

        assert_eq!(forwarded_ip(&headers, 2), "203.0.113.5".parse().ok());
        assert_eq!(forwarded_ip(&headers, 5), "1.1.1.1".parse().ok());
    }

    #[test]
    fn test_garbage_forwarded_header_is_ignored() {
        assert_eq!(forwarded_ip(&forwarded("unknown"), 1), None);
        assert_eq!(forwarded_ip(&HeaderMap::new(), 1), None);
    }
}
