use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use std::net::SocketAddr;

use crate::axum_http::error_responses::AppError;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Caller address used to key anonymous trial usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

/// First `X-Forwarded-For` hop, else the socket peer.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty());

    match forwarded {
        Some(hop) => Some(hop.to_string()),
        None => peer.map(|addr| addr.ip().to_string()),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        resolve_client_ip(&parts.headers, peer)
            .map(ClientIp)
            .ok_or_else(|| AppError::BadRequest("Unable to determine client address".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some(SocketAddr::from(([10, 0, 0, 9], 51234)))
    }

    #[test]
    fn first_forwarded_hop_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            X_FORWARDED_FOR,
            HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1, 10.0.0.2"),
        );
        assert_eq!(
            resolve_client_ip(&headers, peer()),
            Some("203.0.113.7".to_string())
        );
    }

    #[test]
    fn falls_back_to_peer_address() {
        let mut headers = HeaderMap::new();
        assert_eq!(resolve_client_ip(&headers, peer()), Some("10.0.0.9".to_string()));

        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static(" , 10.0.0.1"));
        assert_eq!(resolve_client_ip(&headers, peer()), Some("10.0.0.9".to_string()));
    }

    #[test]
    fn no_source_means_no_address() {
        assert_eq!(resolve_client_ip(&HeaderMap::new(), None), None);
    }
}
