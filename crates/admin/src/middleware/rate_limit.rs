//! Login rate limiting using governor and `tower_governor`.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

const CLIENT_IP_HEADERS: &[&str] = &["fly-client-ip", "cf-connecting-ip", "x-real-ip"];

/// Keys on the proxy's client-IP header, then the first `X-Forwarded-For`
/// hop, then the TCP peer.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        client_ip_from_headers(req.headers())
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

fn client_ip_from_headers(headers: &HeaderMap) -> Option<IpAddr> {
    let parse = |value: &str| value.trim().parse::<IpAddr>().ok();

    CLIENT_IP_HEADERS
        .iter()
        .find_map(|name| headers.get(*name)?.to_str().ok().and_then(parse))
        .or_else(|| {
            headers
                .get("x-forwarded-for")?
                .to_str()
                .ok()?
                .split(',')
                .next()
                .and_then(parse)
        })
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Login form: one token every 12 seconds, burst of 5.
///
/// # Panics
///
/// Never: the builder only rejects zero periods or bursts.
#[must_use]
pub fn login_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(12)
        .burst_size(5)
        .finish()
        .expect("rate limiter config with per_second(12) and burst_size(5) is valid");
    GovernorLayer::new(Arc::new(config))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use axum::http::HeaderValue;
    use tower_governor::key_extractor::KeyExtractor;

    #[test]
    fn proxy_header_wins_over_peer() {
        let mut req = Request::new(());
        req.headers_mut()
            .insert("cf-connecting-ip", HeaderValue::from_static("203.0.113.20"));
        req.extensions_mut()
            .insert(ConnectInfo("10.1.1.1:4000".parse::<SocketAddr>().unwrap()));
        assert_eq!(
            ClientIpKeyExtractor.extract(&req).unwrap(),
            "203.0.113.20".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn no_source_is_an_error() {
        let req = Request::new(());
        assert!(ClientIpKeyExtractor.extract(&req).is_err());
    }
}
