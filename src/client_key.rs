//! Client identification for rate limiting.
//!
//! A request is keyed on its client IP. Behind reverse proxies the transport
//! peer is the proxy itself, so the address is taken from `X-Forwarded-For`
//! according to how many proxy hops are trusted.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use axum::extract::ConnectInfo;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{HeaderMap, Request};
use tracing::debug;

use crate::error::GatewayError;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Key used when neither the peer nor any forwarded address is known.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Identifier that partitions rate-limit counters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn unknown() -> Self {
        Self(UNKNOWN_CLIENT.to_string())
    }
}

impl From<IpAddr> for ClientKey {
    fn from(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }
}

impl From<&str> for ClientKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How far to trust the `X-Forwarded-For` chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustProxy {
    /// Ignore forwarded headers; use the transport peer.
    Disabled,
    /// Trust this many proxies in front of the server. The client is the
    /// address that many hops back from the peer.
    Hops(u32),
    /// Trust every proxy; the client is the left-most forwarded address.
    All,
}

impl Default for TrustProxy {
    fn default() -> Self {
        TrustProxy::Hops(1)
    }
}

impl FromStr for TrustProxy {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(TrustProxy::All),
            "false" | "0" => Ok(TrustProxy::Disabled),
            other => other
                .parse::<u32>()
                .map(TrustProxy::Hops)
                .map_err(|_| GatewayError::InvalidTrustProxy(s.to_string())),
        }
    }
}

impl fmt::Display for TrustProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustProxy::Disabled => f.write_str("false"),
            TrustProxy::Hops(n) => write!(f, "{n}"),
            TrustProxy::All => f.write_str("true"),
        }
    }
}

/// Derives a [`ClientKey`] from a request and the trust-proxy policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientKeyResolver {
    trust: TrustProxy,
}

impl ClientKeyResolver {
    pub fn new(trust: TrustProxy) -> Self {
        Self { trust }
    }

    /// Resolve the client address from the peer and the request headers.
    ///
    /// Never fails on a bad header: anything unusable in the forwarded chain
    /// falls back to the peer address.
    pub fn resolve(&self, peer: Option<IpAddr>, headers: &HeaderMap) -> Option<IpAddr> {
        let peer = peer.map(|ip| ip.to_canonical());

        let hops = match self.trust {
            TrustProxy::Disabled | TrustProxy::Hops(0) => return peer,
            TrustProxy::Hops(n) => n as usize,
            TrustProxy::All => usize::MAX,
        };

        let Some(raw) = headers.get(X_FORWARDED_FOR) else {
            return peer;
        };
        let Ok(raw) = raw.to_str() else {
            debug!("Non-ASCII X-Forwarded-For, using peer address");
            return peer;
        };

        // Walk right to left: the closest proxy appended the last entry.
        let chain: Vec<&str> = raw.split(',').map(str::trim).collect();
        let idx = chain.len().saturating_sub(hops.min(chain.len()));
        let candidate = chain[idx];

        match parse_forwarded_addr(candidate) {
            Some(ip) => Some(ip.to_canonical()),
            None => {
                debug!(
                    entry = %candidate,
                    "Malformed X-Forwarded-For entry, using peer address"
                );
                peer
            }
        }
    }

    /// Key for a request, using the peer address found by [`peer_ip`].
    pub fn key_for<B>(&self, req: &Request<B>) -> ClientKey {
        self.resolve(peer_ip(req), req.headers())
            .map(ClientKey::from)
            .unwrap_or_else(ClientKey::unknown)
    }
}

/// Transport peer address of a request, when the server recorded one.
///
/// Reads [`ConnectInfo`] and, like axum's own extractor, falls back to a
/// [`MockConnectInfo`] installed in front of the router.
pub fn peer_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    let extensions = req.extensions();
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
        .or_else(|| {
            extensions
                .get::<MockConnectInfo<SocketAddr>>()
                .map(|MockConnectInfo(addr)| *addr)
        })
        .map(|addr| addr.ip().to_canonical())
}

// Accepts "1.2.3.4", "1.2.3.4:80", "::1" and "[::1]:80".
fn parse_forwarded_addr(entry: &str) -> Option<IpAddr> {
    if entry.is_empty() {
        return None;
    }
    entry
        .parse::<IpAddr>()
        .ok()
        .or_else(|| entry.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}
