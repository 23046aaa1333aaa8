//! Client identification utilities
//!
//! The client IP keys the per-IP login limiter and the general request
//! limiter, and is recorded in login audit entries. Forwarding headers are
//! only believed when the socket peer is a configured proxy; anyone else
//! could put an arbitrary address there.

use axum::http::{HeaderMap, HeaderName};
use std::net::{AddrParseError, IpAddr};
use std::sync::Arc;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");

/// Peers allowed to report the client address via `X-Forwarded-For` /
/// `X-Real-IP`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedProxies(Arc<[IpAddr]>);

impl TrustedProxies {
    pub fn new(addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        Self(addrs.into_iter().collect())
    }

    /// Parse a comma-separated address list. Blank input trusts nobody.
    pub fn parse(list: &str) -> Result<Self, AddrParseError> {
        let addrs = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<IpAddr>, _>>()?;
        Ok(Self::new(addrs))
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.0.contains(&ip)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Extract client IP address
///
/// When the direct peer is a trusted proxy, checks X-Forwarded-For (first
/// entry) and then X-Real-IP. Otherwise, or when neither header holds an
/// address, the direct connection IP is used.
pub fn extract_client_ip(
    headers: &HeaderMap,
    direct_ip: Option<IpAddr>,
    trusted: &TrustedProxies,
) -> Option<IpAddr> {
    if !direct_ip.is_some_and(|ip| trusted.contains(ip)) {
        return direct_ip;
    }

    if let Some(first_ip) = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|xff| xff.split(',').next())
    {
        if let Ok(ip) = first_ip.trim().parse::<IpAddr>() {
            return Some(ip);
        }
    }

    if let Some(ip) = headers
        .get(X_REAL_IP)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
    {
        return Some(ip);
    }

    direct_ip
}

/// Same as [`extract_client_ip`], rendered as a limiter/audit key.
/// Unknown clients share the `"unknown"` bucket.
pub fn client_ip_key(
    headers: &HeaderMap,
    direct_ip: Option<IpAddr>,
    trusted: &TrustedProxies,
) -> String {
    extract_client_ip(headers, direct_ip, trusted)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
