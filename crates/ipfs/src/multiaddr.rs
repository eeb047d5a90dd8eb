//! HTTP URL to multiaddr translation for IPFS Cluster endpoints.

use crate::error::{IpfsError, IpfsResult};
use reqwest::Url;
use std::net::IpAddr;

/// Translate an HTTP API URL into its multiaddr form.
///
/// `https://cluster.ogn.app:9094` becomes `/dns4/cluster.ogn.app/tcp/9094/https`;
/// IP hosts use `/ip4/` or `/ip6/`. A missing port falls back to the
/// scheme's default.
pub fn http_url_to_multiaddr(url: &str) -> IpfsResult<String> {
    let invalid = |reason: &str| IpfsError::InvalidApiUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };
    let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(invalid("scheme must be http or https"));
    }
    let raw_host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid("missing host"))?;
    let host = match raw_host.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => format!("/ip4/{ip}"),
        Ok(IpAddr::V6(ip)) => format!("/ip6/{ip}"),
        Err(_) => format!("/dns4/{raw_host}"),
    };
    let port = parsed
        .port_or_known_default()
        .ok_or_else(|| invalid("missing port"))?;
    Ok(format!("{host}/tcp/{port}/{scheme}"))
}
