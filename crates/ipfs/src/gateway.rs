//! Gateway cache priming.

use futures::stream::{self, StreamExt};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use tracing::{debug, warn};

/// Characters that end or alter a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// `{gateway}/ipfs/{hash}/{key}`, with each segment of `key` percent-encoded.
pub fn gateway_url(gateway: &str, hash: &str, key: &str) -> String {
    let path = key
        .split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/ipfs/{hash}/{path}", gateway.trim_end_matches('/'))
}

/// GET every file through every gateway so their caches hold the content.
///
/// Best-effort: failures are logged, never returned. At most `concurrency`
/// requests are in flight. Returns the number of successful requests.
pub async fn prime_gateways<'a>(
    http: &reqwest::Client,
    gateways: &[String],
    hash: &str,
    keys: impl IntoIterator<Item = &'a str>,
    concurrency: usize,
) -> usize {
    let keys: Vec<&str> = keys.into_iter().collect();
    let urls: Vec<String> = gateways
        .iter()
        .flat_map(|gateway| keys.iter().map(|key| gateway_url(gateway, hash, key)))
        .collect();
    let total = urls.len();

    let primed = stream::iter(urls)
        .map(|url| async move {
            match http.get(&url).send().await {
                Ok(response) if response.status().is_success() => true,
                Ok(response) => {
                    warn!(url = %url, status = %response.status(), "Gateway priming request failed");
                    false
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Gateway priming request failed");
                    false
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .filter(|ok| futures::future::ready(*ok))
        .count()
        .await;
    debug!(primed, total, "Gateway priming finished");
    primed
}
