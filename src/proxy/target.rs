//! Target extraction and validation.
//!
//! The caller names the upstream in the `target` query parameter. The value
//! is form-decoded, so a target carrying its own query string must be
//! percent-encoded by the caller (`?target=http%3A%2F%2Fhost%2Fp%3Fa%3D1`).

use axum::http::Uri;
use url::{form_urlencoded, Url};

use crate::error::ProxyError;

/// Name of the query parameter carrying the upstream URL.
pub const TARGET_PARAM: &str = "target";

/// Extract the absolute upstream URL from an inbound request URI.
///
/// Absent or empty `target` is `MissingTarget`; anything that does not parse
/// as an absolute `http`/`https` URL is `InvalidTarget`.
pub fn extract_target(uri: &Uri) -> Result<Url, ProxyError> {
    let raw = uri
        .query()
        .and_then(|query| {
            form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == TARGET_PARAM)
                .map(|(_, value)| value.into_owned())
        })
        .filter(|value| !value.is_empty())
        .ok_or(ProxyError::MissingTarget)?;

    let url = Url::parse(&raw).map_err(|e| ProxyError::InvalidTarget {
        target: raw.clone(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ProxyError::InvalidTarget {
            reason: format!("unsupported scheme '{}'", url.scheme()),
            target: raw,
        });
    }

    tracing::info!(target_url = %url, "Accepted target");
    Ok(url)
}
