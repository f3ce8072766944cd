//! Header copying with exclusions.
//!
//! Both directions of the proxy use the same operation: requests drop
//! `Host` and `Authorization` on the way out, responses drop `Set-Cookie`
//! on the way back. `HeaderName` is normalized to lowercase, so equality
//! is already a case-insensitive match.

use axum::http::{header, HeaderMap, HeaderName};

/// Headers never copied from the inbound request to the upstream request.
pub const OUTBOUND_EXCLUDED: [HeaderName; 2] = [header::HOST, header::AUTHORIZATION];

/// Headers never copied from the upstream response to the caller.
pub const RELAY_EXCLUDED: [HeaderName; 1] = [header::SET_COOKIE];

/// Append every header of `src` to `dst` except those named in `excluded`.
///
/// Multi-valued headers are copied in full and keep their relative order.
pub fn copy_headers_except(src: &HeaderMap, dst: &mut HeaderMap, excluded: &[HeaderName]) {
    for (name, value) in src.iter() {
        if !excluded.contains(name) {
            dst.append(name.clone(), value.clone());
        }
    }
}

/// Fresh map holding `src` minus `excluded`.
pub fn filtered(src: &HeaderMap, excluded: &[HeaderName]) -> HeaderMap {
    let mut dst = HeaderMap::with_capacity(src.len());
    copy_headers_except(src, &mut dst, excluded);
    dst
}
