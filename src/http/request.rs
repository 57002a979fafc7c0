//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4)
//! - Strip hop-by-hop headers before forwarding
//! - Rewrite the request target to the chosen upstream
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Upgrade handshakes keep `Connection`/`Upgrade`; upstream needs them

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::uri::{Authority, PathAndQuery, Scheme, Uri};
use axum::http::Request;
use tower_http::request_id::{MakeRequestId, RequestId};

/// Header carrying the correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Headers that describe a single hop and must not be forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Generates `x-request-id` values for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Read the request ID, falling back to `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Copy `src` headers into `dst`, dropping hop-by-hop headers.
///
/// With `keep_upgrade` the `Connection` and `Upgrade` headers survive so the
/// upstream sees the same handshake the client sent.
pub fn forward_headers(src: &HeaderMap, dst: &mut HeaderMap, keep_upgrade: bool) {
    // Headers named by Connection are hop-by-hop as well.
    let listed: Vec<HeaderName> = src
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for (name, value) in src.iter() {
        let kept_for_upgrade =
            keep_upgrade && (*name == header::CONNECTION || *name == header::UPGRADE);
        if !kept_for_upgrade
            && (HOP_BY_HOP.contains(&name.as_str()) || listed.contains(name))
        {
            continue;
        }
        dst.append(name.clone(), value.clone());
    }
}

/// Point `uri` at `authority`, keeping path and query.
pub fn upstream_uri(uri: &Uri, authority: &str) -> Option<Uri> {
    let authority = Authority::try_from(authority).ok()?;
    let path = uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));
    Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(authority)
        .path_and_query(path)
        .build()
        .ok()
}
