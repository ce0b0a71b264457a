//! Header manipulation for forwarded requests.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers
//! - Strip the inbound `Authorization` header
//! - Inject the target instance's credential as a bearer token
//!
//! # Design Decisions
//! - `Host` and `Content-Length` are recomputed by the outbound client
//! - Client credentials never reach a backend

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue};

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Copy `inbound` minus hop-by-hop, host, length and authorization headers.
pub fn sanitize_forward_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound {
        if is_stripped(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Backend response headers minus hop-by-hop and length; the body is re-framed.
pub fn sanitize_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if *name == header::CONTENT_LENGTH || HOP_BY_HOP.contains(&name.as_str()) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Set `Authorization: Bearer <credential>`, replacing any existing value.
pub fn inject_bearer(headers: &mut HeaderMap, credential: &str) -> Result<(), InvalidHeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", credential))?;
    value.set_sensitive(true);
    headers.insert(header::AUTHORIZATION, value);
    Ok(())
}

fn is_stripped(name: &HeaderName) -> bool {
    *name == header::AUTHORIZATION
        || *name == header::HOST
        || *name == header::CONTENT_LENGTH
        || HOP_BY_HOP.contains(&name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_auth_and_hop_by_hop() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer client"));
        inbound.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        inbound.insert(header::HOST, HeaderValue::from_static("gateway.local"));
        inbound.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        inbound.insert("x-request-id", HeaderValue::from_static("abc"));

        let out = sanitize_forward_headers(&inbound);
        assert!(out.get(header::AUTHORIZATION).is_none());
        assert!(out.get(header::CONNECTION).is_none());
        assert!(out.get(header::HOST).is_none());
        assert_eq!(out.get(header::CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(out.get("x-request-id").unwrap(), "abc");
    }

    #[test]
    fn test_response_headers_keep_content_type() {
        let mut upstream = HeaderMap::new();
        upstream.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        upstream.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        upstream.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        let out = sanitize_response_headers(&upstream);
        assert!(out.get(header::TRANSFER_ENCODING).is_none());
        assert!(out.get(header::CONTENT_LENGTH).is_none());
        assert_eq!(out.get(header::CONTENT_TYPE).unwrap(), "text/plain");
    }

    #[test]
    fn test_inject_bearer() {
        let mut headers = HeaderMap::new();
        inject_bearer(&mut headers, "instance-key").unwrap();
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer instance-key");
        assert!(inject_bearer(&mut headers, "bad\nvalue").is_err());
    }
}
