//! Relay address normalization.
//!
//! The pool keys its connection map by normalized address, so two spellings of
//! the same relay must canonicalize to one string: scheme defaults to `wss`,
//! duplicate path slashes collapse, the trailing slash and default port are
//! stripped, query parameters are sorted, and any fragment is dropped.

use crate::error::{RelayError, Result};
use std::fmt::Write as _;
use url::Url;

/// Canonicalize a relay address into a stable comparison key.
///
/// Normalization is idempotent: `normalize_relay_url(&normalize_relay_url(x)?)`
/// returns the same string.
pub fn normalize_relay_url(input: &str) -> Result<String> {
    let input = input.trim();
    let with_scheme = if input.contains("://") {
        input.to_string()
    } else {
        format!("wss://{input}")
    };

    let url = Url::parse(&with_scheme)?;
    let host = url
        .host_str()
        .ok_or_else(|| RelayError::InvalidUrl(input.to_string()))?;

    let mut normalized = format!("{}://{}", url.scheme(), host);
    // Url::port() already yields None for the scheme's default port.
    if let Some(port) = url.port() {
        let _ = write!(normalized, ":{port}");
    }

    let path: Vec<&str> = url.path().split('/').filter(|s| !s.is_empty()).collect();
    if !path.is_empty() {
        normalized.push('/');
        normalized.push_str(&path.join("/"));
    }

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if !pairs.is_empty() {
        pairs.sort();
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in &pairs {
            serializer.append_pair(k, v);
        }
        normalized.push('?');
        normalized.push_str(&serializer.finish());
    }

    Ok(normalized)
}
