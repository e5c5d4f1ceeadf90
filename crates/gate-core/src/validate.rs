//! # Callback URL Validation
//!
//! Success and cancel URLs are handed to the payment provider, which later
//! redirects the customer to them. Only absolute `http`/`https` URLs with a
//! real host are accepted, so the provider never receives a malformed or
//! scheme-smuggling callback.

use crate::error::{CheckoutError, CheckoutResult};
use url::Url;

/// Validate an absolute http(s) URL and return its normalized form.
///
/// `field` names the request parameter in the error message.
pub fn validate_absolute_http_url(field: &str, raw: &str) -> CheckoutResult<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(CheckoutError::invalid_request(format!(
            "{} must not be blank",
            field
        )));
    }

    let invalid = || {
        CheckoutError::invalid_request(format!(
            "{} must be an absolute http(s) URL",
            field
        ))
    };

    // WHATWG parsing skips extra slashes for special schemes, turning
    // "https:///path" into host "path". The authority must be present as
    // written.
    let (_, rest) = value.split_once("://").ok_or_else(invalid)?;
    let authority = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host_part = authority.rsplit('@').next().unwrap_or_default();
    if host_part.is_empty() || host_part.starts_with(':') {
        return Err(CheckoutError::invalid_request(format!(
            "{} must include a host",
            field
        )));
    }

    let url = Url::parse(value).map_err(|_| invalid())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid());
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url.to_string()),
        _ => Err(CheckoutError::invalid_request(format!(
            "{} must include a host",
            field
        ))),
    }
}
