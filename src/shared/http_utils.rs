//! Shared HTTP utilities for transport logging.
//!
//! Redaction helpers keep session cookies and credentials out of logs.

use http::HeaderName;
use std::collections::{HashMap, HashSet};

/// Redact sensitive header values.
///
/// Returns either the redacted value or the original value if the header
/// is not in the redaction list. Header names are compared
/// case-insensitively; names that are not valid header names are never
/// redacted.
///
/// # Arguments
///
/// * `name` - Header name to check
/// * `value` - Original header value
/// * `redact_headers` - Set of headers to redact
/// * `show_auth_scheme` - Whether to keep auth scheme (e.g., "Bearer")
/// * `max_len` - Optional maximum length for non-redacted values
pub fn redact_header_value(
    name: &str,
    value: &str,
    redact_headers: &HashSet<HeaderName>,
    show_auth_scheme: bool,
    max_len: Option<usize>,
) -> String {
    let sensitive = HeaderName::try_from(name)
        .map(|n| redact_headers.contains(&n))
        .unwrap_or(false);
    if !sensitive {
        return truncate_value(value, max_len);
    }

    if name.eq_ignore_ascii_case("authorization") && show_auth_scheme {
        // Keep auth scheme, redact token
        if let Some(space_idx) = value.find(' ') {
            let scheme = &value[..space_idx];
            format!("{} [REDACTED]", scheme)
        } else {
            "[REDACTED]".to_string()
        }
    } else {
        "[REDACTED]".to_string()
    }
}

/// Truncate a value to a maximum length.
fn truncate_value(value: &str, max_len: Option<usize>) -> String {
    match max_len {
        Some(max) if value.len() > max => {
            let mut cut = max;
            while !value.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}...", &value[..cut])
        },
        _ => value.to_string(),
    }
}

/// Check if a content-type should allow body logging.
///
/// # Arguments
///
/// * `content_type` - Content-Type header value (may include charset)
/// * `allowed_types` - Set of allowed base content types
pub fn should_log_body_for_content_type(
    content_type: Option<&str>,
    allowed_types: &HashSet<String>,
) -> bool {
    let Some(ct) = content_type else {
        return false;
    };

    // Extract base content type (ignore charset, etc.)
    let base_ct = ct.split(';').next().unwrap_or(ct).trim();

    allowed_types.contains(base_ct)
        || (base_ct.starts_with("text/") && allowed_types.iter().any(|t| t == "text/plain"))
}

/// Redact query parameters from a URL or logical path.
pub fn redact_url_query(url: &str, redact_query: bool) -> String {
    if !redact_query {
        return url.to_string();
    }

    if let Some(query_start) = url.find('?') {
        format!("{}?[REDACTED]", &url[..query_start])
    } else {
        url.to_string()
    }
}

/// Format headers for logging with redaction, sorted by name.
pub fn format_headers_for_logging(
    headers: &HashMap<String, String>,
    redact_headers: &HashSet<HeaderName>,
    show_auth_scheme: bool,
    max_value_len: Option<usize>,
) -> String {
    let mut entries: Vec<_> = headers.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let header_strs: Vec<String> = entries
        .into_iter()
        .map(|(name, value)| {
            let redacted =
                redact_header_value(name, value, redact_headers, show_auth_scheme, max_value_len);
            format!("{}={}", name.to_ascii_lowercase(), redacted)
        })
        .collect();

    if header_strs.is_empty() {
        "(no headers)".to_string()
    } else {
        header_strs.join(", ")
    }
}

/// Default sensitive headers to redact.
pub fn default_sensitive_headers() -> HashSet<HeaderName> {
    let mut headers = HashSet::new();

    // Standard auth headers
    headers.insert(HeaderName::from_static("authorization"));
    headers.insert(HeaderName::from_static("proxy-authorization"));

    // Session cookies
    headers.insert(HeaderName::from_static("cookie"));
    headers.insert(HeaderName::from_static("set-cookie"));

    // API key headers
    headers.insert(HeaderName::from_static("x-api-key"));
    headers.insert(HeaderName::from_static("x-auth-token"));

    headers
}

/// Default content types that are safe to log.
pub fn default_loggable_content_types() -> HashSet<String> {
    let mut types = HashSet::new();

    types.insert("application/json".to_string());
    types.insert("application/problem+json".to_string());
    types.insert("text/plain".to_string());

    types
}
