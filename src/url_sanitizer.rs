//! Canonicalization of podcast and episode URLs.
//!
//! Clients are sloppy about the URLs that they send in (stray whitespace,
//! missing schemes, mixed case hosts), and we need exactly one representation
//! per feed so that `(user, url)` stays unique.

use std::collections::BTreeSet;
use url::Url;

/// Sanitizes a URL, returning `None` if it should be dropped.
///
/// Whitespace is trimmed, `http://` is assumed when no scheme was given,
/// scheme and host are lower-cased, and fragments are removed. Anything that
/// doesn't end up with an `http` or `https` scheme is rejected.
pub fn sanitize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let with_scheme = if has_scheme(trimmed) {
        trimmed.to_owned()
    } else {
        format!("http://{}", trimmed)
    };

    let mut url = match Url::parse(&with_scheme) {
        Ok(url) => url,
        Err(_) => return None,
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    if url.host_str().map(|h| h.is_empty()).unwrap_or(true) {
        return None;
    }

    url.set_fragment(None);
    Some(url.into_string())
}

/// A URL as the client sent it paired with what it was rewritten to. The
/// rewritten value is empty for URLs that were dropped.
///
/// Clients are expected to replace their local copy of the URL with the
/// second element.
pub type UrlRewrite = (String, String);

/// Sanitizes a URL and, if the result differs from the input, records a
/// rewrite that should be reported back to the client.
pub fn sanitize_tracked(raw: &str, rewrites: &mut Vec<UrlRewrite>) -> Option<String> {
    let sanitized = sanitize(raw);
    match sanitized {
        Some(ref url) if url != raw => rewrites.push((raw.to_owned(), url.clone())),
        None => rewrites.push((raw.to_owned(), "".to_owned())),
        _ => (),
    }
    sanitized
}

/// Sanitizes a batch of URLs with `sanitize_tracked`, dropping the ones that
/// can't be used and collapsing duplicates.
pub fn sanitize_all<S: AsRef<str>>(raws: &[S], rewrites: &mut Vec<UrlRewrite>) -> BTreeSet<String> {
    raws.iter()
        .filter_map(|raw| sanitize_tracked(raw.as_ref(), rewrites))
        .collect()
}

//
// Private functions
//

// Checks for a `scheme://` prefix. Only the characters RFC 3986 allows in a
// scheme may precede the separator, so a `://` inside a query string doesn't
// count.
fn has_scheme(s: &str) -> bool {
    match s.find("://") {
        Some(i) => s[..i]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.'),
        None => false,
    }
}
