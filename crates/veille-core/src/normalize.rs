//! Canonical forms for URLs and free text.
//!
//! Two candidates that differ only in tracking parameters, host case, a
//! fragment, or whitespace must normalize to the same strings so that their
//! fingerprints collide.

/// Query keys dropped during canonicalization. Any key starting with `utm`
/// is dropped as well.
const TRACKING_PARAMS: &[&str] = &[
    "_dt", "fbclid", "gclid", "mc_cid", "mc_eid", "ref", "oc", "ved", "usg",
];

fn is_tracking_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    lower.starts_with("utm") || TRACKING_PARAMS.contains(&lower.as_str())
}

/// Canonicalize an article URL.
///
/// Lowercases the scheme and host, drops the fragment and tracking query
/// parameters, sorts the surviving query pairs, and trims a trailing slash
/// from non-root paths. Unparseable input is returned trimmed but otherwise
/// untouched.
#[must_use]
pub fn canonicalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut parsed) = url::Url::parse(trimmed) else {
        return trimmed.to_string();
    };

    parsed.set_fragment(None);

    if parsed.query().is_some() {
        let mut pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(key, _)| !is_tracking_key(key))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.sort();

        if pairs.is_empty() {
            parsed.set_query(None);
        } else {
            parsed.query_pairs_mut().clear().extend_pairs(pairs);
        }
    }

    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(path.trim_end_matches('/'));
    }

    // `Url` already lowercases scheme and registered-domain hosts.
    parsed.to_string()
}

/// Collapse every run of whitespace into a single space and trim the ends.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
