use sha2::{Digest, Sha256};

use crate::normalize::{canonicalize_url, collapse_whitespace};

/// Derive the uniqueness key for an article.
///
/// SHA-256 over the canonical URL and the first `prefix_chars` characters of
/// the lowercased, whitespace-collapsed `title + " " + content`. The two parts
/// are separated by a NUL byte so that neither can bleed into the other.
#[must_use]
pub fn fingerprint(url: &str, title: &str, content: &str, prefix_chars: usize) -> String {
    let canonical = canonicalize_url(url);
    let body = collapse_whitespace(&format!("{title} {content}")).to_lowercase();
    let prefix: String = body.chars().take(prefix_chars).collect();

    let input = format!("{canonical}\x00{prefix}");
    format!("{:x}", Sha256::digest(input.as_bytes()))
}
