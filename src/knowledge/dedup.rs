//! Candidate source deduplication.
//!
//! Filter order is fixed: login blocklist, then normalized-URI dedupe, then
//! case-insensitive exact-title dedupe, then truncation. A candidate dropped
//! for its title does not mark its URI as seen.
//!
//! Two URI-distinct pages with the same title keep only the first. This can
//! drop genuinely different pages; it is kept because same-titled entries
//! ("Home - Company") are almost always noise in discovery output.

use std::collections::HashSet;

use super::CandidateSource;

/// Maximum candidates returned by [`dedupe`].
pub const MAX_CANDIDATES: usize = 15;

/// Login and account pages that never carry useful content.
const BLOCKED_URI_PATTERNS: [&str; 4] = [
    "facebook.com/login",
    "instagram.com/accounts",
    "linkedin.com/login",
    "twitter.com/login",
];

/// Normalize a URI for comparison: lower-case, drop the scheme, a leading
/// `www.`, the fragment and one trailing slash.
pub fn normalize_uri(uri: &str) -> String {
    let lower = uri.trim().to_lowercase();
    let without_scheme = match lower.split_once("://") {
        Some((scheme, rest))
            if !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-')) =>
        {
            rest
        }
        _ => lower.as_str(),
    };
    let without_www = without_scheme.strip_prefix("www.").unwrap_or(without_scheme);
    let without_fragment = without_www
        .split_once('#')
        .map(|(head, _)| head)
        .unwrap_or(without_www);
    without_fragment
        .strip_suffix('/')
        .unwrap_or(without_fragment)
        .to_owned()
}

/// Whether a URI points at a blocklisted login page.
pub fn is_blocked(uri: &str) -> bool {
    let normalized = normalize_uri(uri);
    BLOCKED_URI_PATTERNS
        .iter()
        .any(|pattern| normalized.contains(pattern))
}

/// Deduplicate `candidates` against each other and against URIs already
/// imported into the draft, keeping at most [`MAX_CANDIDATES`].
pub fn dedupe<'a>(
    candidates: Vec<CandidateSource>,
    imported_uris: impl IntoIterator<Item = &'a str>,
) -> Vec<CandidateSource> {
    dedupe_with_limit(candidates, imported_uris, MAX_CANDIDATES)
}

/// [`dedupe`] with an explicit limit.
pub fn dedupe_with_limit<'a>(
    candidates: Vec<CandidateSource>,
    imported_uris: impl IntoIterator<Item = &'a str>,
    limit: usize,
) -> Vec<CandidateSource> {
    let mut seen_uris: HashSet<String> = imported_uris.into_iter().map(normalize_uri).collect();
    let mut seen_titles: HashSet<String> = HashSet::new();
    let mut accepted = Vec::new();

    for mut candidate in candidates {
        let title = candidate.title.trim();
        if candidate.uri.trim().is_empty() || title.is_empty() {
            continue;
        }

        let normalized = normalize_uri(&candidate.uri);
        if is_blocked(&candidate.uri) || seen_uris.contains(&normalized) {
            tracing::debug!(uri = %candidate.uri, "dropping duplicate or blocked candidate");
            continue;
        }

        let title_key = title.to_lowercase();
        if seen_titles.contains(&title_key) {
            tracing::debug!(title = %title, uri = %candidate.uri, "dropping same-titled candidate");
            continue;
        }

        seen_uris.insert(normalized);
        seen_titles.insert(title_key);
        candidate.title = title.to_owned();
        accepted.push(candidate);
    }

    accepted.truncate(limit);
    accepted
}
