//! Version-aware comparison of image tags.
//!
//! Tags such as `1.25.3`, `v2.1` or `7.2.3-alpine` are treated as versions.
//! Anything else (`latest`, `stable`, `weird-tag-format-!!!`) is not an
//! error, it just falls back to plain string comparison.

use regex::Regex;
use std::cmp::Ordering;
use std::sync::OnceLock;

static TAG_VERSION: OnceLock<Option<Regex>> = OnceLock::new();

fn tag_version_regex() -> Option<&'static Regex> {
    TAG_VERSION
        .get_or_init(|| {
            Regex::new(r"^(?P<prefix>v)?(?P<numbers>\d+(?:\.\d+){0,3})(?:-(?P<variant>[0-9A-Za-z][0-9A-Za-z._\-]*))?$")
                .ok()
        })
        .as_ref()
}

/// A tag that looks like a version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagVersion {
    prefixed: bool,
    numbers: Vec<u64>,
    variant: Option<String>,
}

impl TagVersion {
    /// Parse a tag, returning `None` when it is not version-shaped.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        let caps = tag_version_regex()?.captures(tag.trim())?;
        let numbers = caps
            .name("numbers")?
            .as_str()
            .split('.')
            .map(str::parse::<u64>)
            .collect::<Result<Vec<_>, _>>()
            .ok()?;
        Some(Self {
            prefixed: caps.name("prefix").is_some(),
            numbers,
            variant: caps.name("variant").map(|m| m.as_str().to_string()),
        })
    }

    /// Versions are only comparable when they follow the same tagging
    /// scheme: same number of components, same `v` prefix and the same
    /// suffix (`-alpine`, `-rc1`, ...).
    #[must_use]
    pub fn same_track(&self, other: &Self) -> bool {
        self.prefixed == other.prefixed
            && self.numbers.len() == other.numbers.len()
            && self.variant == other.variant
    }
}

impl PartialOrd for TagVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.same_track(other) {
            Some(self.numbers.cmp(&other.numbers))
        } else {
            None
        }
    }
}

/// The highest tag on the same track as `current`, or `None` when
/// `current` is not a version or no candidate shares its track.
pub fn newest_tag<'a, I>(current: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let current = TagVersion::parse(current)?;
    candidates
        .into_iter()
        .filter_map(|tag| TagVersion::parse(tag).map(|v| (tag, v)))
        .filter(|(_, v)| v.same_track(&current))
        .max_by(|(_, a), (_, b)| a.numbers.cmp(&b.numbers))
        .map(|(tag, _)| tag.to_string())
}

/// Order tags most recent first: version-shaped tags by descending version,
/// then everything else in the order given.
pub fn sort_newest_first(tags: &mut [String]) {
    tags.sort_by(|a, b| match (TagVersion::parse(a), TagVersion::parse(b)) {
        (Some(a), Some(b)) => b.numbers.cmp(&a.numbers),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Whether `candidate` should be offered as an update over `current`.
///
/// Comparable versions are compared numerically; anything else falls back
/// to "different means newer".
#[must_use]
pub fn is_newer(current: &str, candidate: &str) -> bool {
    match (TagVersion::parse(current), TagVersion::parse(candidate)) {
        (Some(cur), Some(cand)) if cur.same_track(&cand) => cand.numbers > cur.numbers,
        _ => current != candidate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_version_tags() {
        assert!(TagVersion::parse("1.25.3").is_some());
        assert!(TagVersion::parse("16.1").is_some());
        assert!(TagVersion::parse("v2").is_some());
        assert!(TagVersion::parse("7.2.3-alpine").is_some());
    }

    #[test]
    fn rejects_non_version_tags() {
        assert!(TagVersion::parse("latest").is_none());
        assert!(TagVersion::parse("weird-tag-format-!!!").is_none());
        assert!(TagVersion::parse("").is_none());
        assert!(TagVersion::parse("1.2.3.4.5").is_none());
    }

    #[test]
    fn numeric_not_lexical_ordering() {
        assert!(is_newer("1.9.0", "1.10.0"));
        assert!(!is_newer("1.10.0", "1.9.0"));
        assert!(!is_newer("1.10.0", "1.10.0"));
    }

    #[test]
    fn different_tracks_fall_back_to_inequality() {
        assert!(is_newer("7.2.3", "7.2.3-alpine"));
        assert!(is_newer("latest", "stable"));
        assert!(!is_newer("latest", "latest"));
    }

    #[test]
    fn newest_tag_stays_on_track() {
        let tags = ["16.1", "16.2", "17", "16.10-alpine", "latest", "15.9"];
        assert_eq!(newest_tag("16.1", tags), Some("16.2".to_string()));
        assert_eq!(newest_tag("17", tags), Some("17".to_string()));
        assert_eq!(newest_tag("16.1-alpine", tags), Some("16.10-alpine".to_string()));
        assert_eq!(newest_tag("latest", tags), None);
    }

    #[test]
    fn sorts_versions_before_other_tags() {
        let mut tags: Vec<String> = ["latest", "1.2.0", "edge", "1.10.0", "1.9.3"]
            .iter()
            .map(ToString::to_string)
            .collect();
        sort_newest_first(&mut tags);
        assert_eq!(tags, vec!["1.10.0", "1.9.3", "1.2.0", "latest", "edge"]);
    }

    #[test]
    fn newest_tag_with_no_candidates_on_track() {
        assert_eq!(newest_tag("1.2.3", ["latest", "1.2"]), None);
    }
}
