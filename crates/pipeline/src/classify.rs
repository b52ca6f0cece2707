//! Pinning classification: a pure function from version string to
//! [`PinningStrategy`].
//!
//! Rule order is significant. The digest check runs before the tag check and
//! the tag check before the branch fallback, because a 40-character hex
//! string could otherwise coincidentally match the looser tag pattern.
//!
//! The fallback is deliberately conservative: anything that is neither a
//! digest nor a release-style tag (branch names, mutable tag aliases, bare
//! numeric container tags like `18`) classifies as [`PinningStrategy::Branch`],
//! the least-trusted mutable classification.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{DependencyRecord, DependencyReference, PinningStrategy};

/// A full 40-character lowercase hex commit digest.
static SHA_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-f0-9]{40}$").expect("sha pattern is valid"));

/// Release-style version tags: `v4`, `v4.1`, `v4.1.2`, `1.2.3`, with an
/// optional pre-release suffix (`v2.0.0-rc.1`). A bare integer without a `v`
/// prefix is *not* a tag; it falls through to the branch fallback.
static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:v\d+(?:\.\d+)*|\d+(?:\.\d+)+)(?:-[0-9A-Za-z.-]+)?$")
        .expect("tag pattern is valid")
});

/// Classifies a version reference.
///
/// Identical inputs always produce identical outputs; callers may cache or
/// re-derive classifications freely.
pub fn classify_version(version: Option<&str>) -> PinningStrategy {
    let Some(version) = version else {
        return PinningStrategy::Unpinned;
    };
    if version.is_empty() {
        return PinningStrategy::Unpinned;
    }
    if SHA_PATTERN.is_match(version) {
        return PinningStrategy::Sha;
    }
    if TAG_PATTERN.is_match(version) {
        return PinningStrategy::Tag;
    }
    // Known branch names and everything else that matched no stricter rule.
    PinningStrategy::Branch
}

/// Tags a reference with the classification of its version component.
pub fn classify_reference(reference: DependencyReference) -> DependencyRecord {
    let pinning = classify_version(reference.version.as_deref());
    DependencyRecord { reference, pinning }
}
