//! Restricted-alphabet identifiers.
//!
//! Every identifier is normalized on construction: lower-cased, `-` mapped to
//! `_`, and anything outside `[a-z0-9_]` dropped. Normalization is total and
//! idempotent, so equality of identifiers is equality of normalized strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TshragError};

/// Characters allowed in a normalized identifier.
pub const ID_CHARS: &str = "abcdefghijklmnopqrstuvwxyz0123456789_";

/// Separator between the segments of a [`MetricId`].
pub const METRIC_ID_SEPARATOR: &str = "::";

/// Wildcard accepted inside [`MetricIdPattern`] segments.
pub const PATTERN_WILDCARD: char = '*';

/// Normalize a free-form string into the identifier alphabet.
pub fn normalize(raw: &str) -> String {
    normalize_with(raw, false)
}

fn normalize_with(raw: &str, allow_wildcard: bool) -> String {
    raw.chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c == '-' { '_' } else { c })
        .filter(|c| {
            c.is_ascii_lowercase()
                || c.is_ascii_digit()
                || *c == '_'
                || (allow_wildcard && *c == PATTERN_WILDCARD)
        })
        .collect()
}

/// Returns true when `raw` is already in normalized form.
pub fn is_identifier(raw: &str) -> bool {
    !raw.is_empty() && normalize(raw) == raw
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl AsRef<str>) -> Self {
                Self(normalize(raw.as_ref()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self::new(raw)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self::new(raw)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// Generic normalized identifier.
    Identifier
);
identifier!(
    /// Identifier of a scheduled test.
    TestId
);
identifier!(
    /// Identifier of a job launched on behalf of a test.
    JobId
);
identifier!(
    /// Identifier of an exclusive machine or device.
    DutId
);

// ── Metric ids ────────────────────────────────────────────────

/// Hierarchical metric identifier: normalized segments joined by `::`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MetricId {
    keys: Vec<String>,
}

impl MetricId {
    /// Build from individual segments. Segments that normalize to nothing are
    /// dropped; an id with no remaining segment is rejected.
    pub fn new<I, S>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: Vec<String> = keys
            .into_iter()
            .map(|k| normalize(k.as_ref()))
            .filter(|k| !k.is_empty())
            .collect();
        if keys.is_empty() {
            return Err(TshragError::InvalidIdentifier(String::new()));
        }
        Ok(Self { keys })
    }

    /// Parse the `a::b::c` textual form.
    pub fn parse(raw: &str) -> Result<Self> {
        Self::new(raw.split(METRIC_ID_SEPARATOR))
            .map_err(|_| TshragError::InvalidIdentifier(raw.to_string()))
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Extend this id with further segments (e.g. resource qualifiers).
    pub fn join<I, S>(&self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keys = self.keys.clone();
        keys.extend(
            extra
                .into_iter()
                .map(|k| normalize(k.as_ref()))
                .filter(|k| !k.is_empty()),
        );
        Self { keys }
    }

    /// True when `prefix`'s segments are a leading run of this id's segments.
    pub fn starts_with(&self, prefix: &MetricId) -> bool {
        self.keys.len() >= prefix.keys.len() && self.keys[..prefix.keys.len()] == prefix.keys[..]
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.keys.join(METRIC_ID_SEPARATOR))
    }
}

impl FromStr for MetricId {
    type Err = TshragError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MetricId {
    type Error = TshragError;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

impl From<MetricId> for String {
    fn from(id: MetricId) -> Self {
        id.to_string()
    }
}

// ── Metric id patterns ────────────────────────────────────────

/// Metric id pattern whose segments may contain `*` wildcards.
///
/// A pattern matches ids with the same number of segments where every
/// segment glob-matches. [`MetricIdPattern::all`] matches every id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MetricIdPattern {
    keys: Vec<String>,
}

impl MetricIdPattern {
    pub fn all() -> Self {
        Self { keys: Vec::new() }
    }

    pub fn parse(raw: &str) -> Self {
        let keys = raw
            .split(METRIC_ID_SEPARATOR)
            .map(|k| normalize_with(k, true))
            .filter(|k| !k.is_empty())
            .collect();
        Self { keys }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn is_all(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn matches(&self, id: &MetricId) -> bool {
        self.matches_keys(id.keys())
    }

    pub fn matches_keys<S: AsRef<str>>(&self, keys: &[S]) -> bool {
        if self.is_all() {
            return true;
        }
        self.keys.len() == keys.len()
            && self
                .keys
                .iter()
                .zip(keys)
                .all(|(p, k)| wildcard_match(p, k.as_ref()))
    }
}

impl From<&MetricId> for MetricIdPattern {
    fn from(id: &MetricId) -> Self {
        Self {
            keys: id.keys().to_vec(),
        }
    }
}

impl fmt::Display for MetricIdPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            return f.write_str("*");
        }
        f.write_str(&self.keys.join(METRIC_ID_SEPARATOR))
    }
}

/// Glob match where `*` matches any (possibly empty) run of characters.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == PATTERN_WILDCARD {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ti = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == PATTERN_WILDCARD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_and_strips() {
        assert_eq!(normalize("Hello-World!"), "hello_world");
        assert_eq!(normalize("  a b\tc "), "abc");
        assert_eq!(normalize("ÄÖ-x"), "_x");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["Rack-01/Slot#3", "", "___", "UPPER-lower-123", "日本-x"] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once);
            assert!(once.chars().all(|c| ID_CHARS.contains(c)));
        }
    }

    #[test]
    fn typed_ids_compare_by_normalized_form() {
        assert_eq!(TestId::new("Smoke-Test"), TestId::new("smoke_test"));
        assert_ne!(JobId::new("a"), JobId::new("b"));
        assert_eq!(DutId::from("Rig-7").as_str(), "rig_7");
    }

    #[test]
    fn typed_ids_deserialize_normalized() {
        let id: DutId = serde_json::from_str("\"Bench-A\"").unwrap();
        assert_eq!(id.as_str(), "bench_a");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"bench_a\"");
    }

    #[test]
    fn metric_id_parse_and_keys() {
        let id = MetricId::parse("Net::Latency-P99").unwrap();
        assert_eq!(id.keys(), ["net", "latency_p99"]);
        assert_eq!(id.to_string(), "net::latency_p99");
    }

    #[test]
    fn metric_id_rejects_empty() {
        assert!(MetricId::parse("").is_err());
        assert!(MetricId::parse("::!!::").is_err());
    }

    #[test]
    fn metric_id_join_and_prefix() {
        let key = MetricId::parse("latency").unwrap();
        let qualified = key.join(["rig_b", "rig_a"]);
        assert_eq!(qualified.to_string(), "latency::rig_b::rig_a");
        assert!(qualified.starts_with(&key));
        assert!(!key.starts_with(&qualified));
    }

    #[test]
    fn metric_id_serde_roundtrip_as_string() {
        let id = MetricId::parse("a::b").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"a::b\"");
        let back: MetricId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn pattern_matches_per_segment() {
        let pattern = MetricIdPattern::parse("net::*");
        assert!(pattern.matches(&MetricId::parse("net::latency").unwrap()));
        assert!(!pattern.matches(&MetricId::parse("net::latency::p99").unwrap()));
        assert!(!pattern.matches(&MetricId::parse("cpu::load").unwrap()));
    }

    #[test]
    fn pattern_all_matches_everything() {
        let pattern = MetricIdPattern::all();
        assert!(pattern.matches(&MetricId::parse("x").unwrap()));
        assert!(pattern.matches(&MetricId::parse("x::y::z").unwrap()));
    }

    #[test]
    fn wildcard_match_cases() {
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("lat*", "latency"));
        assert!(wildcard_match("*cy", "latency"));
        assert!(wildcard_match("l*t*y", "latency"));
        assert!(!wildcard_match("l*x", "latency"));
        assert!(wildcard_match("latency", "latency"));
        assert!(!wildcard_match("latenc", "latency"));
    }
}
