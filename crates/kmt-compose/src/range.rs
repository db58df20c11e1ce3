//! Version range expressions as written in definition documents.
//!
//! Definition documents use the range syntax common to package managers
//! outside Cargo:
//!
//! - a bare version pins it exactly (`1.2.0` matches only `1.2.0`;
//!   `1.2` matches any `1.2.x`),
//! - comparators are separated by whitespace (`>=1.0.0 <2.0.0`),
//! - `A - B` is an inclusive range,
//! - `||` separates alternatives.
//!
//! Each alternative is normalized into a [`semver::VersionReq`].

use std::fmt;
use std::str::FromStr;

use semver::{Version, VersionReq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const OPERATORS: &[&str] = &[">=", "<=", ">", "<", "=", "^", "~"];

/// A disjunction of version requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    raw: String,
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    /// Returns `true` if `version` satisfies any alternative.
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }
}

fn comparator(token: &str) -> String {
    let operator = OPERATORS
        .iter()
        .find(|op| token.starts_with(**op))
        .copied()
        .unwrap_or_default();
    let version = &token[operator.len()..];
    let version = version.strip_prefix('v').unwrap_or(version);
    let bare = operator.is_empty() && version.starts_with(|c: char| c.is_ascii_digit());
    if bare && !version.contains(['*', 'x', 'X']) {
        format!("={version}")
    } else {
        format!("{operator}{version}")
    }
}

/// Rewrites one `||` alternative into Cargo requirement syntax.
fn normalize(alternative: &str) -> String {
    let tokens: Vec<&str> = alternative.split_whitespace().collect();
    if let [low, "-", high] = tokens.as_slice() {
        return format!(
            "{}, {}",
            comparator(&format!(">={low}")),
            comparator(&format!("<={high}"))
        );
    }

    let mut comparators = Vec::with_capacity(tokens.len());
    let mut pending: Option<&str> = None;
    for token in tokens {
        if OPERATORS.contains(&token) {
            pending = Some(token);
            continue;
        }
        comparators.push(match pending.take() {
            Some(operator) => comparator(&format!("{operator}{token}")),
            None => comparator(token),
        });
    }
    if let Some(operator) = pending {
        comparators.push(operator.to_string());
    }
    if comparators.is_empty() {
        "*".to_string()
    } else {
        comparators.join(", ")
    }
}

impl FromStr for VersionRange {
    type Err = semver::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let alternatives = s
            .split("||")
            .map(|alternative| VersionReq::parse(&normalize(alternative)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            raw: s.trim().to_string(),
            alternatives,
        })
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
