//! URL pattern classification and matching.
//!
//! Every mapping pattern is one of four kinds:
//!
//! | Pattern      | Kind                      | Matches                                   |
//! |--------------|---------------------------|-------------------------------------------|
//! | `/foo/bar`   | [`PatternKind::Exact`]     | only `/foo/bar`                           |
//! | `/foo/*`     | [`PatternKind::Prefix`]    | `/foo` and anything under `/foo/`         |
//! | `*.jsp`      | [`PatternKind::Extension`] | a last segment ending in `.jsp`           |
//! | `/`          | [`PatternKind::Default`]   | anything, with the lowest precedence      |
//!
//! The empty string is an exact pattern for the context root.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MappingError, MappingResult};

/// The rule a pattern participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    /// Verbatim path equality.
    Exact,
    /// Longest matching `/.../*` prefix.
    Prefix,
    /// `*.ext` on the last path segment.
    Extension,
    /// The `/` fallback.
    Default,
}

impl PatternKind {
    /// Resolution order. Earlier rules always win over later ones.
    pub const PRECEDENCE: [PatternKind; 4] = [
        PatternKind::Exact,
        PatternKind::Prefix,
        PatternKind::Extension,
        PatternKind::Default,
    ];

    /// Returns the lowercase name of the rule.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Prefix => "prefix",
            Self::Extension => "extension",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed, validated URL pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UrlPattern {
    raw: String,
    kind: PatternKind,
}

impl UrlPattern {
    /// Parses and classifies a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::InvalidPattern`] when the pattern uses `*`
    /// anywhere but a leading `*.` or trailing `/*`, when an extension pattern
    /// has an empty extension or contains `/`, or when a path pattern does
    /// not start with `/`.
    pub fn parse(pattern: &str) -> MappingResult<Self> {
        let kind = if pattern == "/" {
            PatternKind::Default
        } else if let Some(ext) = pattern.strip_prefix("*.") {
            if ext.is_empty() {
                return Err(MappingError::invalid(pattern, "extension is empty"));
            }
            if ext.contains('/') || ext.contains('*') {
                return Err(MappingError::invalid(
                    pattern,
                    "extension must not contain '/' or '*'",
                ));
            }
            PatternKind::Extension
        } else if let Some(stripped) = pattern.strip_suffix("/*") {
            if !stripped.is_empty() && !stripped.starts_with('/') {
                return Err(MappingError::invalid(pattern, "path must start with '/'"));
            }
            if stripped.contains('*') {
                return Err(MappingError::invalid(
                    pattern,
                    "'*' is only allowed as a trailing '/*'",
                ));
            }
            PatternKind::Prefix
        } else if pattern.is_empty() {
            PatternKind::Exact
        } else if !pattern.starts_with('/') {
            return Err(MappingError::invalid(
                pattern,
                "path must start with '/' or be an extension pattern",
            ));
        } else if pattern.contains('*') {
            return Err(MappingError::invalid(
                pattern,
                "'*' is only allowed as a leading '*.' or a trailing '/*'",
            ));
        } else {
            PatternKind::Exact
        };

        Ok(Self {
            raw: pattern.to_string(),
            kind,
        })
    }

    /// The `/` pattern.
    pub fn default_pattern() -> Self {
        Self {
            raw: "/".to_string(),
            kind: PatternKind::Default,
        }
    }

    /// Returns the pattern text as declared.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the rule this pattern participates in.
    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    /// For prefix patterns, the pattern without its trailing `/*`.
    ///
    /// `/*` yields the empty string. Other kinds yield `None`.
    pub fn prefix(&self) -> Option<&str> {
        match self.kind {
            PatternKind::Prefix => Some(&self.raw[..self.raw.len() - 2]),
            _ => None,
        }
    }

    /// For extension patterns, the extension without `*.`.
    pub fn extension(&self) -> Option<&str> {
        match self.kind {
            PatternKind::Extension => Some(&self.raw[2..]),
            _ => None,
        }
    }

    /// Returns whether `path` satisfies this pattern's own rule.
    ///
    /// The default pattern matches every path; it only loses to the other
    /// rules through [`PatternKind::PRECEDENCE`].
    pub fn matches(&self, path: &str) -> bool {
        match self.kind {
            PatternKind::Exact => self.raw == path,
            PatternKind::Prefix => prefix_matches(&self.raw[..self.raw.len() - 2], path),
            PatternKind::Extension => extension_matches(&self.raw[2..], path),
            PatternKind::Default => true,
        }
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for UrlPattern {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// `prefix` is the pattern minus `/*`. The path must equal it or continue
/// with `/` right after it.
fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// The last `.` must come after the last `/` and must not end the path.
///
/// A dot right after the slash still counts, so `/app/.jsp` matches `jsp`.
fn extension_matches(ext: &str, path: &str) -> bool {
    let Some(slash) = path.rfind('/') else {
        return false;
    };
    let Some(period) = path.rfind('.') else {
        return false;
    };
    period > slash && period != path.len() - 1 && &path[period + 1..] == ext
}
