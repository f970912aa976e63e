/// Path matching for descriptor visibility
///
/// A `match` rule is normalized once, when the descriptor is authored or
/// loaded, into either an exact path or a compiled pattern. Evaluation then
/// only asks the normalized rule whether it admits the current path.
use crate::error::{PaperError, PaperResult};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Wildcard marker accepted inside plain string rules
pub const WILDCARD: char = '*';

/// Normalized visibility rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "MatchSpec", into = "MatchSpec")]
pub enum Match {
    /// Visible only when the path is byte-for-byte equal
    Exact(String),
    /// Visible when the pattern matches anywhere in the path
    Pattern(Regex),
}

/// Authoring form of a rule, as it appears in descriptor JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchSpec {
    Text(String),
    Regex { regex: String },
}

impl Match {
    /// Normalize a string rule. A rule containing `*` becomes an anchored
    /// pattern where each `*` matches any sequence; anything else is exact.
    pub fn parse(rule: &str) -> PaperResult<Self> {
        if !rule.contains(WILDCARD) {
            return Ok(Match::Exact(rule.to_string()));
        }

        let body = rule
            .split(WILDCARD)
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        Self::regex(&format!("^{}$", body))
    }

    /// Compile a user-supplied pattern
    pub fn regex(pattern: &str) -> PaperResult<Self> {
        Regex::new(pattern)
            .map(Match::Pattern)
            .map_err(|source| PaperError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Match::Exact(expected) => expected == path,
            Match::Pattern(re) => re.is_match(path),
        }
    }
}

/// Visibility decision for an optional rule; no rule means always visible
pub fn is_visible(rule: Option<&Match>, path: &str) -> bool {
    rule.map_or(true, |rule| rule.matches(path))
}

impl TryFrom<MatchSpec> for Match {
    type Error = PaperError;

    fn try_from(authored: MatchSpec) -> Result<Self, Self::Error> {
        match authored {
            MatchSpec::Text(text) => Match::parse(&text),
            MatchSpec::Regex { regex } => Match::regex(&regex),
        }
    }
}

impl From<Match> for MatchSpec {
    fn from(rule: Match) -> Self {
        match rule {
            Match::Exact(text) => MatchSpec::Text(text),
            Match::Pattern(re) => MatchSpec::Regex {
                regex: re.as_str().to_string(),
            },
        }
    }
}
