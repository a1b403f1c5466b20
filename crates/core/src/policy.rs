//! Tie-breaker policy for equally short authorization paths.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How terminal edge types of tied shortest paths are combined.
///
/// - `AnyAllow`: permit if at least one tied path ends in `ALLOW`
/// - `AllAllow`: permit only if every tied path ends in `ALLOW`
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TieBreakerPolicy {
    #[default]
    AnyAllow,
    AllAllow,
}

impl TieBreakerPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            TieBreakerPolicy::AnyAllow => "ANY_ALLOW",
            TieBreakerPolicy::AllAllow => "ALL_ALLOW",
        }
    }

    /// Combine per-path verdicts (`true` = terminal `ALLOW`).
    ///
    /// An empty set of verdicts never permits.
    pub fn resolve<I>(self, verdicts: I) -> bool
    where
        I: IntoIterator<Item = bool>,
    {
        let mut verdicts = verdicts.into_iter().peekable();
        if verdicts.peek().is_none() {
            return false;
        }
        match self {
            TieBreakerPolicy::AnyAllow => verdicts.any(|v| v),
            TieBreakerPolicy::AllAllow => verdicts.all(|v| v),
        }
    }
}

impl core::fmt::Display for TieBreakerPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A string did not name a known tie-breaker policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown tie-breaker policy '{0}'")]
pub struct UnknownPolicy(pub String);

impl FromStr for TieBreakerPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ANY_ALLOW" => Ok(TieBreakerPolicy::AnyAllow),
            "ALL_ALLOW" => Ok(TieBreakerPolicy::AllAllow),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_allow_needs_one_allow() {
        assert!(TieBreakerPolicy::AnyAllow.resolve([false, true]));
        assert!(!TieBreakerPolicy::AnyAllow.resolve([false, false]));
    }

    #[test]
    fn all_allow_needs_every_allow() {
        assert!(!TieBreakerPolicy::AllAllow.resolve([false, true]));
        assert!(TieBreakerPolicy::AllAllow.resolve([true, true]));
    }

    #[test]
    fn no_verdicts_is_deny_under_both() {
        assert!(!TieBreakerPolicy::AnyAllow.resolve(std::iter::empty()));
        assert!(!TieBreakerPolicy::AllAllow.resolve(std::iter::empty()));
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("all_allow".parse::<TieBreakerPolicy>().unwrap(), TieBreakerPolicy::AllAllow);
        assert_eq!(TieBreakerPolicy::default(), TieBreakerPolicy::AnyAllow);
        assert!("most_allow".parse::<TieBreakerPolicy>().is_err());
    }
}
