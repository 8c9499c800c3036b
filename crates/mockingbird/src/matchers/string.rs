//! String patterns shared by the path, header, query, cookie and body matchers.

use super::{MISMATCH, PERFECT};
use regex::Regex;
use std::sync::Arc;

/// A string value with pre-computed lowercase for case-insensitive matching.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue {
    pub value: String,
    pub lower: String,
}

impl CachedValue {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let lower = value.to_lowercase();
        Self { value, lower }
    }

    #[inline]
    fn fold(&self, ignore_case: bool) -> &str {
        if ignore_case {
            &self.lower
        } else {
            &self.value
        }
    }
}

/// How several pattern scores are folded into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchOperator {
    /// Best score wins.
    #[default]
    Or,
    /// Worst score wins.
    And,
    /// Mean of all scores.
    Average,
}

impl MatchOperator {
    pub fn aggregate(self, scores: impl IntoIterator<Item = f64>) -> f64 {
        let scores: Vec<f64> = scores.into_iter().collect();
        if scores.is_empty() {
            return MISMATCH;
        }
        match self {
            MatchOperator::Or => scores.iter().copied().fold(MISMATCH, f64::max),
            MatchOperator::And => scores.iter().copied().fold(PERFECT, f64::min),
            MatchOperator::Average => scores.iter().sum::<f64>() / scores.len() as f64,
        }
    }
}

#[derive(Debug, Clone)]
enum Pattern {
    Exact(CachedValue),
    Contains(CachedValue),
    StartsWith(CachedValue),
    EndsWith(CachedValue),
    Regex(Arc<Regex>),
    Exists(bool),
}

/// A single compiled string pattern.
#[derive(Debug, Clone)]
pub struct StringMatcher {
    pattern: Pattern,
    ignore_case: bool,
}

impl StringMatcher {
    pub fn exact(value: impl Into<String>) -> Self {
        Self::from_pattern(Pattern::Exact(CachedValue::new(value)))
    }

    pub fn contains(value: impl Into<String>) -> Self {
        Self::from_pattern(Pattern::Contains(CachedValue::new(value)))
    }

    pub fn starts_with(value: impl Into<String>) -> Self {
        Self::from_pattern(Pattern::StartsWith(CachedValue::new(value)))
    }

    pub fn ends_with(value: impl Into<String>) -> Self {
        Self::from_pattern(Pattern::EndsWith(CachedValue::new(value)))
    }

    /// Regex pattern. Case sensitivity belongs in the pattern itself (`(?i)`).
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::from_pattern(Pattern::Regex(Arc::new(Regex::new(
            pattern,
        )?))))
    }

    /// Matches on presence (or absence) of the value only.
    pub fn exists(should_exist: bool) -> Self {
        Self::from_pattern(Pattern::Exists(should_exist))
    }

    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    fn from_pattern(pattern: Pattern) -> Self {
        Self {
            pattern,
            ignore_case: false,
        }
    }

    /// The literal value of an exact pattern.
    pub fn exact_value(&self) -> Option<&str> {
        match &self.pattern {
            Pattern::Exact(cached) => Some(&cached.value),
            _ => None,
        }
    }

    /// Whether `value` satisfies the pattern. `None` means the field is absent.
    pub fn is_match(&self, value: Option<&str>) -> bool {
        let value = match (&self.pattern, value) {
            (Pattern::Exists(should_exist), v) => return *should_exist == v.is_some(),
            (Pattern::Regex(regex), Some(v)) => return regex.is_match(v),
            (_, None) => return false,
            (_, Some(v)) => v,
        };

        let folded;
        let value = if self.ignore_case {
            folded = value.to_lowercase();
            folded.as_str()
        } else {
            value
        };

        match &self.pattern {
            Pattern::Exact(cached) => value == cached.fold(self.ignore_case),
            Pattern::Contains(cached) => value.contains(cached.fold(self.ignore_case)),
            Pattern::StartsWith(cached) => value.starts_with(cached.fold(self.ignore_case)),
            Pattern::EndsWith(cached) => value.ends_with(cached.fold(self.ignore_case)),
            Pattern::Regex(_) | Pattern::Exists(_) => false,
        }
    }

    pub fn score(&self, value: Option<&str>) -> f64 {
        if self.is_match(value) {
            PERFECT
        } else {
            MISMATCH
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_case_handling() {
        let matcher = StringMatcher::exact("Test");
        assert!(matcher.is_match(Some("Test")));
        assert!(!matcher.is_match(Some("test")));
        assert!(!matcher.is_match(None));

        let matcher = StringMatcher::exact("Test").ignore_case();
        assert!(matcher.is_match(Some("tEsT")));
    }

    #[test]
    fn test_contains_prefix_suffix() {
        assert!(StringMatcher::contains("api").is_match(Some("/api/v1")));
        assert!(StringMatcher::starts_with("/api").is_match(Some("/api/users")));
        assert!(!StringMatcher::starts_with("/api").is_match(Some("/API/users")));
        assert!(StringMatcher::starts_with("/api")
            .ignore_case()
            .is_match(Some("/API/users")));
        assert!(StringMatcher::ends_with(".json").is_match(Some("data.json")));
    }

    #[test]
    fn test_regex() {
        let matcher = StringMatcher::regex(r"^/api/v\d+/").unwrap();
        assert!(matcher.is_match(Some("/api/v2/items")));
        assert!(!matcher.is_match(Some("/api/items")));
        assert!(StringMatcher::regex("(unclosed").is_err());
    }

    #[test]
    fn test_exists() {
        assert!(StringMatcher::exists(true).is_match(Some("")));
        assert!(!StringMatcher::exists(true).is_match(None));
        assert!(StringMatcher::exists(false).is_match(None));
    }

    #[test]
    fn test_operator_aggregate() {
        let scores = [1.0, 0.0, 1.0, 0.0];
        assert_eq!(MatchOperator::Or.aggregate(scores), 1.0);
        assert_eq!(MatchOperator::And.aggregate(scores), 0.0);
        assert_eq!(MatchOperator::Average.aggregate(scores), 0.5);
        assert_eq!(MatchOperator::Or.aggregate(Vec::new()), 0.0);
    }
}
