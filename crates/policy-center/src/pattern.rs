//! Precompiled type-name patterns.
//!
//! Patterns are regular expressions searched anywhere in the candidate name,
//! so `evil\.` matches `com.evil.Payload` unless it is anchored with `^`.

use std::fmt;
use std::slice;

use regex::Regex;

use crate::errors::PolicyError;

/// A single compiled pattern together with the text it was built from.
#[derive(Clone, Debug)]
pub struct Pattern {
    source: String,
    matcher: Regex,
}

impl Pattern {
    pub fn compile(source: impl Into<String>) -> Result<Self, PolicyError> {
        let source = source.into();
        let matcher = Regex::new(&source).map_err(|err| PolicyError::InvalidPattern {
            pattern: source.clone(),
            detail: err.to_string(),
        })?;
        Ok(Self { source, matcher })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Partial match: true when the pattern occurs anywhere in `candidate`.
    pub fn is_match(&self, candidate: &str) -> bool {
        self.matcher.is_match(candidate)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

/// Ordered, immutable list of patterns in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compiles every source eagerly. A single invalid entry fails the whole set.
    pub fn compile<I, S>(sources: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns = sources
            .into_iter()
            .map(Pattern::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Pattern> {
        self.patterns.get(index)
    }

    pub fn iter(&self) -> slice::Iter<'_, Pattern> {
        self.patterns.iter()
    }

    /// First pattern, in declaration order, that matches `candidate`.
    pub fn first_match(&self, candidate: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|pattern| pattern.is_match(candidate))
    }

    /// Every pattern that matches `candidate`, in declaration order.
    pub fn matches<'a>(&'a self, candidate: &'a str) -> impl Iterator<Item = &'a Pattern> + 'a {
        self.patterns
            .iter()
            .filter(move |pattern| pattern.is_match(candidate))
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        self.first_match(candidate).is_some()
    }

    pub fn sources(&self) -> Vec<String> {
        self.patterns
            .iter()
            .map(|pattern| pattern.source.clone())
            .collect()
    }
}

impl<'a> IntoIterator for &'a PatternSet {
    type Item = &'a Pattern;
    type IntoIter = slice::Iter<'a, Pattern>;

    fn into_iter(self) -> Self::IntoIter {
        self.patterns.iter()
    }
}

impl fmt::Display for PatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, pattern) in self.patterns.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            f.write_str(pattern.as_str())?;
        }
        f.write_str("]")
    }
}
