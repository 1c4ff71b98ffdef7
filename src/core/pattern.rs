//! Pattern: configured tokens compiled into key/value search expressions

use crate::core::error::DetectorError;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Tokens searched for when nothing is configured.
pub const DEFAULT_TOKENS: &[&str] = &[
    ".amazoncognito.com",
    "access_token",
    "client_secret",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "OPENAI_API_KEY",
];

/// Compiled size cap for a single token expression.
pub const DEFAULT_SIZE_LIMIT: usize = 1 << 20;

/// Ordered token list. Immutable once built; duplicates are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternSet {
    tokens: Vec<String>,
}

impl PatternSet {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { tokens: tokens.into_iter().map(Into::into).collect() }
    }

    pub fn tokens(&self) -> &[String] { &self.tokens }
    pub fn len(&self) -> usize { self.tokens.len() }
    pub fn is_empty(&self) -> bool { self.tokens.is_empty() }

    /// Parse a comma-separated list, dropping blanks.
    pub fn from_csv(list: &str) -> Self {
        Self::new(list.split(',').map(str::trim).filter(|t| !t.is_empty()))
    }

    pub fn compile(&self) -> CompiledPatterns { CompiledPatterns::compile(self) }
}

impl Default for PatternSet {
    fn default() -> Self { Self::new(DEFAULT_TOKENS.iter().copied()) }
}

/// One token and its key/value expression.
#[derive(Debug, Clone)]
pub struct TokenPattern {
    pub token: String,
    regex: Arc<Regex>,
}

impl TokenPattern {
    /// `['"]?(token)['"]?\s*[:=]\s*['"]?([^'"\s]+)`, case-insensitive, token escaped.
    pub fn compile(token: &str, size_limit: usize) -> Result<Self, DetectorError> {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(DetectorError::PatternCompile { token: token.to_string(), reason: "empty token".into() });
        }
        let expr = format!(r#"['"]?({})['"]?\s*[:=]\s*['"]?([^'"\s]+)"#, regex::escape(trimmed));
        let regex = RegexBuilder::new(&expr)
            .case_insensitive(true)
            .size_limit(size_limit)
            .build()
            .map_err(|e| DetectorError::PatternCompile { token: token.to_string(), reason: e.to_string() })?;
        Ok(Self { token: trimmed.to_string(), regex: Arc::new(regex) })
    }

    /// Every non-overlapping match in `text`, in order of appearance.
    pub fn find_iter<'p, 't>(&'p self, text: &'t str) -> impl Iterator<Item = Match<'t>> + 'p
    where
        't: 'p,
    {
        self.regex.captures_iter(text).filter_map(|caps| {
            let whole = caps.get(0)?;
            let (key, value) = (caps.get(1)?, caps.get(2)?);
            Some(Match { key: key.as_str(), value: value.as_str(), offset: whole.start() })
        })
    }
}

/// A single key/value hit, borrowed from the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match<'t> {
    /// Token text as it appears in the page (case preserved).
    pub key: &'t str,
    pub value: &'t str,
    /// Byte offset of the whole match.
    pub offset: usize,
}

/// Pattern set compiled once; tokens that failed to compile are kept aside.
#[derive(Debug, Clone, Default)]
pub struct CompiledPatterns {
    patterns: Vec<TokenPattern>,
    skipped: Vec<DetectorError>,
}

impl CompiledPatterns {
    pub fn compile(set: &PatternSet) -> Self { Self::compile_with_limit(set, DEFAULT_SIZE_LIMIT) }

    pub fn compile_with_limit(set: &PatternSet, size_limit: usize) -> Self {
        let mut compiled = Self::default();
        for token in set.tokens() {
            match TokenPattern::compile(token, size_limit) {
                Ok(p) => compiled.patterns.push(p),
                Err(e) => compiled.skipped.push(e),
            }
        }
        compiled
    }

    pub fn patterns(&self) -> &[TokenPattern] { &self.patterns }

    /// Compile errors, one per skipped token.
    pub fn skipped(&self) -> &[DetectorError] { &self.skipped }

    pub fn len(&self) -> usize { self.patterns.len() }
    pub fn is_empty(&self) -> bool { self.patterns.is_empty() }

    /// Lazily scan `text` once per pattern, patterns in configured order.
    pub fn extract<'p, 't>(&'p self, text: &'t str) -> impl Iterator<Item = Match<'t>> + 'p
    where
        't: 'p,
    {
        self.patterns.iter().flat_map(move |p| p.find_iter(text))
    }
}

/// One-shot extraction; compiles `patterns` on every call.
pub fn extract(text: &str, patterns: &PatternSet) -> Vec<(String, String)> {
    patterns
        .compile()
        .extract(text)
        .map(|m| (m.key.to_string(), m.value.to_string()))
        .collect()
}
