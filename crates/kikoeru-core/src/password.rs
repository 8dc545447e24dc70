//! Password hints embedded in upload names.
//!
//! An upload named `RJ01 pass-p1 (p 2).zip` carries the chain `["p1", "p 2"]`:
//! `p1` opens the outer archive and `p 2` the archive found inside it.
//! Tokens are separated by whitespace; a parenthesized token keeps its
//! content verbatim, spaces included, and may be empty.

use kikoeru_archive::format;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+pass-").unwrap());

/// Ordered passwords, index `i` belonging to the archive at nesting depth `i`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PasswordChain(Vec<String>);

impl PasswordChain {
    pub fn new(passwords: Vec<String>) -> Self {
        Self(passwords)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Password for `depth`, or `None` once the chain is exhausted.
    pub fn level(&self, depth: usize) -> Option<&str> {
        self.0.get(depth).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// A password marker that could not be parsed. Never fatal.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PasswordAnomaly {
    #[error("unbalanced parenthesis in password hint at byte {0}")]
    UnbalancedParenthesis(usize),

    #[error("password marker carries no tokens")]
    NoTokens,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedName {
    /// The name with the marker and its tokens removed, extension kept.
    pub cleaned_name: String,
    /// `cleaned_name` without its archive extension.
    pub base_name: String,
    pub chain: PasswordChain,
    pub anomaly: Option<PasswordAnomaly>,
}

/// Split the password hint off a file name.
///
/// A malformed hint leaves the name untouched and yields an empty chain,
/// with the reason in [`ResolvedName::anomaly`].
pub fn resolve(name: &str) -> ResolvedName {
    let (stem, ext) = match format::split_extension(name) {
        Some((stem, ext, _)) => (stem, ext),
        None => (name, ""),
    };

    let unchanged = |anomaly| ResolvedName {
        cleaned_name: name.to_string(),
        base_name: stem.to_string(),
        chain: PasswordChain::empty(),
        anomaly,
    };

    let Some(marker) = MARKER.find(stem) else {
        return unchanged(None);
    };

    let prefix = &stem[..marker.start()];
    match tokenize(&stem[marker.end()..]) {
        Ok(tokens) if tokens.is_empty() => unchanged(Some(PasswordAnomaly::NoTokens)),
        Ok(tokens) => ResolvedName {
            cleaned_name: format!("{prefix}{ext}"),
            base_name: prefix.to_string(),
            chain: PasswordChain::new(tokens),
            anomaly: None,
        },
        Err(anomaly) => unchanged(Some(anomaly)),
    }
}

fn tokenize(hint: &str) -> Result<Vec<String>, PasswordAnomaly> {
    let mut tokens = Vec::new();
    let mut rest = hint;

    loop {
        let trimmed = rest.trim_start();
        let offset = hint.len() - trimmed.len();
        if trimmed.is_empty() {
            return Ok(tokens);
        }

        if let Some(group) = trimmed.strip_prefix('(') {
            let close = group
                .find(')')
                .ok_or(PasswordAnomaly::UnbalancedParenthesis(offset))?;
            tokens.push(group[..close].to_string());
            rest = &group[close + 1..];
        } else {
            let end = trimmed
                .find(|c: char| c.is_whitespace() || c == '(')
                .unwrap_or(trimmed.len());
            tokens.push(trimmed[..end].to_string());
            rest = &trimmed[end..];
        }
    }
}
