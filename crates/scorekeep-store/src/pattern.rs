// SPDX-License-Identifier: Apache-2.0

//! Key patterns for Redis `KEYS`. Patterns are built from `*` and escaped
//! literals, so the in-process matcher only needs `*`, `?` and `\` escapes.

use std::fmt::{Display, Formatter};

const GLOB_META: [char; 5] = ['*', '?', '[', ']', '\\'];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPattern {
    glob: String,
}

impl KeyPattern {
    #[must_use]
    pub fn all() -> Self {
        Self {
            glob: "*".to_string(),
        }
    }

    /// Matches every key that starts with `literal`, taken verbatim.
    #[must_use]
    pub fn prefix(literal: &str) -> Self {
        Self {
            glob: format!("{}*", escape_glob(literal)),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.glob
    }

    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        let pattern: Vec<char> = self.glob.chars().collect();
        let text: Vec<char> = key.chars().collect();
        glob_match(&pattern, &text)
    }
}

impl Display for KeyPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.glob)
    }
}

#[must_use]
pub fn escape_glob(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if GLOB_META.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn glob_match(pattern: &[char], text: &[char]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Last `*` seen and the text position it is currently absorbing up to.
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
            continue;
        }
        if p < pattern.len() {
            if let Some(next) = step(pattern, p, text[t]) {
                p = next;
                t += 1;
                continue;
            }
        }
        match star {
            Some((sp, st)) => {
                p = sp + 1;
                t = st + 1;
                star = Some((sp, st + 1));
            }
            None => return false,
        }
    }
    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

/// Matches one non-`*` token at `p` against `c`; returns the next token index.
fn step(pattern: &[char], p: usize, c: char) -> Option<usize> {
    match pattern[p] {
        '?' => Some(p + 1),
        '\\' if p + 1 < pattern.len() => (pattern[p + 1] == c).then_some(p + 2),
        other => (other == c).then_some(p + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_matches_every_key() {
        assert!(KeyPattern::all().matches(""));
        assert!(KeyPattern::all().matches("a/x"));
        assert_eq!(KeyPattern::all().as_str(), "*");
    }

    #[test]
    fn prefix_matches_only_keys_starting_with_literal() {
        let p = KeyPattern::prefix("a/");
        assert!(p.matches("a/x"));
        assert!(p.matches("a/"));
        assert!(!p.matches("ba/x"));
        assert!(!p.matches("a"));
    }

    #[test]
    fn prefix_escapes_metacharacters() {
        let p = KeyPattern::prefix("we*rd[1]?/");
        assert_eq!(p.as_str(), "we\\*rd\\[1\\]\\?/*");
        assert!(p.matches("we*rd[1]?/shard"));
        assert!(!p.matches("weXrd[1]?/shard"));
        assert!(!p.matches("we*rd[1]x/shard"));
    }
}
