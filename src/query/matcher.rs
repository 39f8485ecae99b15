//! Word matching rules shared by the disk and memory indexes.
//!
//! An exact, case-sensitive key is answered by a direct table lookup; every
//! other rule (and a `None` key, which dumps the table) scans the word set
//! with a compiled [`WordMatcher`].

use crate::error::{IndexError, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// How a query key is compared against indexed words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[default]
    Exact,
    Prefix,
    /// `*` matches any run of characters, `?` exactly one
    Pattern,
    /// Full-word regular expression
    Regex,
    /// `NPE` or `NuPoEx` matches `NullPointerException`
    CamelCase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRule {
    pub mode: MatchMode,
    pub case_sensitive: bool,
}

impl Default for MatchRule {
    fn default() -> Self {
        Self::EXACT
    }
}

impl MatchRule {
    pub const EXACT: MatchRule = MatchRule {
        mode: MatchMode::Exact,
        case_sensitive: true,
    };

    pub fn new(mode: MatchMode, case_sensitive: bool) -> Self {
        Self {
            mode,
            case_sensitive,
        }
    }

    pub fn exact() -> Self {
        Self::EXACT
    }

    pub fn prefix() -> Self {
        Self::new(MatchMode::Prefix, true)
    }

    pub fn pattern() -> Self {
        Self::new(MatchMode::Pattern, true)
    }

    pub fn regex() -> Self {
        Self::new(MatchMode::Regex, true)
    }

    pub fn camel_case() -> Self {
        Self::new(MatchMode::CamelCase, true)
    }

    pub fn ignore_case(self) -> Self {
        Self {
            case_sensitive: false,
            ..self
        }
    }

    /// Whether a key under this rule can be answered by hash lookup
    pub fn is_direct_lookup(&self) -> bool {
        self.mode == MatchMode::Exact && self.case_sensitive
    }
}

enum Kind {
    All,
    Exact(String),
    ExactIgnoreCase(String),
    Prefix(String),
    PrefixIgnoreCase(String),
    Regex(Regex),
    CamelCase { key: String, case_sensitive: bool },
}

/// A query key compiled against a [`MatchRule`]
pub struct WordMatcher {
    kind: Kind,
}

impl WordMatcher {
    /// Compile `key` under `rule`. A `None` key matches every word.
    pub fn new(key: Option<&str>, rule: MatchRule) -> Result<Self> {
        let Some(key) = key else {
            return Ok(Self { kind: Kind::All });
        };

        let kind = match (rule.mode, rule.case_sensitive) {
            (MatchMode::Exact, true) => Kind::Exact(key.to_string()),
            (MatchMode::Exact, false) => Kind::ExactIgnoreCase(key.to_lowercase()),
            (MatchMode::Prefix, true) => Kind::Prefix(key.to_string()),
            (MatchMode::Prefix, false) => Kind::PrefixIgnoreCase(key.to_lowercase()),
            (MatchMode::Pattern, case_sensitive) => {
                Kind::Regex(compile(key, &wildcard_to_regex(key), case_sensitive)?)
            }
            (MatchMode::Regex, case_sensitive) => {
                Kind::Regex(compile(key, &format!("^(?:{})$", key), case_sensitive)?)
            }
            (MatchMode::CamelCase, case_sensitive) => Kind::CamelCase {
                key: key.to_string(),
                case_sensitive,
            },
        };

        Ok(Self { kind })
    }

    pub fn matches(&self, word: &str) -> bool {
        match &self.kind {
            Kind::All => true,
            Kind::Exact(key) => word == key,
            Kind::ExactIgnoreCase(key) => word.to_lowercase() == *key,
            Kind::Prefix(key) => word.starts_with(key.as_str()),
            Kind::PrefixIgnoreCase(key) => word.to_lowercase().starts_with(key.as_str()),
            Kind::Regex(regex) => regex.is_match(word),
            Kind::CamelCase {
                key,
                case_sensitive,
            } => {
                camel_case_match(key, word, *case_sensitive)
                    || if *case_sensitive {
                        word.starts_with(key.as_str())
                    } else {
                        word.to_lowercase().starts_with(&key.to_lowercase())
                    }
            }
        }
    }
}

fn compile(key: &str, source: &str, case_sensitive: bool) -> Result<Regex> {
    RegexBuilder::new(source)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|source| IndexError::Pattern {
            pattern: key.to_string(),
            source,
        })
}

/// Translate a `*`/`?` wildcard into an anchored regular expression
fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    out.push('$');
    out
}

/// Split an identifier into camel-case humps: a new hump starts at every
/// uppercase letter and at the first digit of a digit run. `_` and `$` only
/// separate.
fn humps(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    let mut prev_digit = false;

    for (i, ch) in s.char_indices() {
        if ch == '_' || ch == '$' {
            if let Some(st) = start.take() {
                out.push(&s[st..i]);
            }
            prev_digit = false;
            continue;
        }

        let is_digit = ch.is_ascii_digit();
        let boundary = ch.is_uppercase() || (is_digit && !prev_digit);
        match start {
            Some(st) if boundary => {
                if st < i {
                    out.push(&s[st..i]);
                }
                start = Some(i);
            }
            None => start = Some(i),
            _ => {}
        }
        prev_digit = is_digit;
    }

    if let Some(st) = start {
        out.push(&s[st..]);
    }
    out
}

/// Hump boundaries always come from the pattern as written; `case_sensitive`
/// only decides how each hump is compared.
fn camel_case_match(pattern: &str, word: &str, case_sensitive: bool) -> bool {
    let pattern_humps = humps(pattern);
    let word_humps = humps(word);
    let starts_with = |hump: &str, prefix: &str| {
        if case_sensitive {
            hump.starts_with(prefix)
        } else {
            hump.to_lowercase().starts_with(&prefix.to_lowercase())
        }
    };

    let Some((first, rest)) = pattern_humps.split_first() else {
        return true;
    };
    // The first hump is anchored at the start of the word
    if !word_humps.first().is_some_and(|h| starts_with(h, first)) {
        return false;
    }

    let mut next = 1;
    for hump in rest {
        match word_humps
            .get(next..)
            .and_then(|tail| tail.iter().position(|w| starts_with(w, hump)))
        {
            Some(i) => next += i + 1,
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(key: &str, rule: MatchRule) -> WordMatcher {
        WordMatcher::new(Some(key), rule).unwrap()
    }

    #[test]
    fn test_exact_and_case() {
        assert!(matcher("Foo", MatchRule::exact()).matches("Foo"));
        assert!(!matcher("Foo", MatchRule::exact()).matches("foo"));
        assert!(matcher("Foo", MatchRule::exact().ignore_case()).matches("fOO"));
    }

    #[test]
    fn test_prefix() {
        assert!(matcher("get", MatchRule::prefix()).matches("getUser"));
        assert!(!matcher("Get", MatchRule::prefix()).matches("getUser"));
        assert!(matcher("Get", MatchRule::prefix().ignore_case()).matches("getUser"));
    }

    #[test]
    fn test_wildcard_pattern() {
        let m = matcher("get*By?d", MatchRule::pattern());
        assert!(m.matches("getUserById"));
        assert!(!m.matches("getUserByName"));
        // Regex metacharacters in the key are literal
        assert!(matcher("a.b*", MatchRule::pattern()).matches("a.bc"));
        assert!(!matcher("a.b*", MatchRule::pattern()).matches("axbc"));
    }

    #[test]
    fn test_regex_is_full_match() {
        let m = matcher("Foo[0-9]+", MatchRule::regex());
        assert!(m.matches("Foo12"));
        assert!(!m.matches("XFoo12"));
        assert!(WordMatcher::new(Some("("), MatchRule::regex()).is_err());
    }

    #[test]
    fn test_camel_case() {
        let rule = MatchRule::camel_case();
        assert!(matcher("NPE", rule).matches("NullPointerException"));
        assert!(matcher("NuPoEx", rule).matches("NullPointerException"));
        assert!(matcher("NPEx", rule).matches("NullPointerException"));
        assert!(!matcher("NPX", rule).matches("NullPointerException"));
        assert!(!matcher("PE", rule).matches("NullPointerException"));
        // Falls back to prefix matching
        assert!(matcher("Null", rule).matches("NullPointerException"));
    }

    #[test]
    fn test_camel_case_ignore_case() {
        let sensitive = MatchRule::camel_case();
        let insensitive = MatchRule::camel_case().ignore_case();
        assert!(!matcher("nPE", sensitive).matches("NullPointerException"));
        assert!(matcher("nPE", insensitive).matches("NullPointerException"));
        assert!(!matcher("GUBI", sensitive).matches("getUserById"));
        assert!(matcher("GUBI", insensitive).matches("getUserById"));
        assert!(!matcher("gUX", insensitive).matches("getUserById"));
    }

    #[test]
    fn test_humps() {
        assert_eq!(humps("getUserById"), vec!["get", "User", "By", "Id"]);
        assert_eq!(humps("HTTPServer"), vec!["H", "T", "T", "P", "Server"]);
        assert_eq!(humps("snake_case_name"), vec!["snake", "case", "name"]);
        assert_eq!(humps("Vec3d"), vec!["Vec", "3d"]);
    }

    #[test]
    fn test_dump_matches_everything() {
        let m = WordMatcher::new(None, MatchRule::exact()).unwrap();
        assert!(m.matches("anything"));
    }
}
