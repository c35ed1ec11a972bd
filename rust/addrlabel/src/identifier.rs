//! Identifier: base58 public-key detection primitives
//!
//! A well-formed identifier is 32-44 characters drawn from the 58-symbol
//! alphabet (no `0`, `O`, `I`, `l`). Only structure is checked; there is no
//! checksum or curve validation.
//!
//! The same alphabet drives three things:
//! - strict full-string validation (`is_valid_identifier`)
//! - substring location inside free text (`CHAR_CLASS` based regexes)
//! - the fixed `first5...last5` display elision

use serde::{Deserialize, Serialize};
use std::fmt;
use wasm_bindgen::prelude::*;

// =============================================================================
// Constants
// =============================================================================

/// The 58 symbols an identifier may contain, in base58 order
pub const ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Regex character class equivalent to `ALPHABET`
pub const CHAR_CLASS: &str = "[1-9A-HJ-NP-Za-km-z]";

/// Shortest valid identifier
pub const MIN_LEN: usize = 32;

/// Longest valid identifier
pub const MAX_LEN: usize = 44;

/// Characters kept on each side of the elision token
pub const DISPLAY_EDGE: usize = 5;

/// Token joining the two halves of an elided identifier
pub const ELISION_TOKEN: &str = "...";

// =============================================================================
// Validation
// =============================================================================

/// True if `c` belongs to the base58 alphabet
#[inline]
pub fn is_alphabet_char(c: char) -> bool {
    matches!(c, '1'..='9' | 'A'..='H' | 'J'..='N' | 'P'..='Z' | 'a'..='k' | 'm'..='z')
}

/// Classify a string as a structurally valid identifier.
///
/// Surrounding whitespace is ignored. Never panics.
pub fn is_valid_identifier(s: &str) -> bool {
    let trimmed = s.trim();
    // Every alphabet char is ASCII, so byte length == char length once the
    // charset check passes.
    (MIN_LEN..=MAX_LEN).contains(&trimmed.len()) && trimmed.chars().all(is_alphabet_char)
}

/// JS binding: accepts any value, non-strings are simply invalid
#[wasm_bindgen(js_name = isValidIdentifier)]
pub fn js_is_valid_identifier(value: JsValue) -> bool {
    value.as_string().is_some_and(|s| is_valid_identifier(&s))
}

// =============================================================================
// Identifier
// =============================================================================

/// A validated identifier. Immutable; compared by exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Parse (trimming) a candidate. `None` is the normal rejection outcome.
    pub fn parse(candidate: &str) -> Option<Self> {
        if is_valid_identifier(candidate) {
            Some(Self(candidate.trim().to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fixed display elision: `first5...last5`
    pub fn elided(&self) -> String {
        elide(&self.0)
    }

    /// True if this identifier could be what an on-page `prefix...suffix`
    /// display refers to.
    pub fn matches_elided(&self, prefix: &str, suffix: &str) -> bool {
        prefix.len() + suffix.len() <= self.0.len()
            && self.0.starts_with(prefix)
            && self.0.ends_with(suffix)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identifier::parse(&value).ok_or_else(|| format!("not a valid identifier: {value}"))
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

/// Elide any string to `first5...last5`. Short strings are returned as-is.
pub fn elide(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= DISPLAY_EDGE * 2 {
        return s.to_string();
    }
    let head: String = chars[..DISPLAY_EDGE].iter().collect();
    let tail: String = chars[chars.len() - DISPLAY_EDGE..].iter().collect();
    format!("{head}{ELISION_TOKEN}{tail}")
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_44: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

    fn run_of(len: usize) -> String {
        ALPHABET.chars().cycle().take(len).collect()
    }

    #[test]
    fn test_alphabet_has_58_symbols() {
        assert_eq!(ALPHABET.len(), 58);
        assert!(ALPHABET.chars().all(is_alphabet_char));
        for excluded in ['0', 'O', 'I', 'l', '+', '/', ' '] {
            assert!(!is_alphabet_char(excluded), "{excluded} must be excluded");
        }
    }

    #[test]
    fn test_length_boundaries() {
        assert!(!is_valid_identifier(&run_of(31)));
        assert!(is_valid_identifier(&run_of(32)));
        assert!(is_valid_identifier(&run_of(44)));
        assert!(!is_valid_identifier(&run_of(45)));
    }

    #[test]
    fn test_trims_before_checking() {
        assert!(is_valid_identifier(&format!("  {VALID_44}\n")));
        assert_eq!(Identifier::parse(&format!(" {VALID_44} ")).unwrap().as_str(), VALID_44);
    }

    #[test]
    fn test_rejects_ambiguous_characters() {
        for bad in ['0', 'O', 'I', 'l'] {
            let mut s = run_of(40);
            s.replace_range(10..11, &bad.to_string());
            assert!(!is_valid_identifier(&s), "should reject {bad}");
        }
    }

    #[test]
    fn test_rejects_empty_and_inner_whitespace() {
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("   "));
        let spaced = format!("{} {}", run_of(20), run_of(20));
        assert!(!is_valid_identifier(&spaced));
    }

    #[test]
    fn test_rejects_multibyte_of_valid_length() {
        // 32 chars but multi-byte: must not slip through the length check
        let s: String = "é".repeat(32);
        assert!(!is_valid_identifier(&s));
    }

    #[test]
    fn test_property_matches_definition() {
        // Exhaustive-ish sweep: every length 0..=50 over a few seeds
        for len in 0..=50 {
            for seed in 0..4 {
                let s: String = ALPHABET.chars().cycle().skip(seed * 7).take(len).collect();
                let expected = (MIN_LEN..=MAX_LEN).contains(&len);
                assert_eq!(is_valid_identifier(&s), expected, "len={len} seed={seed}");
            }
        }
    }

    #[test]
    fn test_elided_display() {
        let id = Identifier::parse(VALID_44).unwrap();
        assert_eq!(id.elided(), "9WzDX...tAWWM");
        assert_eq!(elide("short"), "short");
    }

    #[test]
    fn test_matches_elided() {
        let id = Identifier::parse(VALID_44).unwrap();
        assert!(id.matches_elided("9WzDX", "tAWWM"));
        assert!(id.matches_elided("9WzDXwB", "AWWM"));
        assert!(!id.matches_elided("9WzDY", "tAWWM"));
        assert!(!id.matches_elided(VALID_44, VALID_44));
    }

    #[test]
    fn test_serde_rejects_invalid() {
        let ok: Identifier = serde_json::from_str(&format!("\"{VALID_44}\"")).unwrap();
        assert_eq!(ok.as_str(), VALID_44);
        assert!(serde_json::from_str::<Identifier>("\"not-an-address\"").is_err());
    }
}
