//! Filter input tokens
//!
//! A sample filter hashes an ordered list of inputs. Each input is written in
//! the filter source either as the identifier sentinel [`USER_ID_SENTINEL`]
//! or as a quoted string constant:
//!
//! - `normandy.userId` → replaced with the candidate identifier
//! - `'global-v2'` / `"global-v2"` → the constant `global-v2`

use crate::error::FilterError;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Placeholder substituted with the candidate identifier during search
pub const USER_ID_SENTINEL: &str = "normandy.userId";

/// Quote style of a constant token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quote {
    /// `'value'`
    Single,
    /// `"value"`
    Double,
}

impl Quote {
    #[inline]
    fn as_char(self) -> char {
        match self {
            Quote::Single => '\'',
            Quote::Double => '"',
        }
    }

    #[inline]
    fn from_char(c: char) -> Option<Self> {
        match c {
            '\'' => Some(Quote::Single),
            '"' => Some(Quote::Double),
            _ => None,
        }
    }
}

/// Parsed filter input token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// The identifier sentinel
    UserId,
    /// A quoted string constant
    Literal {
        /// Unquoted contents
        value: String,
        /// Original quote style, kept for display
        quote: Quote,
    },
}

impl Token {
    /// Create a single-quoted literal
    #[inline]
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
            quote: Quote::Single,
        }
    }

    /// Parse a raw token
    ///
    /// # Errors
    /// [`FilterError::InvalidTokenFormat`] if the token is neither the
    /// sentinel nor wrapped in matching quotes.
    pub fn parse(raw: &str) -> Result<Self, FilterError> {
        if raw == USER_ID_SENTINEL {
            return Ok(Token::UserId);
        }

        let mut chars = raw.chars();
        let first = chars.next();
        let last = chars.next_back();

        match (first.and_then(Quote::from_char), last) {
            (Some(quote), Some(end)) if end == quote.as_char() => Ok(Token::Literal {
                value: raw[1..raw.len() - 1].to_string(),
                quote,
            }),
            _ => Err(FilterError::InvalidTokenFormat {
                token: raw.to_string(),
            }),
        }
    }

    /// Parse an ordered list of raw tokens, failing on the first malformed one
    ///
    /// # Errors
    /// [`FilterError::InvalidTokenFormat`] naming the first bad token.
    pub fn parse_all<S: AsRef<str>>(raw: &[S]) -> Result<Vec<Self>, FilterError> {
        raw.iter().map(|t| Token::parse(t.as_ref())).collect()
    }

    /// Check if this is the identifier sentinel
    #[inline]
    #[must_use]
    pub fn is_user_id(&self) -> bool {
        matches!(self, Token::UserId)
    }

    /// Value passed to the bucket predicate for this token
    #[inline]
    #[must_use]
    pub fn resolve<'a>(&'a self, identifier: &'a str) -> &'a str {
        match self {
            Token::UserId => identifier,
            Token::Literal { value, .. } => value,
        }
    }
}

impl FromStr for Token {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Token::parse(s)
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Token::UserId => f.write_str(USER_ID_SENTINEL),
            Token::Literal { value, quote } => {
                let q = quote.as_char();
                write!(f, "{q}{value}{q}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_parses() {
        assert_eq!(Token::parse("normandy.userId").unwrap(), Token::UserId);
    }

    #[test]
    fn single_and_double_quoted_literals() {
        let single = Token::parse("'global-v2'").unwrap();
        let double = Token::parse("\"global-v2\"").unwrap();

        assert_eq!(single.resolve("ignored"), "global-v2");
        assert_eq!(double.resolve("ignored"), "global-v2");
        assert_eq!(single.to_string(), "'global-v2'");
        assert_eq!(double.to_string(), "\"global-v2\"");
    }

    #[test]
    fn empty_literal_is_allowed() {
        let token = Token::parse("''").unwrap();
        assert_eq!(token.resolve("id"), "");
    }

    #[test]
    fn malformed_tokens_rejected() {
        for raw in ["foo", "", "'", "'abc", "abc'", "'abc\"", "normandy.userid", " normandy.userId"] {
            let err = Token::parse(raw).unwrap_err();
            assert_eq!(
                err,
                FilterError::InvalidTokenFormat {
                    token: raw.to_string()
                },
                "token {raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn parse_all_reports_first_bad_token() {
        let err = Token::parse_all(&["normandy.userId", "bar", "baz"]).unwrap_err();
        assert!(matches!(err, FilterError::InvalidTokenFormat { token } if token == "bar"));
    }

    #[test]
    fn sentinel_resolves_to_identifier() {
        assert_eq!(Token::UserId.resolve("test-userId-7"), "test-userId-7");
        assert!(Token::UserId.is_user_id());
        assert!(!Token::literal("x").is_user_id());
    }

    #[test]
    fn multibyte_literal() {
        let token = Token::parse("'ünï'").unwrap();
        assert_eq!(token.resolve(""), "ünï");
    }
}
