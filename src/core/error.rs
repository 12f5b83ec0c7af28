//! Error taxonomy for reference resolution and text fetching.
//!
//! All fallible operations in the crate return tagged results built from
//! these enums. Parse and decode errors are `Clone` so memoized results can
//! be handed out without re-parsing.

use thiserror::Error;

// ============================================================================
// DecodeError
// ============================================================================

/// Numeral codec errors.
///
/// Decoding fails loudly on out-of-vocabulary input; it never clamps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty numeral string")]
    Empty,

    #[error("`{0}` is not a numeral letter")]
    UnknownLetter(char),

    #[error("`{0}` is not a folio address")]
    BadFolio(String),

    #[error("`{0}` is not a positive number")]
    BadNumber(String),

    #[error("{0} is outside the encodable range")]
    OutOfRange(u32),
}

// ============================================================================
// RefError
// ============================================================================

/// Reference parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefError {
    /// No known work title is a prefix of the input.
    #[error("unknown book in `{0}`")]
    UnknownBook(String),

    /// A title matched but the remainder fails the address grammar.
    #[error("bad section string `{input}`: {reason}")]
    BadSectionString { input: String, reason: String },

    /// An address component failed numeral decoding.
    #[error("bad address component")]
    Decode(#[from] DecodeError),
}

impl RefError {
    pub fn bad_section(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadSectionString {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// FetchError
// ============================================================================

/// Backend fetch errors.
///
/// Passed through to callers untouched and never written into the cache -
/// caching an error payload would poison subsequent lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The backend reported an error for this reference.
    #[error("backend error for `{tref}`: {message}")]
    Backend { tref: String, message: String },

    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// The response arrived but could not be interpreted.
    #[error("malformed payload for `{tref}`: {message}")]
    Payload { tref: String, message: String },
}

impl FetchError {
    pub fn backend(tref: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            tref: tref.into(),
            message: message.into(),
        }
    }

    pub fn payload(tref: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Payload {
            tref: tref.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_error_display() {
        let err = RefError::UnknownBook("Nonexistent 1:1".to_string());
        assert!(format!("{err}").contains("Nonexistent 1:1"));

        let err = RefError::bad_section("Genesis x:y", "not a number");
        let display = format!("{err}");
        assert!(display.contains("Genesis x:y"));
        assert!(display.contains("not a number"));
    }

    #[test]
    fn test_decode_error_into_ref_error() {
        let err: RefError = DecodeError::UnknownLetter('q').into();
        assert!(matches!(err, RefError::Decode(DecodeError::UnknownLetter('q'))));
    }

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::backend("Genesis.1", "500");
        let display = format!("{err}");
        assert!(display.contains("Genesis.1"));
        assert!(display.contains("500"));
    }
}
