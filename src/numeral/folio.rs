//! Two-sided folio numbering (daf/amud).
//!
//! Folios run `1a, 1b, 2a, 2b, ...`. The linear index is 0-based: index `i`
//! maps to folio `i/2 + 1`, side `a` when `i` is even.

use crate::core::DecodeError;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static FOLIO_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Infallible: the pattern is a literal
    Regex::new(r"^([0-9]+)([ab])?$").expect("folio pattern")
});

/// Folio side (amud).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    A,
    B,
}

impl Side {
    fn as_char(self) -> char {
        match self {
            Side::A => 'a',
            Side::B => 'b',
        }
    }
}

/// A two-sided folio address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Folio {
    /// 1-based folio number.
    pub number: u32,
    pub side: Side,
}

impl Folio {
    pub fn new(number: u32, side: Side) -> Self {
        Self { number, side }
    }

    /// Folio for a 0-based linear index.
    pub fn from_linear(i: u32) -> Self {
        Self {
            number: i / 2 + 1,
            side: if i % 2 == 0 { Side::A } else { Side::B },
        }
    }

    /// 0-based linear index of this folio.
    pub fn to_linear(self) -> u32 {
        (self.number - 1) * 2 + u32::from(self.side == Side::B)
    }
}

impl fmt::Display for Folio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.number, self.side.as_char())
    }
}

impl FromStr for Folio {
    type Err = DecodeError;

    /// Parse `"21a"` / `"21b"`. A bare number reads as side `a`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = FOLIO_RE
            .captures(s)
            .ok_or_else(|| DecodeError::BadFolio(s.to_string()))?;
        let number: u32 = caps[1]
            .parse()
            .map_err(|_| DecodeError::BadFolio(s.to_string()))?;
        if number == 0 {
            return Err(DecodeError::BadFolio(s.to_string()));
        }
        let side = match caps.get(2).map(|m| m.as_str()) {
            Some("b") => Side::B,
            _ => Side::A,
        };
        Ok(Self { number, side })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_linear() {
        assert_eq!(Folio::from_linear(0), Folio::new(1, Side::A));
        assert_eq!(Folio::from_linear(1), Folio::new(1, Side::B));
        assert_eq!(Folio::from_linear(2), Folio::new(2, Side::A));
        assert_eq!(Folio::from_linear(41), Folio::new(21, Side::B));
    }

    #[test]
    fn test_to_linear() {
        assert_eq!(Folio::new(1, Side::A).to_linear(), 0);
        assert_eq!(Folio::new(1, Side::B).to_linear(), 1);
        assert_eq!(Folio::new(21, Side::A).to_linear(), 40);
    }

    #[test]
    fn test_linear_bijection() {
        for i in 0..500 {
            assert_eq!(Folio::from_linear(i).to_linear(), i);
        }
    }

    #[test]
    fn test_parse_and_display() {
        let folio: Folio = "21a".parse().unwrap();
        assert_eq!(folio, Folio::new(21, Side::A));
        assert_eq!(folio.to_string(), "21a");

        let folio: Folio = "3b".parse().unwrap();
        assert_eq!(folio, Folio::new(3, Side::B));
    }

    #[test]
    fn test_parse_bare_number_defaults_to_a() {
        let folio: Folio = "21".parse().unwrap();
        assert_eq!(folio, Folio::new(21, Side::A));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("".parse::<Folio>().is_err());
        assert!("a21".parse::<Folio>().is_err());
        assert!("21c".parse::<Folio>().is_err());
        assert!("0a".parse::<Folio>().is_err());
    }
}
