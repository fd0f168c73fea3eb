use std::fmt;
use std::str::FromStr;

use crate::error::DialectError;

/// Exact fixed-point number stored as an unscaled integer and a decimal scale.
///
/// Equality is numeric: `1.50` equals `1.5`.
#[derive(Debug, Clone, Copy)]
pub struct Decimal {
    unscaled: i128,
    scale: u8,
}

impl Decimal {
    /// Largest scale (and precision) representable in an `i128`.
    pub const MAX_SCALE: u8 = 38;

    /// # Errors
    /// Returns `DialectError::Parameter` when `scale` exceeds [`Decimal::MAX_SCALE`].
    pub fn new(unscaled: i128, scale: u8) -> Result<Self, DialectError> {
        if scale > Self::MAX_SCALE {
            return Err(DialectError::Parameter(format!(
                "decimal scale {scale} exceeds {}",
                Self::MAX_SCALE
            )));
        }
        Ok(Self { unscaled, scale })
    }

    #[must_use]
    pub fn unscaled(&self) -> i128 {
        self.unscaled
    }

    #[must_use]
    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// Number of significant decimal digits in the unscaled value.
    #[must_use]
    pub fn precision(&self) -> u8 {
        let mut digits = 1u8;
        let mut rest = self.unscaled.unsigned_abs() / 10;
        while rest > 0 {
            digits += 1;
            rest /= 10;
        }
        digits
    }

    /// Re-express this value with `scale` fractional digits, only if that is exact.
    #[must_use]
    pub fn rescale(&self, scale: u8) -> Option<Decimal> {
        if scale > Self::MAX_SCALE {
            return None;
        }
        if scale >= self.scale {
            let factor = 10i128.checked_pow(u32::from(scale - self.scale))?;
            let unscaled = self.unscaled.checked_mul(factor)?;
            Some(Decimal { unscaled, scale })
        } else {
            let divisor = 10i128.checked_pow(u32::from(self.scale - scale))?;
            if self.unscaled % divisor != 0 {
                return None;
            }
            Some(Decimal {
                unscaled: self.unscaled / divisor,
                scale,
            })
        }
    }

    /// Same value with trailing fractional zeros removed.
    #[must_use]
    pub fn normalized(&self) -> Decimal {
        let mut out = *self;
        while out.scale > 0 && out.unscaled % 10 == 0 {
            out.unscaled /= 10;
            out.scale -= 1;
        }
        out
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (self.normalized(), other.normalized());
        a.unscaled == b.unscaled && a.scale == b.scale
    }
}

impl Eq for Decimal {}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.unscaled.unsigned_abs().to_string();
        let sign = if self.unscaled < 0 { "-" } else { "" };
        let scale = usize::from(self.scale);
        if scale == 0 {
            return write!(f, "{sign}{digits}");
        }
        let padded = if digits.len() <= scale {
            format!("{}{digits}", "0".repeat(scale - digits.len() + 1))
        } else {
            digits
        };
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{int_part}.{frac_part}")
    }
}

impl FromStr for Decimal {
    type Err = DialectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DialectError::Parameter(format!("invalid decimal literal `{s}`"));
        let trimmed = s.trim();
        let (negative, body) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };
        let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let scale = u8::try_from(frac_part.len()).map_err(|_| invalid())?;
        let mut unscaled: i128 = 0;
        for b in int_part.bytes().chain(frac_part.bytes()) {
            unscaled = unscaled
                .checked_mul(10)
                .and_then(|v| v.checked_add(i128::from(b - b'0')))
                .ok_or_else(invalid)?;
        }
        if negative {
            unscaled = -unscaled;
        }
        Decimal::new(unscaled, scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats() {
        for literal in ["123.45", "-0.05", "0", "0.00", "-1000", "99999999999999.9999"] {
            let parsed: Decimal = literal.parse().unwrap();
            assert_eq!(parsed.to_string(), literal);
        }
    }

    #[test]
    fn equality_is_numeric() {
        let a: Decimal = "1.50".parse().unwrap();
        let b: Decimal = "1.5".parse().unwrap();
        assert_eq!(a, b);
        assert_ne!(a, "1.51".parse::<Decimal>().unwrap());
    }

    #[test]
    fn rescale_only_when_exact() {
        let d: Decimal = "12.30".parse().unwrap();
        assert_eq!(d.rescale(1).unwrap().to_string(), "12.3");
        assert_eq!(d.rescale(4).unwrap().to_string(), "12.3000");
        assert!("12.34".parse::<Decimal>().unwrap().rescale(1).is_none());
    }

    #[test]
    fn rejects_garbage() {
        assert!("1.2.3".parse::<Decimal>().is_err());
        assert!("abc".parse::<Decimal>().is_err());
        assert!("-".parse::<Decimal>().is_err());
    }
}
