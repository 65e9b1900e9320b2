use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Number of base-10 fractional digits carried by every amount.
pub const DECIMAL_PLACES: u32 = 8;

/// Scale factor: 10^8.
pub const SCALE: i64 = 100_000_000;

/// An exact signed decimal at a fixed scale of 10^8.
///
/// The represented value is `raw / 10^8`. Addition and subtraction are
/// native integer operations; multiplication and division widen to 128 bits
/// so intermediate products cannot wrap. Nothing on the money path touches
/// floating point; `to_f64` exists for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixedPoint(i64);

impl FixedPoint {
    pub const ZERO: FixedPoint = FixedPoint(0);

    /// Wraps a raw value already expressed in 10^-8 units.
    pub fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> i64 {
        self.0
    }

    /// Converts a whole number of units.
    pub fn from_integer(value: i64) -> Result<Self> {
        value
            .checked_mul(SCALE)
            .map(Self)
            .ok_or(LedgerError::Overflow)
    }

    /// Treats `cents` as hundredths of a unit and rescales.
    pub fn from_cents(cents: i64) -> Result<Self> {
        cents
            .checked_mul(SCALE / 100)
            .map(Self)
            .ok_or(LedgerError::Overflow)
    }

    pub fn checked_add(self, other: Self) -> Result<Self> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(LedgerError::Overflow)
    }

    pub fn checked_sub(self, other: Self) -> Result<Self> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(LedgerError::Overflow)
    }

    /// `round-toward-zero(a * b / 10^8)` with a 128-bit intermediate.
    pub fn checked_mul(self, other: Self) -> Result<Self> {
        let wide = (self.0 as i128 * other.0 as i128) / SCALE as i128;
        i64::try_from(wide).map(Self).map_err(|_| LedgerError::Overflow)
    }

    /// `round-toward-zero(a * 10^8 / b)` with a 128-bit intermediate.
    pub fn checked_div(self, other: Self) -> Result<Self> {
        if other.0 == 0 {
            return Err(LedgerError::DivisionByZero);
        }
        let wide = (self.0 as i128 * SCALE as i128) / other.0 as i128;
        i64::try_from(wide).map(Self).map_err(|_| LedgerError::Overflow)
    }

    pub fn abs(self) -> Result<Self> {
        self.0.checked_abs().map(Self).ok_or(LedgerError::Overflow)
    }

    pub fn neg(self) -> Result<Self> {
        self.0.checked_neg().map(Self).ok_or(LedgerError::Overflow)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Rounds to `places` fractional digits, half away from zero.
    ///
    /// `places >= 8` is the identity. Rounding away from zero near the
    /// representable bounds is an Overflow error, never a wrap.
    pub fn round(self, places: u32) -> Result<Self> {
        if places >= DECIMAL_PLACES {
            return Ok(self);
        }
        let factor = 10_i64.pow(DECIMAL_PLACES - places);
        let rem = self.0 % factor;
        let base = self.0 - rem;
        if rem.abs() * 2 >= factor {
            base.checked_add(rem.signum() * factor)
                .map(Self)
                .ok_or(LedgerError::Overflow)
        } else {
            Ok(Self(base))
        }
    }

    /// Diagnostic only. Never feed the result back into the engine.
    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / SCALE as f64
    }

    /// Diagnostic counterpart of [`FixedPoint::to_f64`]; truncates toward
    /// zero at the eighth digit.
    pub fn from_f64(value: f64) -> Result<Self> {
        let scaled = value * SCALE as f64;
        if !scaled.is_finite() || scaled >= i64::MAX as f64 || scaled <= i64::MIN as f64 {
            return Err(LedgerError::Overflow);
        }
        Ok(Self(scaled as i64))
    }
}

impl PartialOrd for FixedPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FixedPoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        let int_part = magnitude / SCALE as u64;
        let frac_part = magnitude % SCALE as u64;
        if frac_part == 0 {
            return write!(f, "{}{}", sign, int_part);
        }
        let mut frac = format!("{:08}", frac_part);
        while frac.ends_with('0') {
            frac.pop();
        }
        write!(f, "{}{}.{}", sign, int_part, frac)
    }
}

impl FromStr for FixedPoint {
    type Err = LedgerError;

    /// Accepts an optional leading `-`, an integer part, and up to eight
    /// fractional digits. Shorter fractions are zero-padded on the right;
    /// longer fractions are truncated, not rounded.
    fn from_str(s: &str) -> Result<Self> {
        let malformed = || LedgerError::MalformedRecord(format!("invalid decimal literal: {:?}", s));

        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (int_str, frac_str) = match body.split_once('.') {
            Some((i, fr)) => (i, fr),
            None => (body, ""),
        };

        if int_str.is_empty() && frac_str.is_empty() {
            return Err(malformed());
        }
        if !int_str.chars().all(|c| c.is_ascii_digit())
            || !frac_str.chars().all(|c| c.is_ascii_digit())
        {
            return Err(malformed());
        }

        let int_part: i64 = if int_str.is_empty() {
            0
        } else {
            int_str.parse().map_err(|_| LedgerError::Overflow)?
        };

        // Truncate past the eighth digit, pad short fractions with zeros.
        let truncated: String = frac_str.chars().take(DECIMAL_PLACES as usize).collect();
        let mut frac_part: i64 = if truncated.is_empty() {
            0
        } else {
            truncated.parse().map_err(|_| malformed())?
        };
        frac_part *= 10_i64.pow(DECIMAL_PLACES - truncated.len() as u32);

        let raw = int_part
            .checked_mul(SCALE)
            .and_then(|v| v.checked_add(frac_part))
            .ok_or(LedgerError::Overflow)?;

        Ok(Self(if negative { -raw } else { raw }))
    }
}
