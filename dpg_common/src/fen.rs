use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Sub},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const CURRENCY_CODE: &str = "CNY";
/// Smallest donation accepted, in yuan.
pub const MIN_DONATION_YUAN: f64 = 0.01;
/// Largest donation accepted, in yuan.
pub const MAX_DONATION_YUAN: f64 = 10_000.0;
// Absorbs float noise at the range edges, such as 0.1 * 0.1. It is far below a tenth of a fen.
const YUAN_TOLERANCE: f64 = 1e-9;

//--------------------------------------        Fen          ---------------------------------------------------------
/// An amount of money in minor currency units (1 yuan = 100 fen). All amounts are stored and sent to the gateway in
/// this form.
#[derive(Debug, Clone, Copy, Default, Type, Hash, Ord, PartialOrd, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Fen(i64);

op!(binary Fen, Add, add);
op!(binary Fen, Sub, sub);
op!(inplace Fen, AddAssign, add_assign);

impl Sum for Fen {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FenConversionError {
    #[error("amount must be between {MIN_DONATION_YUAN} and {MAX_DONATION_YUAN}, but was {0}")]
    OutOfRange(f64),
    #[error("amount is not a finite number")]
    NotFinite,
}

impl From<i64> for Fen {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for Fen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Fen {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Converts a donation amount in yuan to fen.
    ///
    /// The amount must lie in `[0.01, 10000.00]`. The conversion rounds half-up.
    pub fn try_from_yuan(yuan: f64) -> Result<Self, FenConversionError> {
        if !yuan.is_finite() {
            return Err(FenConversionError::NotFinite);
        }
        if yuan < MIN_DONATION_YUAN - YUAN_TOLERANCE || yuan > MAX_DONATION_YUAN + YUAN_TOLERANCE {
            return Err(FenConversionError::OutOfRange(yuan));
        }
        // The small bias keeps values such as 9.995 (stored as 9.99499999...) rounding up.
        #[allow(clippy::cast_possible_truncation)]
        let fen = (yuan * 100.0 + 0.5 + 1e-9).floor() as i64;
        Ok(Self(fen))
    }

    pub fn to_yuan(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}
