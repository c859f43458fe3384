//! Random amount helpers.
//!
//! Amounts are drawn uniformly from inclusive integer ranges; probabilities are
//! validated before use because `Rng::random_bool` panics outside `[0, 1]`.

use crate::errors::{Error, Result};
use rand::Rng;

/// An inclusive `[min, max]` range of coins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountRange {
    /// Lower bound (inclusive)
    pub min: i64,
    /// Upper bound (inclusive)
    pub max: i64,
}

impl AmountRange {
    /// Creates a validated range.
    pub fn new(min: i64, max: i64) -> Result<Self> {
        let range = Self::new_unchecked(min, max);
        range.validate()?;
        Ok(range)
    }

    /// Creates a range without checking it; [`AmountRange::validate`] runs before sampling.
    #[must_use]
    pub const fn new_unchecked(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// A range that always yields `amount`.
    #[must_use]
    pub const fn fixed(amount: i64) -> Self {
        Self::new_unchecked(amount, amount)
    }

    /// Fails with `InvalidRange` when the bounds are inverted or negative.
    pub fn validate(&self) -> Result<()> {
        if self.min > self.max || self.min < 0 {
            return Err(Error::InvalidRange {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    /// Draws a uniformly distributed amount from the range.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<i64> {
        self.validate()?;
        Ok(rng.random_range(self.min..=self.max))
    }
}

/// Fails with `InvalidRate` unless `p` is a probability.
pub fn ensure_probability(p: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(Error::InvalidRate { rate: p })
    }
}

/// Returns true with probability `p`.
pub fn roll<R: Rng + ?Sized>(rng: &mut R, p: f64) -> Result<bool> {
    Ok(rng.random_bool(ensure_probability(p)?))
}

/// Uniform float in `[min, max]`.
pub fn uniform_f64<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> Result<f64> {
    if !(min.is_finite() && max.is_finite()) || min > max {
        return Err(Error::InvalidRate { rate: max });
    }
    if min == max {
        return Ok(min);
    }
    Ok(rng.random_range(min..=max))
}

/// `floor(amount * factor)` as an integer, the only way floats touch balances.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
#[must_use]
pub fn floor_mul(amount: i64, factor: f64) -> i64 {
    (amount as f64 * factor).floor() as i64
}
