//! Rating value checks and the average-rating formula.
//!
//! Storage adapters call [`average_rating`] inside the same transaction that
//! writes the rating, so the stored aggregate never lags the rating set.

use crate::error::{DomainError, Result};

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;

/// Checks that `value` is a whole number of stars in `1..=5`.
pub fn validate_rating(value: i32) -> Result<i16> {
    if !(i32::from(MIN_RATING)..=i32::from(MAX_RATING)).contains(&value) {
        return Err(DomainError::Validation(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}, got {value}"
        )));
    }
    Ok(value as i16)
}

/// Mean of `values` rounded to two decimals; `0.0` when there are none.
pub fn average_rating(values: &[i16]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: i64 = values.iter().map(|v| i64::from(*v)).sum();
    round2(sum as f64 / values.len() as f64)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
