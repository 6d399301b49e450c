//! Checked fixed-point helpers.
//!
//! Reward and boost formulas multiply two 18-decimal quantities before
//! dividing, which overflows `u128` for realistic supplies. The product is
//! taken in 256 bits and the quotient narrowed back with a checked conversion.

use primitive_types::U256;

use crate::error::MathError;

/// `a * b / denom`, rounding down, with a 256-bit intermediate.
///
/// # Examples
///
/// ```
/// use ve_core::math::mul_div;
/// assert_eq!(mul_div(u128::MAX, 2, 4).unwrap(), u128::MAX / 2);
/// assert_eq!(mul_div(7, 3, 2).unwrap(), 10);
/// ```
pub fn mul_div(a: u128, b: u128, denom: u128) -> Result<u128, MathError> {
    if denom == 0 {
        return Err(MathError::DivisionByZero);
    }
    let product = U256::from(a) * U256::from(b);
    let quotient = product / U256::from(denom);
    u128::try_from(quotient).map_err(|_| MathError::Overflow)
}

/// Checked addition mapped into [`MathError`].
pub fn add(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

/// Checked subtraction mapped into [`MathError`].
pub fn sub(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_sub(b).ok_or(MathError::Overflow)
}

/// Checked signed multiply used by the curve arithmetic.
pub fn mul_i(a: i128, b: i128) -> Result<i128, MathError> {
    a.checked_mul(b).ok_or(MathError::Overflow)
}

/// Convert an unsigned quantity into the signed curve domain.
pub fn to_signed(v: u128) -> Result<i128, MathError> {
    i128::try_from(v).map_err(|_| MathError::Overflow)
}
