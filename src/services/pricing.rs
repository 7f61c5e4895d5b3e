use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Errors from the price snapshot computation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("At least one adult is required")]
    InvalidPartyComposition,

    #[error("Discount must be between 0 and 100")]
    InvalidDiscount,

    #[error("Prices must be non-negative")]
    NegativePrice,
}

/// Computes the total price for a party at booking time. The result becomes
/// the booking's immutable financial snapshot, so the rounding rule is fixed
/// here once: 2 decimal places, round half away from zero.
///
/// `discount` is a percentage (0-100 inclusive); `None` or zero means no
/// discount.
pub fn compute_total(
    adult_price: Decimal,
    children_price: Decimal,
    discount: Option<Decimal>,
    adults: u32,
    children: u32,
) -> Result<Decimal, PricingError> {
    if adults < 1 {
        return Err(PricingError::InvalidPartyComposition);
    }
    if adult_price.is_sign_negative() || children_price.is_sign_negative() {
        return Err(PricingError::NegativePrice);
    }

    let hundred = Decimal::from(100u32);
    let subtotal =
        adult_price * Decimal::from(adults) + children_price * Decimal::from(children);

    let total = match discount {
        Some(d) if !d.is_zero() => {
            if d.is_sign_negative() || d > hundred {
                return Err(PricingError::InvalidDiscount);
            }
            subtotal * (hundred - d) / hundred
        }
        _ => subtotal,
    };

    // Round caps the scale but does not pad it; whole-number totals must
    // still leave here (and round-trip through the database) as x.00.
    let mut total = total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    total.rescale(2);
    Ok(total)
}
