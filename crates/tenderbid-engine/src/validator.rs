//! Bid validation.
//!
//! Pure functions over a fresh read of the tender and the bidder's own
//! history. Nothing here touches the store; the caller supplies the state.
//!
//! Checks, in order:
//! 1. the text parses as a non-negative decimal
//! 2. the amount does not exceed [`bid_ceiling`] of the current price
//! 3. the bidder has not bid this amount before in this tender
//!
//! Global uniqueness across bidders is checked at confirmation time and
//! enforced again by the store.

use std::str::FromStr;

use rust_decimal::Decimal;
use tenderbid_types::constants::{BID_CEILING_NUMERATOR, BID_CEILING_SCALE};
use tenderbid_types::{AuctionError, Bid, Result};

/// Highest amount a new bid may have at `current_price`.
///
/// One percent of the current price, or zero when subtracting that step
/// would take the price below zero.
#[must_use]
pub fn bid_ceiling(current_price: Decimal) -> Decimal {
    let step = current_price * Decimal::new(BID_CEILING_NUMERATOR, BID_CEILING_SCALE);
    if current_price - step >= Decimal::ZERO {
        step
    } else {
        Decimal::ZERO
    }
}

/// Parse user input into an amount. Surrounding whitespace is ignored.
///
/// # Errors
/// `InvalidAmount` for non-numeric or negative input.
pub fn parse_amount(text: &str) -> Result<Decimal> {
    let trimmed = text.trim();
    let amount = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| AuctionError::InvalidAmount {
            input: text.to_string(),
        })?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(AuctionError::InvalidAmount {
            input: text.to_string(),
        });
    }
    Ok(amount)
}

/// Validate a proposed bid against the current price and the bidder's
/// previous bids in the same tender.
///
/// # Errors
/// `InvalidAmount`, `BidTooHigh` or `DuplicateBid`.
pub fn validate_bid_amount(text: &str, current_price: Decimal, own_previous: &[Bid]) -> Result<Decimal> {
    let amount = parse_amount(text)?;

    let ceiling = bid_ceiling(current_price);
    if amount > ceiling {
        return Err(AuctionError::BidTooHigh { amount, ceiling });
    }

    if own_previous.iter().any(|bid| bid.amount == amount) {
        return Err(AuctionError::DuplicateBid { amount });
    }

    Ok(amount)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tenderbid_types::{TenderId, UserId};

    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn own_bid(amount: Decimal) -> Bid {
        Bid::new(TenderId::new(), UserId::new(), amount, Utc::now())
    }

    #[test]
    fn ceiling_is_one_percent() {
        assert_eq!(bid_ceiling(dec(100_000)), dec(1000));
        assert_eq!(bid_ceiling(dec(900)), dec(9));
        assert_eq!(bid_ceiling(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn ceiling_never_negative() {
        assert_eq!(bid_ceiling(dec(-50)), Decimal::ZERO);
    }

    #[test]
    fn amount_at_ceiling_accepted() {
        assert_eq!(validate_bid_amount("1000", dec(100_000), &[]).unwrap(), dec(1000));
    }

    #[test]
    fn amount_above_ceiling_rejected() {
        let err = validate_bid_amount("1000.01", dec(100_000), &[]).unwrap_err();
        assert_eq!(
            err,
            AuctionError::BidTooHigh {
                amount: Decimal::new(100_001, 2),
                ceiling: dec(1000),
            }
        );
    }

    #[test]
    fn non_numeric_rejected() {
        for input in ["", "abc", "1.2.3", "1 000"] {
            let err = validate_bid_amount(input, dec(100), &[]).unwrap_err();
            assert!(matches!(err, AuctionError::InvalidAmount { .. }), "{input:?}");
        }
    }

    #[test]
    fn negative_rejected() {
        let err = validate_bid_amount("-1", dec(100_000), &[]).unwrap_err();
        assert!(matches!(err, AuctionError::InvalidAmount { .. }));
    }

    #[test]
    fn whitespace_and_scientific_accepted() {
        assert_eq!(parse_amount("  900 \n").unwrap(), dec(900));
        assert_eq!(parse_amount("9e2").unwrap(), dec(900));
        assert_eq!(parse_amount("0").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn own_repeat_rejected() {
        let previous = vec![own_bid(dec(900)), own_bid(dec(8))];
        let err = validate_bid_amount("8", dec(900), &previous).unwrap_err();
        assert_eq!(err, AuctionError::DuplicateBid { amount: dec(8) });
        // Same value at another scale is the same amount.
        assert!(validate_bid_amount("8.00", dec(900), &previous).is_err());
        assert_eq!(validate_bid_amount("7", dec(900), &previous).unwrap(), dec(7));
    }
}
