//! # Netting Engine
//!
//! Applies one payment to a line's balance. A payment from `sender` to
//! `receiver` moves the signed balance toward "sender owes receiver" by
//! `amount`. Over the magnitude + polarity representation that is three
//! cases:
//!
//! ```text
//! sender already owes (or balance is 0):
//!     new = magnitude + amount                  polarity: sender owes
//!     require new <= ceiling(sender)
//!
//! receiver owes, amount < magnitude:
//!     new = magnitude - amount                  polarity unchanged
//!
//! receiver owes, amount >= magnitude:           (crosses zero)
//!     new = amount - magnitude                  polarity: sender owes
//!     require new <= ceiling(sender)
//! ```
//!
//! The ceiling check in the third case is the one that matters most: the
//! balance lands on the *other* side of zero, so it has to be checked
//! against the sender's ceiling, not the ceiling it started under.
//!
//! The engine is a pure function of the stored record. It never mutates;
//! the registry commits the [`NettingOutcome`] only when it is `Ok`.

use super::error::{LedgerError, LedgerResult};
use super::line::{CreditLine, Side};
use super::Amount;

/// The balance a payment would leave behind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NettingOutcome {
    /// New unsigned balance.
    pub magnitude: Amount,
    /// New polarity.
    pub owed_by_low: bool,
    /// Whether the payment moved the debt from one party to the other.
    pub flipped: bool,
}

/// Computes the balance after `sender` pays `amount` over `line`.
///
/// # Errors
///
/// - [`LedgerError::InvalidAmount`] if `amount == 0`.
/// - [`LedgerError::ArithmeticOverflow`] if the balance would overflow.
/// - [`LedgerError::LimitExceeded`] if the sender would owe more than the
///   ceiling it extends, including after a zero crossing.
pub fn net_payment(line: &CreditLine, sender: Side, amount: Amount) -> LedgerResult<NettingOutcome> {
    if amount == 0 {
        return Err(LedgerError::InvalidAmount);
    }

    let sender_is_low = sender == Side::Low;
    let ceiling = line.limit_extended_by(sender);
    let sender_owes = line.magnitude == 0 || line.owed_by_low == sender_is_low;

    if sender_owes {
        let magnitude = line
            .magnitude
            .checked_add(amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;
        check_ceiling(line, magnitude, ceiling)?;
        return Ok(NettingOutcome {
            magnitude,
            owed_by_low: sender_is_low,
            flipped: false,
        });
    }

    if amount < line.magnitude {
        return Ok(NettingOutcome {
            magnitude: line.magnitude - amount,
            owed_by_low: line.owed_by_low,
            flipped: false,
        });
    }

    // amount >= magnitude: the receiver's debt is wiped out and the rest
    // becomes the sender's debt.
    let magnitude = amount - line.magnitude;
    check_ceiling(line, magnitude, ceiling)?;
    Ok(NettingOutcome {
        magnitude,
        owed_by_low: sender_is_low,
        flipped: magnitude > 0,
    })
}

fn check_ceiling(line: &CreditLine, attempted: Amount, ceiling: Amount) -> LedgerResult<()> {
    if attempted > ceiling {
        return Err(LedgerError::LimitExceeded {
            pair: line.key,
            attempted,
            ceiling,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{canonicalize, PartyId};
    use chrono::Utc;

    /// alice (low) extends 100, bob (high) extends 50.
    fn line_with(magnitude: Amount, owed_by_low: bool) -> CreditLine {
        let alice = PartyId::new("alice").unwrap();
        let bob = PartyId::new("bob").unwrap();
        let pair = canonicalize(&alice, &bob).unwrap();
        let mut line = CreditLine::open(pair, &alice, 100, 50, Utc::now());
        line.set_balance(magnitude, owed_by_low, Utc::now());
        line
    }

    #[test]
    fn zero_amount_rejected() {
        let line = line_with(0, false);
        assert!(matches!(
            net_payment(&line, Side::Low, 0),
            Err(LedgerError::InvalidAmount)
        ));
    }

    #[test]
    fn first_payment_sets_sender_as_debtor() {
        let line = line_with(0, false);
        let out = net_payment(&line, Side::Low, 40).unwrap();
        assert_eq!(out.magnitude, 40);
        assert!(out.owed_by_low);
        assert!(!out.flipped);

        let out = net_payment(&line, Side::High, 40).unwrap();
        assert_eq!(out.magnitude, 40);
        assert!(!out.owed_by_low);
    }

    #[test]
    fn same_direction_accumulates_up_to_ceiling() {
        let line = line_with(40, true);
        let out = net_payment(&line, Side::Low, 60).unwrap();
        assert_eq!(out.magnitude, 100);

        let err = net_payment(&line, Side::Low, 61).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::LimitExceeded {
                attempted: 101,
                ceiling: 100,
                ..
            }
        ));
    }

    #[test]
    fn partial_repayment_keeps_polarity() {
        let line = line_with(40, true);
        let out = net_payment(&line, Side::High, 15).unwrap();
        assert_eq!(out.magnitude, 25);
        assert!(out.owed_by_low);
        assert!(!out.flipped);
    }

    #[test]
    fn exact_repayment_settles_line() {
        let line = line_with(40, true);
        let out = net_payment(&line, Side::High, 40).unwrap();
        assert_eq!(out.magnitude, 0);
        assert!(!out.flipped);
    }

    #[test]
    fn crossing_zero_within_new_ceiling_flips() {
        let line = line_with(40, true);
        let out = net_payment(&line, Side::High, 90).unwrap();
        assert_eq!(out.magnitude, 50);
        assert!(!out.owed_by_low);
        assert!(out.flipped);
    }

    #[test]
    fn crossing_zero_beyond_new_ceiling_rejected() {
        let line = line_with(40, true);
        let err = net_payment(&line, Side::High, 100).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::LimitExceeded {
                attempted: 60,
                ceiling: 50,
                ..
            }
        ));
    }

    #[test]
    fn crossing_zero_checks_sender_ceiling_not_old_one() {
        // bob owes alice 10; alice pays 105. The old ceiling (bob's 50) is
        // irrelevant: alice would owe 95, under her own 100.
        let line = line_with(10, false);
        let out = net_payment(&line, Side::Low, 105).unwrap();
        assert_eq!(out.magnitude, 95);
        assert!(out.owed_by_low);

        // And 111 would leave alice owing 101.
        assert!(net_payment(&line, Side::Low, 111).is_err());
    }

    #[test]
    fn overflow_is_reported_not_wrapped() {
        let alice = PartyId::new("alice").unwrap();
        let bob = PartyId::new("bob").unwrap();
        let pair = canonicalize(&alice, &bob).unwrap();
        let mut line = CreditLine::open(pair, &alice, Amount::MAX, Amount::MAX, Utc::now());
        line.set_balance(Amount::MAX - 1, true, Utc::now());

        assert!(matches!(
            net_payment(&line, Side::Low, 2),
            Err(LedgerError::ArithmeticOverflow)
        ));
    }

    #[test]
    fn outcome_never_exceeds_ceiling_of_its_side() {
        let amounts = [1, 7, 39, 40, 41, 49, 50, 51, 89, 90, 91, 100, 150];
        let starts = [(0, false), (40, true), (40, false), (100, true), (50, false)];

        for &(mag, low) in &starts {
            let line = line_with(mag, low);
            for &amount in &amounts {
                for side in [Side::Low, Side::High] {
                    if let Ok(out) = net_payment(&line, side, amount) {
                        let ceiling = if out.owed_by_low { 100 } else { 50 };
                        assert!(
                            out.magnitude <= ceiling,
                            "start=({mag},{low}) side={side:?} amount={amount} -> {out:?}"
                        );
                    }
                }
            }
        }
    }
}
