//! # Balance Projection
//!
//! The running balance of a session, per currency.
//!
//! ## The Identity
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   balance(session, currency) = opening(currency)                        │
//! │                              + Σ signed amounts of its movements        │
//! │                                                                         │
//! │   opening   USD 100.00  ─┐                                              │
//! │   deposit   USD +50.00   │                                              │
//! │   withdraw  USD −20.00   ├──►  USD 130.00                               │
//! │   adj_out   USD  −0.50   │    (opening 100.00 + net 30.00)              │
//! │   adj_in    USD  +0.50  ─┘                                              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Currencies never mix: a CDF movement cannot touch the USD line. A
//! currency with no opening starts from zero; its first movement creates
//! the line. There is no floor: an over-withdrawn drawer projects a
//! negative balance and the close reports the shortfall.
//!
//! The database keeps a cached copy of each line. This type is what that
//! cache must always equal, and what `verify` recomputes it from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::currency::Currency;
use crate::error::{LedgerError, LedgerResult};
use crate::money::Money;
use crate::types::{CashMovement, CurrencyBalance};

// =============================================================================
// Projected Balance
// =============================================================================

/// One currency line of a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectedBalance {
    pub opening: Money,
    /// Net effect of every applied movement.
    pub net_movements: Money,
    pub movement_count: u64,
}

impl ProjectedBalance {
    /// opening + net movements.
    pub fn current(&self) -> LedgerResult<Money> {
        self.opening.checked_add(self.net_movements)
    }
}

// =============================================================================
// Balance Projection
// =============================================================================

/// Per-currency projection of a single session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceProjection {
    lines: BTreeMap<Currency, ProjectedBalance>,
}

impl BalanceProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a projection from the counted opening float.
    pub fn with_openings(openings: &BTreeMap<Currency, Money>) -> LedgerResult<Self> {
        let mut projection = Self::new();
        for (currency, amount) in openings {
            projection.seed(*currency, *amount)?;
        }
        Ok(projection)
    }

    /// Rebuilds a projection from openings and the full movement list.
    ///
    /// Used to check the cached balances and as the reference in tests.
    pub fn replay<'a>(
        openings: &BTreeMap<Currency, Money>,
        movements: impl IntoIterator<Item = &'a CashMovement>,
    ) -> LedgerResult<Self> {
        let mut projection = Self::with_openings(openings)?;
        for movement in movements {
            projection.apply_movement(movement)?;
        }
        Ok(projection)
    }

    /// Sets the opening amount for a currency.
    ///
    /// Negative openings are refused: a drawer cannot start with less than
    /// nothing in it.
    pub fn seed(&mut self, currency: Currency, opening: Money) -> LedgerResult<()> {
        if opening.is_negative() {
            return Err(LedgerError::invalid_amount(format!(
                "opening {} must not be negative (got {})",
                currency,
                opening.minor()
            )));
        }
        let line = self.lines.entry(currency).or_default();
        line.opening = opening;
        line.current()?;
        Ok(())
    }

    /// Applies an already-signed amount and returns the new balance.
    ///
    /// Overflow leaves the projection untouched.
    pub fn apply(&mut self, currency: Currency, signed_amount: Money) -> LedgerResult<Money> {
        self.apply_aggregate(currency, signed_amount, 1)
    }

    /// Applies the pre-summed net of `count` movements at once.
    ///
    /// This is how a projection is rebuilt from a `SUM` query instead of the
    /// full movement list.
    pub fn apply_aggregate(
        &mut self,
        currency: Currency,
        net: Money,
        count: u64,
    ) -> LedgerResult<Money> {
        let line = self.lines.get(&currency).copied().unwrap_or_default();
        let net_movements = line.net_movements.checked_add(net)?;
        let updated = ProjectedBalance {
            opening: line.opening,
            net_movements,
            movement_count: line.movement_count + count,
        };
        let balance = updated.current()?;
        self.lines.insert(currency, updated);
        Ok(balance)
    }

    /// Applies a stored movement (its amount is already signed).
    pub fn apply_movement(&mut self, movement: &CashMovement) -> LedgerResult<Money> {
        self.apply(movement.currency, movement.amount())
    }

    /// Current balance of a currency; zero if it never appeared.
    pub fn balance(&self, currency: Currency) -> Money {
        self.lines
            .get(&currency)
            .and_then(|line| line.current().ok())
            .unwrap_or_default()
    }

    /// Opening amount of a currency; zero if none was counted.
    pub fn opening(&self, currency: Currency) -> Money {
        self.lines
            .get(&currency)
            .map(|line| line.opening)
            .unwrap_or_default()
    }

    pub fn line(&self, currency: Currency) -> Option<&ProjectedBalance> {
        self.lines.get(&currency)
    }

    /// Currencies with a line, in code order.
    pub fn currencies(&self) -> impl Iterator<Item = Currency> + '_ {
        self.lines.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Currency, &ProjectedBalance)> + '_ {
        self.lines.iter().map(|(c, l)| (*c, l))
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Current balances keyed by currency.
    pub fn balances(&self) -> BTreeMap<Currency, Money> {
        self.lines
            .keys()
            .map(|currency| (*currency, self.balance(*currency)))
            .collect()
    }

    /// Flattens into the storage shape.
    pub fn snapshot(&self, session_id: &str) -> LedgerResult<Vec<CurrencyBalance>> {
        self.lines
            .iter()
            .map(|(currency, line)| {
                Ok(CurrencyBalance {
                    session_id: session_id.to_string(),
                    currency: *currency,
                    opening_minor: line.opening.minor(),
                    current_minor: line.current()?.minor(),
                })
            })
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MovementKind;
    use chrono::Utc;
    use proptest::prelude::*;

    fn usd() -> Currency {
        Currency::parse("USD").unwrap()
    }

    fn cdf() -> Currency {
        Currency::parse("CDF").unwrap()
    }

    fn movement(kind: MovementKind, magnitude: i64, currency: Currency) -> CashMovement {
        CashMovement {
            id: "m".to_string(),
            session_id: "s".to_string(),
            kind,
            amount_minor: kind.apply_sign(Money::from_minor(magnitude)).unwrap().minor(),
            currency,
            description: String::new(),
            external_ref: None,
            actor_id: "a".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_usd_shift_projection() {
        let mut openings = BTreeMap::new();
        openings.insert(usd(), Money::from_minor(10_000));
        let movements = vec![
            movement(MovementKind::Deposit, 5_000, usd()),
            movement(MovementKind::Withdrawal, 2_000, usd()),
            movement(MovementKind::AdjustmentOut, 50, usd()),
            movement(MovementKind::AdjustmentIn, 50, usd()),
        ];

        let projection = BalanceProjection::replay(&openings, &movements).unwrap();
        assert_eq!(projection.balance(usd()).minor(), 13_000);
        assert_eq!(projection.opening(usd()).minor(), 10_000);
        assert_eq!(projection.line(usd()).unwrap().movement_count, 4);
    }

    #[test]
    fn test_currencies_stay_isolated() {
        let mut projection = BalanceProjection::new();
        projection.seed(usd(), Money::from_minor(10_000)).unwrap();
        projection.seed(cdf(), Money::from_minor(500_000)).unwrap();

        projection
            .apply_movement(&movement(MovementKind::ExchangeOut, 100_000, cdf()))
            .unwrap();

        assert_eq!(projection.balance(usd()).minor(), 10_000);
        assert_eq!(projection.balance(cdf()).minor(), 400_000);
    }

    #[test]
    fn test_unseeded_currency_starts_at_zero() {
        let mut projection = BalanceProjection::new();
        let balance = projection.apply(usd(), Money::from_minor(-700)).unwrap();
        assert_eq!(balance.minor(), -700);
        assert_eq!(projection.opening(usd()), Money::zero());
        assert_eq!(projection.balance(cdf()), Money::zero());
    }

    #[test]
    fn test_negative_opening_rejected() {
        let mut projection = BalanceProjection::new();
        assert!(projection.seed(usd(), Money::from_minor(-1)).is_err());
        assert!(projection.is_empty());
    }

    #[test]
    fn test_overflow_leaves_projection_untouched() {
        let mut projection = BalanceProjection::new();
        projection.seed(usd(), Money::from_minor(i64::MAX - 10)).unwrap();
        assert!(projection.apply(usd(), Money::from_minor(11)).is_err());
        assert_eq!(projection.balance(usd()).minor(), i64::MAX - 10);
        assert_eq!(projection.line(usd()).unwrap().movement_count, 0);
    }

    #[test]
    fn test_aggregate_matches_individual_applies() {
        let mut one_by_one = BalanceProjection::new();
        one_by_one.seed(usd(), Money::from_minor(1_000)).unwrap();
        for amount in [500, -200, 30] {
            one_by_one.apply(usd(), Money::from_minor(amount)).unwrap();
        }

        let mut aggregated = BalanceProjection::new();
        aggregated.seed(usd(), Money::from_minor(1_000)).unwrap();
        aggregated
            .apply_aggregate(usd(), Money::from_minor(330), 3)
            .unwrap();

        assert_eq!(one_by_one, aggregated);
    }

    #[test]
    fn test_snapshot_shape() {
        let mut projection = BalanceProjection::new();
        projection.seed(usd(), Money::from_minor(100)).unwrap();
        projection.apply(usd(), Money::from_minor(25)).unwrap();

        let rows = projection.snapshot("s1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].opening_minor, 100);
        assert_eq!(rows[0].current_minor, 125);
        assert_eq!(rows[0].movement_total().minor(), 25);
    }

    fn kind_strategy() -> impl Strategy<Value = MovementKind> {
        prop::sample::select(MovementKind::ALL.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: for any opening and any movement sequence, after every
        /// applied movement each currency's balance equals its opening plus
        /// the signed sum applied so far, and the other currency is
        /// unaffected. Replaying the whole log lands on the same projection.
        #[test]
        fn balance_equals_opening_plus_signed_sum(
            usd_opening in 0i64..1_000_000_000,
            cdf_opening in 0i64..1_000_000_000,
            moves in prop::collection::vec((kind_strategy(), 1i64..10_000_000, any::<bool>()), 0..64)
        ) {
            let mut openings = BTreeMap::new();
            openings.insert(usd(), Money::from_minor(usd_opening));
            openings.insert(cdf(), Money::from_minor(cdf_opening));

            let movements: Vec<CashMovement> = moves
                .iter()
                .map(|(kind, magnitude, is_usd)| {
                    movement(*kind, *magnitude, if *is_usd { usd() } else { cdf() })
                })
                .collect();

            let mut projection = BalanceProjection::with_openings(&openings).unwrap();
            let mut expected: BTreeMap<Currency, i64> =
                [(usd(), usd_opening), (cdf(), cdf_opening)].into_iter().collect();

            for m in &movements {
                let after = projection.apply_movement(m).unwrap();
                *expected.get_mut(&m.currency).unwrap() += m.amount_minor;

                prop_assert_eq!(after.minor(), expected[&m.currency]);
                for (currency, balance) in &expected {
                    prop_assert_eq!(projection.balance(*currency).minor(), *balance);
                }
            }

            let replayed = BalanceProjection::replay(&openings, &movements).unwrap();
            prop_assert_eq!(replayed, projection);
        }

        /// Property: applying a kind and its opposite with the same
        /// magnitude returns the balance to where it was.
        #[test]
        fn opposite_kinds_cancel(opening in 0i64..1_000_000, magnitude in 1i64..1_000_000) {
            let pairs = [
                (MovementKind::Deposit, MovementKind::Withdrawal),
                (MovementKind::ExchangeIn, MovementKind::ExchangeOut),
                (MovementKind::AdjustmentIn, MovementKind::AdjustmentOut),
            ];
            for (inflow, outflow) in pairs {
                let mut projection = BalanceProjection::new();
                projection.seed(usd(), Money::from_minor(opening)).unwrap();
                projection.apply_movement(&movement(inflow, magnitude, usd())).unwrap();
                projection.apply_movement(&movement(outflow, magnitude, usd())).unwrap();
                prop_assert_eq!(projection.balance(usd()).minor(), opening);
            }
        }
    }
}
