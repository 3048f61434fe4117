//! # Reconciliation
//!
//! Read-only views over a session: the per-kind summary, counted versus
//! projected discrepancies, the counterpart-institution breakdown and the
//! shop-day rollup.
//!
//! ## Closing Flow
//! ```text
//! ┌──────────────┐    ┌──────────────────┐    ┌─────────────────────────┐
//! │ projection   │    │ counted amounts  │    │ CurrencyDiscrepancy     │
//! │ USD 130.00   │──┐ │ USD 140.00       │──► │ USD +10.00 (surplus)    │
//! │ CDF 400000   │  ├►│ (CDF not counted)│    │ CDF −400000 (shortfall) │
//! └──────────────┘  │ └──────────────────┘    └─────────────────────────┘
//!                   └── union of currencies; a missing side is zero
//! ```
//!
//! Nothing here clamps, rounds or refuses. A discrepancy is information for
//! the manager, never a reason to block the close.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use ts_rs::TS;

use crate::currency::Currency;
use crate::error::LedgerResult;
use crate::money::Money;
use crate::projection::BalanceProjection;
use crate::types::{CashMovement, CashSession, CurrencyBalance, CurrencyDiscrepancy, MovementKind};

// =============================================================================
// Per-Kind Summary
// =============================================================================

/// Count and signed sum of one (kind, currency) group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct KindSummary {
    pub kind: MovementKind,
    #[ts(as = "String")]
    pub currency: Currency,
    pub count: u64,
    /// Signed as stored: withdrawals sum negative.
    pub total_minor: i64,
}

/// Groups movements by (kind, currency), ordered by kind then currency.
pub fn summarize(movements: &[CashMovement]) -> LedgerResult<Vec<KindSummary>> {
    let mut groups: BTreeMap<(MovementKind, Currency), (u64, Money)> = BTreeMap::new();
    for movement in movements {
        let entry = groups
            .entry((movement.kind, movement.currency))
            .or_insert((0, Money::zero()));
        entry.0 += 1;
        entry.1 = entry.1.checked_add(movement.amount())?;
    }

    Ok(groups
        .into_iter()
        .map(|((kind, currency), (count, total))| KindSummary {
            kind,
            currency,
            count,
            total_minor: total.minor(),
        })
        .collect())
}

// =============================================================================
// Discrepancies
// =============================================================================

/// Compares a physical count with the projection.
///
/// ## Rules
/// - every currency in `projection ∪ counted` gets a row
/// - counted missing → 0 (the whole projected amount is short)
/// - projected missing → 0 (the whole counted amount is surplus)
/// - `discrepancy = counted − projected`, never clamped
pub fn discrepancies(
    projection: &BalanceProjection,
    counted: &BTreeMap<Currency, Money>,
) -> LedgerResult<Vec<CurrencyDiscrepancy>> {
    let currencies: BTreeSet<Currency> = projection
        .currencies()
        .chain(counted.keys().copied())
        .collect();

    currencies
        .into_iter()
        .map(|currency| {
            let counted_amount = counted.get(&currency).copied().unwrap_or_default();
            let projected = projection.balance(currency);
            let discrepancy = counted_amount.checked_sub(projected)?;
            Ok(CurrencyDiscrepancy {
                currency,
                counted_minor: counted_amount.minor(),
                projected_minor: projected.minor(),
                discrepancy_minor: discrepancy.minor(),
            })
        })
        .collect()
}

// =============================================================================
// Institution Breakdown
// =============================================================================

/// Maps a movement's external reference to a counterpart institution
/// (bank, mobile-money operator, ...).
///
/// Returning `None` leaves the movement out of the breakdown.
pub trait InstitutionResolver {
    fn resolve(&self, external_ref: &str) -> Option<String>;
}

/// Takes the part of the reference before a separator.
///
/// ```rust
/// use caisse_core::{InstitutionResolver, PrefixResolver};
///
/// let resolver = PrefixResolver::default();
/// assert_eq!(resolver.resolve("mpesa:TX123").as_deref(), Some("mpesa"));
/// assert_eq!(resolver.resolve("TX123"), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixResolver {
    pub separator: char,
}

impl PrefixResolver {
    pub fn new(separator: char) -> Self {
        PrefixResolver { separator }
    }
}

impl Default for PrefixResolver {
    fn default() -> Self {
        PrefixResolver { separator: ':' }
    }
}

impl InstitutionResolver for PrefixResolver {
    fn resolve(&self, external_ref: &str) -> Option<String> {
        let (prefix, rest) = external_ref.split_once(self.separator)?;
        let prefix = prefix.trim();
        if prefix.is_empty() || rest.trim().is_empty() {
            return None;
        }
        Some(prefix.to_string())
    }
}

/// Lookup table: external reference → institution.
impl InstitutionResolver for HashMap<String, String> {
    fn resolve(&self, external_ref: &str) -> Option<String> {
        self.get(external_ref).cloned()
    }
}

impl<F> InstitutionResolver for F
where
    F: Fn(&str) -> Option<String>,
{
    fn resolve(&self, external_ref: &str) -> Option<String> {
        self(external_ref)
    }
}

/// Withdrawals paid out on behalf of one institution in one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InstitutionTotal {
    pub institution: String,
    #[ts(as = "String")]
    pub currency: Currency,
    pub count: u64,
    /// Absolute amount paid out.
    pub total_minor: i64,
}

/// Groups resolvable withdrawals by (institution, currency).
///
/// Only `withdrawal` movements count; those without a reference or whose
/// reference does not resolve are skipped.
pub fn institution_breakdown<R>(
    movements: &[CashMovement],
    resolver: &R,
) -> LedgerResult<Vec<InstitutionTotal>>
where
    R: InstitutionResolver + ?Sized,
{
    let mut groups: BTreeMap<(String, Currency), (u64, Money)> = BTreeMap::new();
    for movement in movements {
        if movement.kind != MovementKind::Withdrawal {
            continue;
        }
        let Some(institution) = movement
            .external_ref
            .as_deref()
            .and_then(|reference| resolver.resolve(reference))
        else {
            continue;
        };

        let entry = groups
            .entry((institution, movement.currency))
            .or_insert((0, Money::zero()));
        entry.0 += 1;
        entry.1 = entry.1.checked_sub(movement.amount())?;
    }

    Ok(groups
        .into_iter()
        .map(|((institution, currency), (count, total))| InstitutionTotal {
            institution,
            currency,
            count,
            total_minor: total.minor(),
        })
        .collect())
}

// =============================================================================
// Shop-Day Rollup
// =============================================================================

/// Totals of one currency across a shop's sessions for a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RollupLine {
    #[ts(as = "String")]
    pub currency: Currency,
    pub opening_minor: i64,
    pub movement_minor: i64,
    pub current_minor: i64,
}

/// Read-only aggregate of every session a shop opened on one UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShopDayRollup {
    pub shop_id: String,
    #[ts(as = "String")]
    pub day: NaiveDate,
    pub open_sessions: u64,
    pub closed_sessions: u64,
    pub lines: Vec<RollupLine>,
}

impl ShopDayRollup {
    /// Builds the rollup from the day's sessions and their balance rows.
    ///
    /// Balance rows whose session is not in `sessions` are ignored.
    pub fn build(
        shop_id: impl Into<String>,
        day: NaiveDate,
        sessions: &[CashSession],
        balances: &[CurrencyBalance],
    ) -> LedgerResult<Self> {
        let session_ids: BTreeSet<&str> = sessions.iter().map(|s| s.id.as_str()).collect();
        let open_sessions = sessions.iter().filter(|s| s.is_open()).count() as u64;

        let mut totals: BTreeMap<Currency, (Money, Money)> = BTreeMap::new();
        for balance in balances {
            if !session_ids.contains(balance.session_id.as_str()) {
                continue;
            }
            let entry = totals
                .entry(balance.currency)
                .or_insert((Money::zero(), Money::zero()));
            entry.0 = entry.0.checked_add(balance.opening())?;
            entry.1 = entry.1.checked_add(balance.current())?;
        }

        let lines = totals
            .into_iter()
            .map(|(currency, (opening, current))| {
                Ok(RollupLine {
                    currency,
                    opening_minor: opening.minor(),
                    movement_minor: current.checked_sub(opening)?.minor(),
                    current_minor: current.minor(),
                })
            })
            .collect::<LedgerResult<Vec<_>>>()?;

        Ok(ShopDayRollup {
            shop_id: shop_id.into(),
            day,
            open_sessions,
            closed_sessions: sessions.len() as u64 - open_sessions,
            lines,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionStatus;
    use chrono::Utc;

    fn usd() -> Currency {
        Currency::parse("USD").unwrap()
    }

    fn cdf() -> Currency {
        Currency::parse("CDF").unwrap()
    }

    fn movement(kind: MovementKind, magnitude: i64, currency: Currency, reference: Option<&str>) -> CashMovement {
        CashMovement {
            id: "m".to_string(),
            session_id: "s1".to_string(),
            kind,
            amount_minor: kind.apply_sign(Money::from_minor(magnitude)).unwrap().minor(),
            currency,
            description: String::new(),
            external_ref: reference.map(str::to_string),
            actor_id: "a".to_string(),
            created_at: Utc::now(),
        }
    }

    fn projection(opening: i64, deposit: i64) -> BalanceProjection {
        let mut projection = BalanceProjection::new();
        projection.seed(usd(), Money::from_minor(opening)).unwrap();
        projection.apply(usd(), Money::from_minor(deposit)).unwrap();
        projection
    }

    #[test]
    fn test_discrepancy_sign() {
        let projected = projection(10_000, 3_000);

        let mut counted = BTreeMap::new();
        counted.insert(usd(), Money::from_minor(14_000));
        let surplus = discrepancies(&projected, &counted).unwrap();
        assert_eq!(surplus[0].discrepancy_minor, 1_000);
        assert!(surplus[0].is_surplus());

        counted.insert(usd(), Money::from_minor(12_000));
        let shortfall = discrepancies(&projected, &counted).unwrap();
        assert_eq!(shortfall[0].discrepancy_minor, -1_000);
        assert!(shortfall[0].is_shortfall());
    }

    #[test]
    fn test_discrepancy_union_of_currencies() {
        let mut projected = projection(10_000, 0);
        projected.seed(cdf(), Money::from_minor(400_000)).unwrap();

        let mut counted = BTreeMap::new();
        counted.insert(usd(), Money::from_minor(10_000));
        counted.insert(Currency::parse("EUR").unwrap(), Money::from_minor(2_000));

        let rows = discrepancies(&projected, &counted).unwrap();
        let by_code: BTreeMap<&str, i64> = rows
            .iter()
            .map(|r| (r.currency.code(), r.discrepancy_minor))
            .collect();

        assert_eq!(rows.len(), 3);
        assert_eq!(by_code["USD"], 0);
        assert_eq!(by_code["CDF"], -400_000);
        assert_eq!(by_code["EUR"], 2_000);
    }

    #[test]
    fn test_summary_groups_by_kind_and_currency() {
        let movements = vec![
            movement(MovementKind::Deposit, 5_000, usd(), None),
            movement(MovementKind::Deposit, 1_000, usd(), None),
            movement(MovementKind::Deposit, 70_000, cdf(), None),
            movement(MovementKind::Withdrawal, 2_000, usd(), None),
        ];

        let summary = summarize(&movements).unwrap();
        assert_eq!(summary.len(), 3);

        let usd_deposits = summary
            .iter()
            .find(|s| s.kind == MovementKind::Deposit && s.currency == usd())
            .unwrap();
        assert_eq!(usd_deposits.count, 2);
        assert_eq!(usd_deposits.total_minor, 6_000);

        let withdrawals = summary
            .iter()
            .find(|s| s.kind == MovementKind::Withdrawal)
            .unwrap();
        assert_eq!(withdrawals.total_minor, -2_000);
    }

    #[test]
    fn test_institution_breakdown_with_prefix_resolver() {
        let movements = vec![
            movement(MovementKind::Withdrawal, 2_000, usd(), Some("mpesa:TX1")),
            movement(MovementKind::Withdrawal, 500, usd(), Some("mpesa:TX2")),
            movement(MovementKind::Withdrawal, 9_000, cdf(), Some("airtel:TX3")),
            movement(MovementKind::Withdrawal, 100, usd(), Some("unprefixed")),
            movement(MovementKind::Withdrawal, 100, usd(), None),
            movement(MovementKind::Deposit, 4_000, usd(), Some("mpesa:TX4")),
        ];

        let totals = institution_breakdown(&movements, &PrefixResolver::default()).unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].institution, "airtel");
        assert_eq!(totals[1].institution, "mpesa");
        assert_eq!(totals[1].count, 2);
        assert_eq!(totals[1].total_minor, 2_500);
    }

    #[test]
    fn test_institution_breakdown_with_table_and_closure() {
        let movements = vec![movement(MovementKind::Withdrawal, 700, usd(), Some("op-17"))];

        let mut table = HashMap::new();
        table.insert("op-17".to_string(), "equity".to_string());
        let totals = institution_breakdown(&movements, &table).unwrap();
        assert_eq!(totals[0].institution, "equity");

        let closure = |reference: &str| reference.strip_prefix("op-").map(|_| "rawbank".to_string());
        let totals = institution_breakdown(&movements, &closure).unwrap();
        assert_eq!(totals[0].institution, "rawbank");
        assert_eq!(totals[0].total_minor, 700);
    }

    #[test]
    fn test_shop_day_rollup() {
        let now = Utc::now();
        let session = |id: &str, status: SessionStatus| CashSession {
            id: id.to_string(),
            register_id: format!("reg-{id}"),
            operator_id: "op".to_string(),
            status,
            opened_at: now,
            closed_at: None,
            opening_notes: None,
            closing_notes: None,
            opened_by: "op".to_string(),
            updated_at: now,
        };
        let balance = |session_id: &str, opening: i64, current: i64| CurrencyBalance {
            session_id: session_id.to_string(),
            currency: usd(),
            opening_minor: opening,
            current_minor: current,
        };

        let sessions = vec![session("s1", SessionStatus::Open), session("s2", SessionStatus::Closed)];
        let balances = vec![
            balance("s1", 10_000, 13_000),
            balance("s2", 5_000, 4_000),
            balance("other", 1, 1),
        ];

        let rollup = ShopDayRollup::build("shop-1", now.date_naive(), &sessions, &balances).unwrap();
        assert_eq!(rollup.open_sessions, 1);
        assert_eq!(rollup.closed_sessions, 1);
        assert_eq!(rollup.lines.len(), 1);
        assert_eq!(rollup.lines[0].opening_minor, 15_000);
        assert_eq!(rollup.lines[0].current_minor, 17_000);
        assert_eq!(rollup.lines[0].movement_minor, 2_000);
    }
}
