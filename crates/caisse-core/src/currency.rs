//! # Currencies
//!
//! Currency codes, the catalog of recognized currencies and the
//! currency-tagged amount value type.
//!
//! ## Recognition Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  "usd"  ──► Currency::parse ──► "USD" (3 ASCII letters, uppercased)     │
//! │                  │                                                      │
//! │                  ▼                                                      │
//! │        CurrencyCatalog::resolve ──► recognized? ──► exponent 2          │
//! │                  │                                                      │
//! │                  └── not catalogued ──► LedgerError::UnknownCurrency    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{LedgerError, LedgerResult, ValidationError};
use crate::money::{Money, MAX_EXPONENT};

// =============================================================================
// Currency Code
// =============================================================================

/// A three-letter currency code such as `USD` or `CDF`.
///
/// Construction only checks the shape; whether the code is *recognized* is
/// the [`CurrencyCatalog`]'s decision.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    /// Parses a currency code, normalising to uppercase.
    ///
    /// ```rust
    /// use caisse_core::Currency;
    ///
    /// assert_eq!(Currency::parse("cdf").unwrap().code(), "CDF");
    /// assert!(Currency::parse("US").is_err());
    /// assert!(Currency::parse("U5D").is_err());
    /// ```
    pub fn parse(code: &str) -> Result<Self, ValidationError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ValidationError::Required {
                field: "currency".to_string(),
            });
        }

        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(|b| b.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidFormat {
                field: "currency".to_string(),
                reason: format!("'{}' is not a 3-letter code", code),
            });
        }

        Ok(Currency([
            bytes[0].to_ascii_uppercase(),
            bytes[1].to_ascii_uppercase(),
            bytes[2].to_ascii_uppercase(),
        ]))
    }

    /// Returns the code as a string slice.
    pub fn code(&self) -> &str {
        // Only ASCII letters are ever stored.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Currency({})", self.code())
    }
}

impl FromStr for Currency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::parse(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::parse(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.code().to_string()
    }
}

// =============================================================================
// Currency Catalog
// =============================================================================

/// Built-in recognized currencies and their minor-unit exponents.
const BUILTIN_CURRENCIES: &[(&str, u32)] = &[
    ("AED", 2),
    ("AOA", 2),
    ("BIF", 0),
    ("CAD", 2),
    ("CDF", 2),
    ("CHF", 2),
    ("CNY", 2),
    ("EUR", 2),
    ("GBP", 2),
    ("GHS", 2),
    ("JPY", 0),
    ("KES", 2),
    ("MAD", 2),
    ("NGN", 2),
    ("RWF", 0),
    ("TZS", 2),
    ("UGX", 0),
    ("USD", 2),
    ("XAF", 0),
    ("XOF", 0),
    ("ZAR", 2),
    ("ZMW", 2),
];

/// The set of currencies the ledger accepts, with their exponents.
///
/// ## Configuration
/// ```rust
/// use caisse_core::{Currency, CurrencyCatalog};
///
/// let usd = Currency::parse("USD").unwrap();
/// let cdf = Currency::parse("CDF").unwrap();
///
/// // Only accept the two currencies a given shop actually handles
/// let catalog = CurrencyCatalog::default().restrict_to(&[usd, cdf]);
/// assert!(catalog.resolve("usd").is_ok());
/// assert!(catalog.resolve("EUR").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyCatalog {
    exponents: BTreeMap<Currency, u32>,
}

impl Default for CurrencyCatalog {
    fn default() -> Self {
        let exponents = BUILTIN_CURRENCIES
            .iter()
            .filter_map(|(code, exp)| Currency::parse(code).ok().map(|c| (c, *exp)))
            .collect();
        CurrencyCatalog { exponents }
    }
}

impl CurrencyCatalog {
    /// An empty catalog that recognizes nothing.
    pub fn empty() -> Self {
        CurrencyCatalog {
            exponents: BTreeMap::new(),
        }
    }

    /// Adds (or re-declares) a currency.
    pub fn with_currency(mut self, currency: Currency, exponent: u32) -> LedgerResult<Self> {
        if exponent > MAX_EXPONENT {
            return Err(LedgerError::invalid_amount(format!(
                "exponent {} for {} exceeds {}",
                exponent, currency, MAX_EXPONENT
            )));
        }
        self.exponents.insert(currency, exponent);
        Ok(self)
    }

    /// Keeps only the listed currencies.
    pub fn restrict_to(mut self, allowed: &[Currency]) -> Self {
        self.exponents.retain(|c, _| allowed.contains(c));
        self
    }

    /// Parses and recognizes a code in one step.
    ///
    /// Both malformed and uncatalogued codes fail with `UnknownCurrency`.
    pub fn resolve(&self, code: &str) -> LedgerResult<Currency> {
        let currency = Currency::parse(code).map_err(|_| LedgerError::UnknownCurrency {
            code: code.trim().to_string(),
        })?;
        self.ensure_known(currency)?;
        Ok(currency)
    }

    /// Fails with `UnknownCurrency` if the currency is not catalogued.
    pub fn ensure_known(&self, currency: Currency) -> LedgerResult<()> {
        if self.exponents.contains_key(&currency) {
            Ok(())
        } else {
            Err(LedgerError::UnknownCurrency {
                code: currency.code().to_string(),
            })
        }
    }

    /// Minor-unit exponent of a catalogued currency.
    pub fn exponent(&self, currency: Currency) -> LedgerResult<u32> {
        self.exponents
            .get(&currency)
            .copied()
            .ok_or_else(|| LedgerError::UnknownCurrency {
                code: currency.code().to_string(),
            })
    }

    /// Parses decimal text as an amount of `currency`.
    pub fn parse_amount(&self, currency: Currency, text: &str) -> LedgerResult<Money> {
        Money::parse_decimal(text, self.exponent(currency)?)
    }

    /// Formats an amount as `"130.50 USD"`.
    pub fn format(&self, amount: &CurrencyAmount) -> LedgerResult<String> {
        let exponent = self.exponent(amount.currency)?;
        Ok(format!(
            "{} {}",
            amount.amount.to_decimal_string(exponent),
            amount.currency
        ))
    }

    /// Iterates the recognized currencies in code order.
    pub fn currencies(&self) -> impl Iterator<Item = Currency> + '_ {
        self.exponents.keys().copied()
    }

    /// Number of recognized currencies.
    pub fn len(&self) -> usize {
        self.exponents.len()
    }

    /// True if nothing is recognized.
    pub fn is_empty(&self) -> bool {
        self.exponents.is_empty()
    }
}

// =============================================================================
// Currency Amount
// =============================================================================

/// An amount tagged with its currency.
///
/// Arithmetic between two amounts checks the currencies first; there is no
/// way to add USD to CDF by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyAmount {
    pub currency: Currency,
    pub amount: Money,
}

impl CurrencyAmount {
    pub fn new(currency: Currency, amount: Money) -> Self {
        CurrencyAmount { currency, amount }
    }

    pub fn zero(currency: Currency) -> Self {
        CurrencyAmount::new(currency, Money::zero())
    }

    /// Adds two amounts of the same currency.
    pub fn checked_add(&self, other: &CurrencyAmount) -> LedgerResult<CurrencyAmount> {
        self.ensure_same_currency(other)?;
        Ok(CurrencyAmount::new(
            self.currency,
            self.amount.checked_add(other.amount)?,
        ))
    }

    /// Subtracts an amount of the same currency.
    pub fn checked_sub(&self, other: &CurrencyAmount) -> LedgerResult<CurrencyAmount> {
        self.ensure_same_currency(other)?;
        Ok(CurrencyAmount::new(
            self.currency,
            self.amount.checked_sub(other.amount)?,
        ))
    }

    fn ensure_same_currency(&self, other: &CurrencyAmount) -> LedgerResult<()> {
        if self.currency != other.currency {
            return Err(LedgerError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
