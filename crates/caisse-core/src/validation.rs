//! # Validation Module
//!
//! Input checks run before any lock is taken or any connection acquired.
//!
//! ## Validation Flow
//! ```text
//! caller input ──► validate_*() ──► Ok ──► lock ──► transaction
//!                       │
//!                       └──► Err(ValidationError / LedgerError) ──► rejected, nothing written
//! ```

use std::collections::BTreeMap;

use crate::currency::{Currency, CurrencyCatalog};
use crate::error::{LedgerError, LedgerResult, ValidationError};
use crate::money::Money;
use crate::{MAX_DESCRIPTION_LEN, MAX_EXTERNAL_REF_LEN, MAX_IDENTIFIER_LEN, MAX_NOTES_LEN};

// =============================================================================
// Text Fields
// =============================================================================

/// Validates an opaque identifier (register, shop, operator, actor, session).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most `MAX_IDENTIFIER_LEN` characters
/// - No whitespace or control characters anywhere
pub fn validate_identifier(field: &str, value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if trimmed.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_IDENTIFIER_LEN,
        });
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not contain whitespace or control characters".to_string(),
        });
    }
    Ok(())
}

/// Validates optional opening/closing notes.
pub fn validate_notes(notes: Option<&str>) -> Result<(), ValidationError> {
    match notes {
        Some(n) if n.chars().count() > MAX_NOTES_LEN => Err(ValidationError::TooLong {
            field: "notes".to_string(),
            max: MAX_NOTES_LEN,
        }),
        _ => Ok(()),
    }
}

/// Validates a movement description. Empty is allowed.
pub fn validate_description(description: &str) -> Result<(), ValidationError> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: MAX_DESCRIPTION_LEN,
        });
    }
    Ok(())
}

/// Validates an optional external business-transaction reference.
pub fn validate_external_ref(external_ref: Option<&str>) -> Result<(), ValidationError> {
    let Some(value) = external_ref else {
        return Ok(());
    };
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "external_ref".to_string(),
        });
    }
    if value.chars().count() > MAX_EXTERNAL_REF_LEN {
        return Err(ValidationError::TooLong {
            field: "external_ref".to_string(),
            max: MAX_EXTERNAL_REF_LEN,
        });
    }
    Ok(())
}

// =============================================================================
// Amounts
// =============================================================================

/// Rejects negative amounts. Zero is fine (an empty drawer).
pub fn validate_non_negative(label: &str, amount: Money) -> LedgerResult<()> {
    if amount.is_negative() {
        return Err(LedgerError::invalid_amount(format!(
            "{} must not be negative (got {})",
            label,
            amount.minor()
        )));
    }
    Ok(())
}

/// Validates a movement magnitude.
///
/// ## Rules
/// - negative → always rejected
/// - zero → rejected unless `allow_zero`
pub fn validate_magnitude(magnitude: Money, allow_zero: bool) -> LedgerResult<()> {
    validate_non_negative("movement amount", magnitude)?;
    if magnitude.is_zero() && !allow_zero {
        return Err(LedgerError::invalid_amount(
            "movement amount must be greater than zero",
        ));
    }
    Ok(())
}

/// Validates an opening or counted amount map against the catalog.
///
/// Every currency must be known and every amount non-negative.
pub fn validate_amounts(
    label: &str,
    amounts: &BTreeMap<Currency, Money>,
    catalog: &CurrencyCatalog,
) -> LedgerResult<()> {
    for (currency, amount) in amounts {
        catalog.ensure_known(*currency)?;
        validate_non_negative(&format!("{} {}", label, currency), *amount)?;
    }
    Ok(())
}

/// Builds an amount map from (currency, amount) pairs, rejecting repeats.
///
/// A repeated currency is almost always a typo at the counter, so it is
/// refused rather than summed or overwritten.
pub fn collect_amounts(
    field: &str,
    pairs: impl IntoIterator<Item = (Currency, Money)>,
) -> Result<BTreeMap<Currency, Money>, ValidationError> {
    let mut map = BTreeMap::new();
    for (currency, amount) in pairs {
        if map.insert(currency, amount).is_some() {
            return Err(ValidationError::Duplicate {
                field: field.to_string(),
                value: currency.to_string(),
            });
        }
    }
    Ok(map)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cur(code: &str) -> Currency {
        Currency::parse(code).unwrap()
    }

    #[test]
    fn test_identifier_rules() {
        assert!(validate_identifier("register_id", "till-1").is_ok());
        assert!(matches!(
            validate_identifier("register_id", "  "),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_identifier("register_id", "till 1"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        let long = "x".repeat(MAX_IDENTIFIER_LEN + 1);
        assert!(matches!(
            validate_identifier("register_id", &long),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_notes_and_description_lengths() {
        assert!(validate_notes(None).is_ok());
        assert!(validate_notes(Some("float counted twice")).is_ok());
        assert!(validate_notes(Some(&"n".repeat(MAX_NOTES_LEN + 1))).is_err());

        assert!(validate_description("").is_ok());
        assert!(validate_description(&"d".repeat(MAX_DESCRIPTION_LEN + 1)).is_err());
    }

    #[test]
    fn test_external_ref() {
        assert!(validate_external_ref(None).is_ok());
        assert!(validate_external_ref(Some("op-1")).is_ok());
        assert!(validate_external_ref(Some("")).is_err());
    }

    #[test]
    fn test_magnitude_rules() {
        assert!(validate_magnitude(Money::from_minor(1), false).is_ok());
        assert!(validate_magnitude(Money::zero(), false).is_err());
        assert!(validate_magnitude(Money::zero(), true).is_ok());
        assert!(validate_magnitude(Money::from_minor(-1), true).is_err());
    }

    #[test]
    fn test_amount_map_validation() {
        let catalog = CurrencyCatalog::default();
        let mut amounts = BTreeMap::new();
        amounts.insert(cur("USD"), Money::from_minor(10_000));
        amounts.insert(cur("CDF"), Money::zero());
        assert!(validate_amounts("opening", &amounts, &catalog).is_ok());

        amounts.insert(cur("USD"), Money::from_minor(-1));
        assert!(matches!(
            validate_amounts("opening", &amounts, &catalog),
            Err(LedgerError::InvalidAmount { .. })
        ));

        let mut unknown = BTreeMap::new();
        unknown.insert(cur("XYZ"), Money::from_minor(1));
        assert!(matches!(
            validate_amounts("opening", &unknown, &catalog),
            Err(LedgerError::UnknownCurrency { .. })
        ));
    }

    #[test]
    fn test_collect_amounts_rejects_duplicates() {
        let ok = collect_amounts(
            "counted",
            vec![(cur("USD"), Money::from_minor(1)), (cur("CDF"), Money::from_minor(2))],
        )
        .unwrap();
        assert_eq!(ok.len(), 2);

        let err = collect_amounts(
            "counted",
            vec![(cur("USD"), Money::from_minor(1)), (cur("USD"), Money::from_minor(2))],
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "counted 'USD' given more than once");
    }
}
