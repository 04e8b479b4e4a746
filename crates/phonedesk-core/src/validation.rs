//! # Validation Module
//!
//! Input validation utilities for PhoneDesk.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP controller / batch runner                               │
//! │  ├── Type validation (JSON deserialization)                            │
//! │  └── Sanitization (outside this engine)                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Engine entry points                                          │
//! │  └── THIS MODULE: ids, prices, buyer fields, batch shape               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints (status, method, card digits)                   │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here runs before the first store round-trip, so a
//! validation failure never leaves anything behind.

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::money::{Money, MAX_AMOUNT, MONEY_SCALE};
use crate::types::BuyerInfo;
use crate::MAX_BATCH_ITEMS;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length of an item, sale or location identifier.
pub const MAX_ID_LEN: usize = 64;
/// Maximum buyer name length.
pub const MAX_BUYER_NAME_LEN: usize = 100;
/// Maximum buyer phone length (before digit normalization).
pub const MAX_BUYER_PHONE_LEN: usize = 30;
/// Maximum buyer email length.
pub const MAX_BUYER_EMAIL_LEN: usize = 255;
/// Maximum sale notes length.
pub const MAX_NOTES_LEN: usize = 1000;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an identifier (item, sale, location).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 64 characters
///
/// ## Example
/// ```rust
/// use phonedesk_core::validation::validate_id;
///
/// assert!(validate_id("item_id", "iphone-15-0001").is_ok());
/// assert!(validate_id("item_id", "   ").is_err());
/// ```
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if id.chars().count() > MAX_ID_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ID_LEN,
        });
    }

    Ok(())
}

/// Trims an optional text field, turning blank into `None`, and
/// enforces a maximum length in characters.
///
/// ## Example
/// ```rust
/// use phonedesk_core::validation::normalize_optional_text;
///
/// assert_eq!(normalize_optional_text("notes", Some("  hi "), 10).unwrap(), Some("hi".to_string()));
/// assert_eq!(normalize_optional_text("notes", Some("   "), 10).unwrap(), None);
/// assert!(normalize_optional_text("notes", Some("a long note"), 4).is_err());
/// ```
pub fn normalize_optional_text(
    field: &str,
    value: Option<&str>,
    max: usize,
) -> ValidationResult<Option<String>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(Some(value.to_string()))
}

/// Normalizes buyer contact fields.
///
/// ## Rules
/// - Each field is trimmed, blank becomes `None`
/// - name ≤ 100, phone ≤ 30, email ≤ 255 characters
/// - email, when present, must contain `@` with text on both sides
pub fn normalize_buyer(buyer: &BuyerInfo) -> ValidationResult<BuyerInfo> {
    let name = normalize_optional_text("buyer_name", buyer.name.as_deref(), MAX_BUYER_NAME_LEN)?;
    let phone =
        normalize_optional_text("buyer_phone", buyer.phone.as_deref(), MAX_BUYER_PHONE_LEN)?;
    let email =
        normalize_optional_text("buyer_email", buyer.email.as_deref(), MAX_BUYER_EMAIL_LEN)?;

    if let Some(email) = &email {
        let valid = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
        if !valid {
            return Err(ValidationError::InvalidFormat {
                field: "buyer_email".to_string(),
                reason: "must look like name@domain".to_string(),
            });
        }
    }

    Ok(BuyerInfo { name, phone, email })
}

/// Strips everything but ASCII digits from a phone number.
///
/// ## Example
/// ```rust
/// use phonedesk_core::validation::phone_digits;
///
/// assert_eq!(phone_digits("+1 (555) 010-4477"), "15550104477");
/// ```
pub fn phone_digits(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Validates a phone search term and returns its digits.
pub fn validate_phone_search(phone: &str) -> ValidationResult<String> {
    let digits = phone_digits(phone);

    if digits.is_empty() {
        return Err(ValidationError::Required {
            field: "phone".to_string(),
        });
    }

    if digits.len() > MAX_BUYER_PHONE_LEN {
        return Err(ValidationError::TooLong {
            field: "phone".to_string(),
            max: MAX_BUYER_PHONE_LEN,
        });
    }

    Ok(digits)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a sale price.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Must not exceed [`MAX_AMOUNT`]
/// - Zero is allowed (giveaway accessories)
///
/// ## Example
/// ```rust
/// use phonedesk_core::money::Money;
/// use phonedesk_core::validation::validate_price;
///
/// assert!(validate_price(Money::from_units(999)).is_ok());
/// assert!(validate_price(Money::zero()).is_ok());
/// assert!(validate_price(Money::from_units(-1)).is_err());
/// ```
pub fn validate_price(price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "sale_price".to_string(),
        });
    }

    if price.exceeds_cap() {
        return Err(ValidationError::OutOfRange {
            field: "sale_price".to_string(),
            min: 0,
            max: MAX_AMOUNT.raw() / MONEY_SCALE,
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

/// Validates a calendar year for monthly reports.
pub fn validate_year(year: i32) -> ValidationResult<()> {
    if !(2000..=9999).contains(&year) {
        return Err(ValidationError::OutOfRange {
            field: "year".to_string(),
            min: 2000,
            max: 9999,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the item list of a batch sale.
///
/// ## Rules
/// - At least one item
/// - No more than MAX_BATCH_ITEMS (100)
/// - Every id valid, and no id twice (a unit can only be sold once)
pub fn validate_batch_items<'a, I>(item_ids: I) -> ValidationResult<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();

    for id in item_ids {
        validate_id("item_id", id)?;
        if !seen.insert(id.trim()) {
            return Err(ValidationError::Duplicate {
                field: "item_id".to_string(),
                value: id.trim().to_string(),
            });
        }
    }

    if seen.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if seen.len() > MAX_BATCH_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_BATCH_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
