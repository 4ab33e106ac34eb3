//! # Validation Module
//!
//! Field validators used by the request schemas in [`crate::requests`].
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP (festa-api)                                             │
//! │  └── Type validation (JSON deserialization into request structs)       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Orchestrator boundary (festa-ledger)                         │
//! │  └── THIS MODULE: field rules, before any store read                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Store (SQLite)                                               │
//! │  ├── CHECK (amount_cents >= 0)                                         │
//! │  ├── UNIQUE / PRIMARY KEY constraints                                  │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::{MAX_AMOUNT_CENTS, MAX_IDEMPOTENCY_KEY_LEN, MAX_QR_BATCH_SIZE, MIN_IDEMPOTENCY_KEY_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

fn required<'a>(field: &str, value: &'a str) -> ValidationResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(value)
}

/// Identifiers are looked up verbatim, so padding is rejected, not trimmed.
fn untrimmed(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim() != value {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not have leading or trailing whitespace".to_string(),
        });
    }
    Ok(())
}

fn max_len(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

/// Validates a client-supplied idempotency key.
///
/// ## Rules
/// - 8 to 128 characters
/// - Letters, digits and `-`, `_`, `:`, `.` only (UUIDs pass)
///
/// ## Example
/// ```rust
/// use festa_core::validation::validate_idempotency_key;
///
/// assert!(validate_idempotency_key("7f9c2ba4-e88f-41b6-8b1a-000000000001").is_ok());
/// assert!(validate_idempotency_key("short").is_err());
/// ```
pub fn validate_idempotency_key(key: &str) -> ValidationResult<()> {
    const FIELD: &str = "idempotencyKey";
    if key.is_empty() {
        return Err(ValidationError::Required {
            field: FIELD.to_string(),
        });
    }
    if key.len() < MIN_IDEMPOTENCY_KEY_LEN {
        return Err(ValidationError::TooShort {
            field: FIELD.to_string(),
            min: MIN_IDEMPOTENCY_KEY_LEN,
        });
    }
    max_len(FIELD, key, MAX_IDEMPOTENCY_KEY_LEN)?;
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
    {
        return Err(ValidationError::InvalidFormat {
            field: FIELD.to_string(),
            reason: "must contain only letters, digits, '-', '_', ':' and '.'".to_string(),
        });
    }
    Ok(())
}

/// Validates a QR code label as scanned by a client.
///
/// Imported labels need not follow the generated `QR-` format, so only the
/// character set and length are checked.
pub fn validate_qr_label(field: &str, label: &str) -> ValidationResult<()> {
    required(field, label)?;
    untrimmed(field, label)?;
    max_len(field, label, 64)?;
    if !label
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must contain only letters, digits, hyphens and underscores".to_string(),
        });
    }
    Ok(())
}

/// Validates an entity id (customer, transaction, stall, operator).
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    required(field, id)?;
    untrimmed(field, id)?;
    max_len(field, id, 128)
}

/// Validates a human name (customer, stall, operator display name).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = required(field, name)?;
    max_len(field, name, 100)
}

/// Validates a phone number.
///
/// ## Rules
/// - 7 to 20 characters
/// - Digits plus `+`, spaces, hyphens and parentheses
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    const FIELD: &str = "phone";
    let phone = required(FIELD, phone)?;
    if phone.len() < 7 {
        return Err(ValidationError::TooShort {
            field: FIELD.to_string(),
            min: 7,
        });
    }
    max_len(FIELD, phone, 20)?;
    if !phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'))
    {
        return Err(ValidationError::InvalidFormat {
            field: FIELD.to_string(),
            reason: "must contain only digits, spaces, '+', '-' and parentheses".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a ledger amount in cents.
///
/// ## Rules
/// - Must be positive (zero-amount entries are rejected)
/// - Must not exceed [`MAX_AMOUNT_CENTS`]
pub fn validate_amount_cents(amount_cents: i64) -> ValidationResult<()> {
    if amount_cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amountCents".to_string(),
        });
    }
    if amount_cents > MAX_AMOUNT_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "amountCents".to_string(),
            min: 1,
            max: MAX_AMOUNT_CENTS,
        });
    }
    Ok(())
}

/// Validates a QR batch size: `1..=500`.
pub fn validate_batch_count(count: i64) -> ValidationResult<()> {
    if count <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "count".to_string(),
        });
    }
    if count > MAX_QR_BATCH_SIZE {
        return Err(ValidationError::AboveMaximum {
            field: "count".to_string(),
            max: MAX_QR_BATCH_SIZE,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_key() {
        assert!(validate_idempotency_key("sale:2024-06-01:0001").is_ok());
        assert!(matches!(
            validate_idempotency_key(""),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_idempotency_key("abc"),
            Err(ValidationError::TooShort { .. })
        ));
        assert!(validate_idempotency_key(&"k".repeat(129)).is_err());
        assert!(matches!(
            validate_idempotency_key("has spaces in it"),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_qr_label() {
        assert!(validate_qr_label("qrCodeId", "QR-000123").is_ok());
        assert!(validate_qr_label("qrCodeId", "LEGACY_77").is_ok());
        assert!(validate_qr_label("qrCodeId", "  ").is_err());
        assert!(validate_qr_label("qrCodeId", "QR/1").is_err());
        assert!(matches!(
            validate_qr_label("qrCodeId", " QR-000001"),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_id_rejects_padding() {
        assert!(validate_id("accountId", "c-1").is_ok());
        assert!(matches!(
            validate_id("accountId", "c-1 "),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(matches!(
            validate_id("accountId", "   "),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_phone() {
        assert!(validate_phone("+1 (555) 010-0000").is_ok());
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("call me maybe").is_err());
    }

    #[test]
    fn test_amount() {
        assert!(validate_amount_cents(1).is_ok());
        assert!(validate_amount_cents(MAX_AMOUNT_CENTS).is_ok());
        assert!(validate_amount_cents(0).is_err());
        assert!(validate_amount_cents(-100).is_err());
        assert!(validate_amount_cents(MAX_AMOUNT_CENTS + 1).is_err());
    }

    #[test]
    fn test_batch_count() {
        assert!(validate_batch_count(500).is_ok());
        let err = validate_batch_count(501).unwrap_err();
        assert_eq!(err.to_string(), "Maximum is 500");
        assert!(validate_batch_count(0).is_err());
    }
}
