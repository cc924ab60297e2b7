//! # Validation Module
//!
//! Required-field and format checks for Stockroom inputs.
//!
//! ## Where Validation Runs
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (before any database call)                        │
//! │  ├── Required fields (sku, name, email, ...)                            │
//! │  ├── Formats (email, UUID, currency code)                               │
//! │  └── Ranges (non-negative prices and quantities)                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Database (SQLite)                                             │
//! │  ├── NOT NULL / CHECK constraints                                       │
//! │  ├── UNIQUE (items.sku, users.email, settings.user_id)                  │
//! │  └── Foreign keys                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A rejected input never reaches the store.
//!
//! ## Usage
//! ```rust
//! use stockroom_core::validation::{validate_sku, validate_email};
//!
//! validate_sku("OIL-1L").unwrap();
//! assert!(validate_email("not-an-email").is_err());
//! ```

use crate::error::ValidationError;
use crate::money::{Currency, Locale};
use crate::types::{
    CustomerInput, ItemInput, NotificationInput, OrderInput, SettingsUpdate, WarehouseInput,
};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Shortest password accepted at sign-up or reset.
pub const MIN_PASSWORD_LENGTH: usize = 6;

// =============================================================================
// String Validators
// =============================================================================

/// Fails with `Required` when the trimmed value is empty.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(())
}

/// Required text with an upper length bound (in characters).
pub fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    validate_required(field, value)?;

    if value.trim().chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a stock code.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits, hyphens, underscores and dots only
///
/// ## Example
/// ```rust
/// use stockroom_core::validation::validate_sku;
///
/// assert!(validate_sku("TEA-GREEN_250g").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    validate_text("sku", sku, 50)?;

    if !sku
        .trim()
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, underscores and dots"
                .to_string(),
        });
    }

    Ok(())
}

/// Validates an email address.
///
/// Deliberately loose: one `@`, something on each side, and a dot in the
/// domain part.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    validate_required("email", email)?;

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };

    if !valid || email.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must be a valid email address".to_string(),
        });
    }

    Ok(())
}

pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::required("password"));
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD_LENGTH,
        });
    }

    Ok(())
}

/// Validates a UUID string (any version).
pub fn validate_uuid(field: &str, value: &str) -> ValidationResult<()> {
    uuid::Uuid::parse_str(value.trim()).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;
    Ok(())
}

/// Validates a currency code against the supported set.
pub fn validate_currency(currency: &str) -> ValidationResult<()> {
    validate_required("currency", currency)?;

    currency
        .parse::<Currency>()
        .map(|_| ())
        .map_err(|_| ValidationError::NotAllowed {
            field: "currency".to_string(),
            allowed: Currency::ALL.iter().map(|c| c.code().to_string()).collect(),
        })
}

/// Validates an interface language tag.
pub fn validate_language(language: &str) -> ValidationResult<()> {
    language
        .parse::<Locale>()
        .map(|_| ())
        .map_err(|_| ValidationError::NotAllowed {
            field: "language".to_string(),
            allowed: vec!["en".to_string(), "fr".to_string(), "ar".to_string()],
        })
}

/// Trims a search term; blank terms become `None`.
pub fn normalize_search(query: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(query) = query.map(str::trim) else {
        return Ok(None);
    };

    if query.is_empty() {
        return Ok(None);
    }

    if query.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "search".to_string(),
            max: 100,
        });
    }

    Ok(Some(query.to_string()))
}

// =============================================================================
// Numeric Validators
// =============================================================================

pub fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    Ok(())
}

pub fn validate_positive(field: &str, value: i64) -> ValidationResult<()> {
    if value <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Input Validators
// =============================================================================

/// Validates an item form before it is saved.
///
/// ## Rules
/// - `sku`, `name`, `currency` required
/// - prices, quantity, boxes and units per box not negative
/// - `warehouse_id`, when present, is a UUID
pub fn validate_item_input(input: &ItemInput) -> ValidationResult<()> {
    validate_sku(&input.sku)?;
    validate_text("name", &input.name, 200)?;
    validate_currency(&input.currency)?;

    validate_non_negative("boxes", input.boxes)?;
    validate_non_negative("units_per_box", input.units_per_box)?;
    validate_non_negative("bought_price", input.bought_price_cents)?;
    validate_non_negative("shipment_fees", input.shipment_fees_cents)?;
    validate_non_negative("selling_price", input.selling_price_cents)?;
    validate_non_negative("quantity", input.quantity)?;

    if let Some(warehouse_id) = &input.warehouse_id {
        validate_uuid("warehouse_id", warehouse_id)?;
    }

    Ok(())
}

pub fn validate_warehouse_input(input: &WarehouseInput) -> ValidationResult<()> {
    validate_text("name", &input.name, 120)
}

/// Customers need a name; email is checked only when given.
pub fn validate_customer_input(input: &CustomerInput) -> ValidationResult<()> {
    validate_text("name", &input.name, 200)?;

    if let Some(email) = input.email.as_deref().filter(|e| !e.trim().is_empty()) {
        validate_email(email)?;
    }

    Ok(())
}

/// Orders need at least one line, each with a positive quantity.
pub fn validate_order_input(input: &OrderInput) -> ValidationResult<()> {
    validate_currency(&input.currency)?;

    if input.items.is_empty() {
        return Err(ValidationError::required("items"));
    }

    if let Some(customer_id) = &input.customer_id {
        validate_uuid("customer_id", customer_id)?;
    }

    for line in &input.items {
        validate_uuid("item_id", &line.item_id)?;
        validate_positive("quantity", line.quantity)?;
        validate_non_negative("price", line.price_cents)?;
    }

    Ok(())
}

pub fn validate_notification_input(input: &NotificationInput) -> ValidationResult<()> {
    validate_text("message", &input.message, 1000)
}

pub fn validate_settings_update(update: &SettingsUpdate) -> ValidationResult<()> {
    if let Some(currency) = &update.currency {
        validate_currency(currency)?;
    }
    if let Some(language) = &update.language {
        validate_language(language)?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
