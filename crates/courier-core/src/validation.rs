//! # Validation Module
//!
//! Pre-flight checks run by the coordinator before any network call or
//! queue write.
//!
//! ## Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  submit(draft)                                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate_draft(&draft) ← THIS MODULE                                  │
//! │       │                                                                 │
//! │       ├── items empty?          → NoItems                               │
//! │       ├── name blank?           → Required { name }                     │
//! │       ├── quantity <= 0?        → MustBePositive { quantity }           │
//! │       ├── sellingPrice < 0?     → Negative { sellingPrice }             │
//! │       ├── price NaN/infinite?   → InvalidFormat                         │
//! │       │                                                                 │
//! │       └── OK → prepare + deliver                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::transaction::{DraftItem, TransactionDraft};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a collaborator draft.
pub fn validate_draft(draft: &TransactionDraft) -> ValidationResult<()> {
    if draft.items.is_empty() {
        return Err(ValidationError::NoItems);
    }

    for (index, item) in draft.items.iter().enumerate() {
        validate_item(index, item)?;
    }

    for (field, value) in [
        ("subtotal", draft.subtotal),
        ("tax", draft.tax),
        ("total", draft.total),
    ] {
        if let Some(v) = value {
            validate_finite(field, v)?;
        }
    }

    Ok(())
}

/// Validates a single draft line.
pub fn validate_item(index: usize, item: &DraftItem) -> ValidationResult<()> {
    validate_name(index, &item.name)?;
    validate_quantity(index, item.quantity)?;
    validate_selling_price(index, item.selling_price)?;

    if let Some(cost) = item.cost_price {
        validate_finite("costPrice", cost)?;
    }

    Ok(())
}

pub fn validate_name(index: usize, name: &str) -> ValidationResult<()> {
    if name.trim().is_empty() {
        return Err(ValidationError::Required {
            index,
            field: "name".to_string(),
        });
    }
    Ok(())
}

pub fn validate_quantity(index: usize, quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            index,
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

/// Zero is allowed (free items).
pub fn validate_selling_price(index: usize, price: f64) -> ValidationResult<()> {
    validate_finite("sellingPrice", price)?;
    if price < 0.0 {
        return Err(ValidationError::Negative {
            index,
            field: "sellingPrice".to_string(),
        });
    }
    Ok(())
}

fn validate_finite(field: &str, value: f64) -> ValidationResult<()> {
    if !value.is_finite() {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be a finite number".to_string(),
        });
    }
    Ok(())
}
