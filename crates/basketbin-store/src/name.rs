//! Basket name rules
//!
//! Names double as public path segments, so they are restricted to
//! characters that survive a URL untouched.

use crate::error::{StoreError, StoreResult};

pub const MAX_BASKET_NAME_LEN: usize = 64;

/// Validate a client-chosen basket name
///
/// Accepts 1..=64 ASCII alphanumerics, `-` and `_`, not starting with
/// a separator.
pub fn validate_basket_name(name: &str) -> StoreResult<()> {
    if name.is_empty() {
        return Err(StoreError::InvalidName(
            "Basket name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_BASKET_NAME_LEN {
        return Err(StoreError::InvalidName(format!(
            "Basket name too long (max {} characters): {}",
            MAX_BASKET_NAME_LEN,
            name.len()
        )));
    }

    if name.starts_with('-') || name.starts_with('_') {
        return Err(StoreError::InvalidName(
            "Basket name cannot start with '-' or '_'".to_string(),
        ));
    }

    if let Some(ch) = name
        .chars()
        .find(|ch| !ch.is_ascii_alphanumeric() && *ch != '-' && *ch != '_')
    {
        return Err(StoreError::InvalidName(format!(
            "Basket name contains invalid character '{}'",
            ch
        )));
    }

    Ok(())
}
