//! Naming rules for collections and storage keys.
//!
//! Collection names (also used as file stems by [`JsonFileStore`]):
//! - Must be non-empty
//! - Must not contain `$`, NUL, `/` or `\`
//! - Must not start with `system.` (reserved namespace)
//!
//! Storage keys:
//! - Must be non-empty
//! - Must not start with `$` (operator syntax)
//! - Must not contain `.` (dotted paths address nested fields) or NUL
//!
//! [`JsonFileStore`]: crate::JsonFileStore

use crate::error::{StoreError, StoreResult};

/// Characters that are forbidden anywhere in a collection name.
const FORBIDDEN_COLLECTION_CHARS: &[char] = &['$', '\0', '/', '\\'];

/// Validate a collection name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use docbind_store::names::validate_collection_name;
///
/// assert!(validate_collection_name("xperms_players").is_ok());
/// assert!(validate_collection_name("").is_err());
/// assert!(validate_collection_name("system.users").is_err());
/// ```
pub fn validate_collection_name(name: &str) -> StoreResult<()> {
    if name.is_empty() {
        return Err(invalid(name, "collection name must not be empty"));
    }

    for ch in FORBIDDEN_COLLECTION_CHARS {
        if name.contains(*ch) {
            return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
        }
    }

    if name.starts_with("system.") {
        return Err(invalid(name, "the 'system.' prefix is reserved"));
    }

    Ok(())
}

/// Validate a storage key, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use docbind_store::names::validate_storage_key;
///
/// assert!(validate_storage_key("uniqueId").is_ok());
/// assert!(validate_storage_key("$set").is_err());
/// assert!(validate_storage_key("a.b").is_err());
/// ```
pub fn validate_storage_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(invalid(key, "storage key must not be empty"));
    }

    if key.starts_with('$') {
        return Err(invalid(key, "must not start with '$'"));
    }

    if key.contains('.') {
        return Err(invalid(key, "must not contain '.'"));
    }

    if key.contains('\0') {
        return Err(invalid(key, "contains forbidden character: '\\0'"));
    }

    Ok(())
}

fn invalid(name: &str, reason: impl Into<String>) -> StoreError {
    StoreError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_collection_names() {
        for name in ["profiles", "xperms_players", "groups-v2", "a"] {
            assert!(validate_collection_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn invalid_collection_names() {
        for name in ["", "a$b", "a/b", "a\\b", "nul\0", "system.indexes"] {
            assert!(validate_collection_name(name).is_err(), "{name:?} should be invalid");
        }
    }

    #[test]
    fn valid_storage_keys() {
        for key in ["uniqueId", "username", "profile_group", "_id", "a$"] {
            assert!(validate_storage_key(key).is_ok(), "{key} should be valid");
        }
    }

    #[test]
    fn invalid_storage_keys() {
        for key in ["", "$set", "a.b", "x\0"] {
            assert!(validate_storage_key(key).is_err(), "{key:?} should be invalid");
        }
    }

    #[test]
    fn error_carries_reason() {
        let err = validate_storage_key("$inc").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("$inc"));
        assert!(msg.contains("'$'"));
    }
}
