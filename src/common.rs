//! Common types and validation helpers shared by commands and services
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use validator::ValidationError;

use crate::errors::ServiceError;

/// Partial update of a nullable field.
///
/// `Keep` leaves the stored value alone, `Clear` nulls it and `Set` replaces
/// it. In serialized form an absent key is `Keep`, an explicit `null` is
/// `Clear` and any other value is `Set`, so fields must be declared with
/// `#[serde(default)]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    Keep,
    Clear,
    Set(T),
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        FieldUpdate::Keep
    }
}

impl<T> FieldUpdate<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, FieldUpdate::Keep)
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            FieldUpdate::Set(v) => Some(v),
            _ => None,
        }
    }
}

impl<T: Clone + PartialEq> FieldUpdate<T> {
    /// Value the field holds after the update is applied to `current`.
    pub fn apply_to(&self, current: &Option<T>) -> Option<T> {
        match self {
            FieldUpdate::Keep => current.clone(),
            FieldUpdate::Clear => None,
            FieldUpdate::Set(v) => Some(v.clone()),
        }
    }

    /// Returns the new value only when it differs from `current`.
    pub fn change_from(&self, current: &Option<T>) -> Option<Option<T>> {
        let next = self.apply_to(current);
        if &next == current {
            None
        } else {
            Some(next)
        }
    }
}

impl<T> From<Option<T>> for FieldUpdate<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => FieldUpdate::Set(v),
            None => FieldUpdate::Clear,
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FieldUpdate<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(FieldUpdate::from)
    }
}

impl<T: Serialize> Serialize for FieldUpdate<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            FieldUpdate::Set(v) => serializer.serialize_some(v),
            FieldUpdate::Keep | FieldUpdate::Clear => serializer.serialize_none(),
        }
    }
}

/// Rejects empty or whitespace-only text.
pub fn require_text(field: &str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::ValidationError(format!(
            "{} is required",
            field
        )));
    }
    Ok(())
}

/// Rejects negative quantities and amounts.
pub fn require_non_negative(field: &str, value: Decimal) -> Result<(), ServiceError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ServiceError::ValidationError(format!(
            "{} cannot be negative",
            field
        )));
    }
    Ok(())
}

/// Trims optional free text, folding blank strings to `None`.
pub fn normalize_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Caller-supplied note for a log entry, or `default` when none was given.
pub fn entry_message(note: Option<&str>, default: &str) -> String {
    normalize_text(note).unwrap_or_else(|| default.to_string())
}

/// `validator` hook for required description fields.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// `validator` hook for quantities and money.
pub fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("negative");
        err.message = Some("must not be negative".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[derive(Debug, Deserialize, Serialize)]
    struct Patch {
        #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
        notes: FieldUpdate<String>,
    }

    #[test]
    fn absent_null_and_value_are_distinct() {
        let keep: Patch = serde_json::from_value(json!({})).unwrap();
        let clear: Patch = serde_json::from_value(json!({ "notes": null })).unwrap();
        let set: Patch = serde_json::from_value(json!({ "notes": "rush" })).unwrap();

        assert_eq!(keep.notes, FieldUpdate::Keep);
        assert_eq!(clear.notes, FieldUpdate::Clear);
        assert_eq!(set.notes, FieldUpdate::Set("rush".to_string()));
        assert_eq!(serde_json::to_value(&keep).unwrap(), json!({}));
    }

    #[test]
    fn change_from_ignores_identical_values() {
        let current = Some("rush".to_string());
        assert_eq!(FieldUpdate::Keep.change_from(&current), None);
        assert_eq!(
            FieldUpdate::Set("rush".to_string()).change_from(&current),
            None
        );
        assert_eq!(
            FieldUpdate::<String>::Clear.change_from(&current),
            Some(None)
        );
        assert_eq!(FieldUpdate::<String>::Clear.change_from(&None), None);
    }

    #[test]
    fn validators_reject_blank_and_negative() {
        assert!(require_text("description", "  ").is_err());
        assert!(require_text("description", "Rebar").is_ok());
        assert!(require_non_negative("quantity", dec!(-0.5)).is_err());
        assert!(require_non_negative("quantity", dec!(0)).is_ok());
        assert!(validate_not_blank("\t").is_err());
        assert!(validate_non_negative(&dec!(-1)).is_err());
        assert_eq!(normalize_text(Some("  ")), None);
        assert_eq!(normalize_text(Some(" Yard ")), Some("Yard".into()));
    }
}
