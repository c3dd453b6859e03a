//! Field-level payload validation collected into one `VALIDATION_ERROR`.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

use crate::error::ApiError;
use crate::services::mailer::is_valid_address;

#[derive(Debug, Default)]
pub struct FieldErrors(HashMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Trimmed value; records an error and returns an empty string when blank.
    pub fn required(&mut self, field: &str, value: Option<&str>) -> String {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => v.to_string(),
            None => {
                self.add(field, "This field is required");
                String::new()
            }
        }
    }

    pub fn email(&mut self, field: &str, value: Option<&str>) -> String {
        let email = self.required(field, value);
        if !email.is_empty() && !is_valid_address(&email) {
            self.add(field, "Invalid email address");
        }
        email
    }

    /// ISO `YYYY-MM-DD`.
    pub fn date(&mut self, field: &str, value: Option<&str>) -> Option<NaiveDate> {
        let raw = self.required(field, value);
        if raw.is_empty() {
            return None;
        }
        match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                self.add(field, "Invalid date, expected YYYY-MM-DD");
                None
            }
        }
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation_error("Invalid request payload", Some(self.0)))
        }
    }
}

/// Blank optional text becomes `None`.
pub fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// For `Option<Option<T>>` patch fields: absent stays `None`, an explicit
/// `null` becomes `Some(None)`. Pair with `#[serde(default)]`.
pub fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_every_field_error() {
        let mut errors = FieldErrors::new();
        assert_eq!(errors.required("first_name", Some("  Léa ")), "Léa");
        errors.required("last_name", Some("   "));
        errors.email("email", Some("nope"));
        assert!(errors.date("birth_date", Some("21/03/1998")).is_none());

        let body = errors.finish().unwrap_err().to_json();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        let fields = body["field_errors"].as_object().unwrap();
        assert_eq!(fields.len(), 3);
        assert!(fields.contains_key("last_name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("birth_date"));
    }

    #[test]
    fn valid_payload_passes() {
        let mut errors = FieldErrors::new();
        errors.email("email", Some("lea@example.org"));
        assert_eq!(
            errors.date("birth_date", Some("1998-03-21")),
            NaiveDate::from_ymd_opt(1998, 3, 21)
        );
        assert!(errors.finish().is_ok());
        assert_eq!(optional(Some("  ".into())), None);
    }

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        note: Option<Option<String>>,
    }

    #[test]
    fn nullable_distinguishes_null_from_absent() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let cleared: Patch = serde_json::from_str(r#"{"note": null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"note": "x"}"#).unwrap();
        assert_eq!(absent.note, None);
        assert_eq!(cleared.note, Some(None));
        assert_eq!(set.note, Some(Some("x".into())));
    }
}
