//! Field-level validation helpers shared by write paths.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Field name to human-readable messages, serialised as the `errors` object.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Default, Clone)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn required(&mut self, field: &str) {
        self.add(field, format!("The {} field is required.", field.replace('_', " ")));
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn finish(self) -> Result<(), FieldErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    /// Parse an optional date field, recording an error when it is malformed.
    pub fn date(&mut self, field: &str, value: Option<&str>) -> Option<DateTime<Utc>> {
        let raw = value.map(str::trim).filter(|v| !v.is_empty())?;
        match parse_date(raw) {
            Some(parsed) => Some(parsed),
            None => {
                self.add(field, format!("The {} is not a valid date.", field.replace('_', " ")));
                None
            }
        }
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` and bare
/// `YYYY-MM-DD` (midnight UTC).
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_common_date_shapes() {
        let bare = parse_date("2025-03-14").unwrap();
        assert_eq!((bare.year(), bare.month(), bare.day(), bare.hour()), (2025, 3, 14, 0));
        assert!(parse_date("2025-03-14 17:30:00").is_some());
        assert!(parse_date("2025-03-14T17:30:00Z").is_some());
        assert!(parse_date("next tuesday").is_none());
    }

    #[test]
    fn validator_collects_messages_per_field() {
        let mut v = Validator::new();
        v.required("status_id");
        assert!(v.date("end_date", Some("soon")).is_none());
        assert!(v.date("start_date", Some("  ")).is_none());
        let errors = v.finish().unwrap_err();
        assert_eq!(errors["status_id"], vec!["The status id field is required."]);
        assert!(errors.contains_key("end_date"));
        assert!(!errors.contains_key("start_date"));
    }

    #[test]
    fn double_option_tracks_explicit_null() {
        #[derive(Deserialize)]
        struct Patch {
            #[serde(default, deserialize_with = "double_option")]
            end_date: Option<Option<String>>,
        }
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.end_date, None);
        let cleared: Patch = serde_json::from_str(r#"{"end_date": null}"#).unwrap();
        assert_eq!(cleared.end_date, Some(None));
    }
}
