//! Formation payloads: validation from loose JSON into store values.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::database::models::formation::{FormationPatch, NewFormation};
use crate::database::models::{FormationStatus, FormationType};
use crate::error::ApiError;
use crate::services::validation::{nullable, optional, FieldErrors};

/// RFC 3339 timestamp, or a bare `YYYY-MM-DD` taken as midnight UTC.
pub fn parse_session_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

fn check_seats(errors: &mut FieldErrors, total: i32) {
    if total < 1 {
        errors.add("total_seats", "Must be at least 1");
    }
}

fn check_price(errors: &mut FieldErrors, price: Decimal) {
    if price.is_sign_negative() {
        errors.add("price", "Must not be negative");
    }
}

fn session_date(errors: &mut FieldErrors, raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = errors.required("date", raw);
    if raw.is_empty() {
        return None;
    }
    let date = parse_session_date(&raw);
    if date.is_none() {
        errors.add("date", "Invalid date");
    }
    date
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormationInput {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub formation_type: Option<FormationType>,
    pub date: Option<String>,
    pub duration: Option<String>,
    pub total_seats: Option<i32>,
    pub price: Option<Decimal>,
    pub location: Option<String>,
    pub instructor: Option<String>,
    pub status: Option<FormationStatus>,
}

impl FormationInput {
    pub fn validate(self) -> Result<NewFormation, ApiError> {
        let mut errors = FieldErrors::new();
        let title = errors.required("title", self.title.as_deref());
        let duration = errors.required("duration", self.duration.as_deref());
        let location = errors.required("location", self.location.as_deref());
        let date = session_date(&mut errors, self.date.as_deref());

        if self.formation_type.is_none() {
            errors.add("type", "This field is required");
        }
        match self.total_seats {
            Some(total) => check_seats(&mut errors, total),
            None => errors.add("total_seats", "This field is required"),
        }
        let price = self.price.unwrap_or(Decimal::ZERO);
        check_price(&mut errors, price);
        errors.finish()?;

        match (self.formation_type, date, self.total_seats) {
            (Some(formation_type), Some(date), Some(total_seats)) => Ok(NewFormation {
                title,
                formation_type,
                date,
                duration,
                total_seats,
                price,
                location,
                instructor: optional(self.instructor),
                status: self.status.unwrap_or(FormationStatus::Planned),
            }),
            _ => Err(ApiError::bad_request("Invalid formation payload")),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormationUpdate {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub formation_type: Option<FormationType>,
    pub date: Option<String>,
    pub duration: Option<String>,
    pub total_seats: Option<i32>,
    pub price: Option<Decimal>,
    pub location: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub instructor: Option<Option<String>>,
    pub status: Option<FormationStatus>,
}

impl FormationUpdate {
    pub fn validate(self) -> Result<FormationPatch, ApiError> {
        let mut errors = FieldErrors::new();
        let mut text = |field: &str, value: Option<String>| {
            value.map(|v| errors.required(field, Some(&v)))
        };
        let title = text("title", self.title);
        let duration = text("duration", self.duration);
        let location = text("location", self.location);

        let date = match self.date.as_deref() {
            Some(raw) => session_date(&mut errors, Some(raw)),
            None => None,
        };
        if let Some(total) = self.total_seats {
            check_seats(&mut errors, total);
        }
        if let Some(price) = self.price {
            check_price(&mut errors, price);
        }
        errors.finish()?;

        Ok(FormationPatch {
            title,
            formation_type: self.formation_type,
            date,
            duration,
            total_seats: self.total_seats,
            price: self.price,
            location,
            instructor: self.instructor.map(optional),
            status: self.status,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormationStatusUpdate {
    pub status: FormationStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_dates() {
        assert_eq!(
            parse_session_date("2025-09-20").unwrap().to_rfc3339(),
            "2025-09-20T00:00:00+00:00"
        );
        assert_eq!(
            parse_session_date("2025-09-20T09:30:00+02:00").unwrap().to_rfc3339(),
            "2025-09-20T07:30:00+00:00"
        );
        assert!(parse_session_date("20/09/2025").is_none());
    }

    #[test]
    fn new_formation_defaults() {
        let input: FormationInput = serde_json::from_value(json!({
            "title": "PSC1",
            "type": "PSC1",
            "date": "2025-09-20",
            "duration": "7h",
            "total_seats": 12,
            "location": "Hyères",
            "instructor": "  "
        }))
        .unwrap();

        let new = input.validate().unwrap();
        assert_eq!(new.total_seats, 12);
        assert_eq!(new.price, Decimal::ZERO);
        assert_eq!(new.status, FormationStatus::Planned);
        assert_eq!(new.instructor, None);
    }

    #[test]
    fn seat_and_price_bounds() {
        let input: FormationInput = serde_json::from_value(json!({
            "title": "PSE1",
            "type": "PSE1",
            "date": "2025-09-20",
            "duration": "35h",
            "total_seats": 0,
            "price": -5,
            "location": "Toulon"
        }))
        .unwrap();

        let body = input.validate().unwrap_err().to_json();
        let fields = body["field_errors"].as_object().unwrap();
        assert!(fields.contains_key("total_seats"));
        assert!(fields.contains_key("price"));
    }

    #[test]
    fn update_keeps_absent_fields_untouched() {
        let update: FormationUpdate = serde_json::from_value(json!({
            "total_seats": 20,
            "instructor": null
        }))
        .unwrap();

        let patch = update.validate().unwrap();
        assert_eq!(patch.total_seats, Some(20));
        assert_eq!(patch.instructor, Some(None));
        assert!(patch.title.is_none());
        assert!(patch.date.is_none());

        let blank: FormationUpdate = serde_json::from_value(json!({ "title": " " })).unwrap();
        assert!(blank.validate().is_err());
    }
}
