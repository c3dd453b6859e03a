use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::text_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormationType {
    Psc1,
    Pse1,
    Pse2,
    Bnssa,
    Ssa,
    Sst,
    Bsb,
    Gqs,
    Trainer,
    Refresher,
    BoatLicense,
    Other,
}

text_enum!(FormationType {
    Psc1 => "PSC1",
    Pse1 => "PSE1",
    Pse2 => "PSE2",
    Bnssa => "BNSSA",
    Ssa => "SSA",
    Sst => "SST",
    Bsb => "BSB",
    Gqs => "GQS",
    Trainer => "TRAINER",
    Refresher => "REFRESHER",
    BoatLicense => "BOAT_LICENSE",
    Other => "OTHER",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormationStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

text_enum!(FormationStatus {
    Planned => "PLANNED",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Formation {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub formation_type: FormationType,
    pub date: DateTime<Utc>,
    pub duration: String,
    pub total_seats: i32,
    pub available_seats: i32,
    pub price: Decimal,
    pub location: String,
    pub instructor: Option<String>,
    pub status: FormationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Formation {
    /// Seats currently held by inscriptions.
    pub fn reserved_seats(&self) -> i32 {
        self.total_seats - self.available_seats
    }

    pub fn seats_within_bounds(&self) -> bool {
        (0..=self.total_seats).contains(&self.available_seats)
    }
}

/// Values for a new formation; available seats start at the total.
#[derive(Debug, Clone)]
pub struct NewFormation {
    pub title: String,
    pub formation_type: FormationType,
    pub date: DateTime<Utc>,
    pub duration: String,
    pub total_seats: i32,
    pub price: Decimal,
    pub location: String,
    pub instructor: Option<String>,
    pub status: FormationStatus,
}

#[derive(Debug, Clone, Default)]
pub struct FormationPatch {
    pub title: Option<String>,
    pub formation_type: Option<FormationType>,
    pub date: Option<DateTime<Utc>>,
    pub duration: Option<String>,
    pub total_seats: Option<i32>,
    pub price: Option<Decimal>,
    pub location: Option<String>,
    pub instructor: Option<Option<String>>,
    pub status: Option<FormationStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormationFilter {
    #[serde(rename = "type")]
    pub formation_type: Option<FormationType>,
    pub status: Option<FormationStatus>,
    /// Only sessions dated from now on.
    #[serde(default)]
    pub upcoming: bool,
}

impl FormationFilter {
    pub fn matches(&self, formation: &Formation, now: DateTime<Utc>) -> bool {
        self.formation_type.map_or(true, |t| formation.formation_type == t)
            && self.status.map_or(true, |s| formation.status == s)
            && (!self.upcoming || formation.date >= now)
    }
}
