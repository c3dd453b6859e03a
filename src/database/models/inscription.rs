use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::text_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InscriptionStatus {
    Pending,
    Accepted,
    Refused,
    Cancelled,
}

text_enum!(InscriptionStatus {
    Pending => "PENDING",
    Accepted => "ACCEPTED",
    Refused => "REFUSED",
    Cancelled => "CANCELLED",
});

impl InscriptionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, InscriptionStatus::Refused | InscriptionStatus::Cancelled)
    }

    /// Whether an admin may move an inscription from `self` to `next`.
    /// Re-applying the current status is allowed and changes nothing.
    pub fn can_transition_to(self, next: InscriptionStatus) -> bool {
        use InscriptionStatus::*;

        if self == next {
            return true;
        }
        match self {
            Pending => matches!(next, Accepted | Refused | Cancelled),
            Accepted => matches!(next, Refused | Cancelled),
            Refused | Cancelled => false,
        }
    }

    /// Change to the formation's available seats caused by `self -> next`.
    ///
    /// Registering already took one seat and accepting takes another, so an
    /// ACCEPTED inscription holds two. Leaving ACCEPTED, or deleting while
    /// ACCEPTED, returns one. The seat taken at registration is never given
    /// back: refusing or cancelling a PENDING inscription moves nothing.
    pub fn seat_delta(self, next: InscriptionStatus) -> i32 {
        use InscriptionStatus::*;

        match (self, next) {
            (from, Accepted) if from != Accepted => -1,
            (Accepted, Refused) | (Accepted, Cancelled) => 1,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Inscription {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub birth_date: NaiveDate,
    pub message: Option<String>,
    pub formation_id: Uuid,
    pub status: InscriptionStatus,
    pub notified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Inscription {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Registrant data for a new inscription, already validated.
#[derive(Debug, Clone)]
pub struct NewInscription {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub birth_date: NaiveDate,
    pub message: Option<String>,
    pub formation_id: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct InscriptionPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub message: Option<Option<String>>,
    pub notified: Option<bool>,
}

impl InscriptionPatch {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.birth_date.is_none()
            && self.message.is_none()
            && self.notified.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InscriptionFilter {
    pub formation_id: Option<Uuid>,
    pub status: Option<InscriptionStatus>,
}

impl InscriptionFilter {
    pub fn matches(&self, inscription: &Inscription) -> bool {
        self.formation_id.map_or(true, |id| inscription.formation_id == id)
            && self.status.map_or(true, |s| inscription.status == s)
    }
}
