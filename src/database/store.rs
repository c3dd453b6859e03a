use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::models::formation::{FormationFilter, FormationPatch, NewFormation};
use super::models::inscription::{InscriptionFilter, InscriptionPatch, NewInscription};
use super::models::{Formation, FormationStatus, Inscription, InscriptionStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("no seats available")]
    NoSeatsAvailable,

    #[error("cannot move inscription from {from} to {to}")]
    InvalidTransition {
        from: InscriptionStatus,
        to: InscriptionStatus,
    },

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn formation_not_found(id: Uuid) -> Self {
        StoreError::NotFound(format!("Formation {} not found", id))
    }

    pub fn inscription_not_found(id: Uuid) -> Self {
        StoreError::NotFound(format!("Inscription {} not found", id))
    }
}

/// Outcome of a status update. `previous == inscription.status` means nothing changed.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub previous: InscriptionStatus,
    pub inscription: Inscription,
    pub formation: Formation,
}

impl StatusChange {
    pub fn changed(&self) -> bool {
        self.previous != self.inscription.status
    }
}

/// Apply a formation patch in place, keeping the seat invariant.
pub(crate) fn apply_formation_patch(formation: &mut Formation, patch: FormationPatch) -> Result<(), StoreError> {
    if let Some(total) = patch.total_seats {
        if total < 1 {
            return Err(StoreError::Invalid("total_seats must be at least 1".into()));
        }
        let available = formation.available_seats + (total - formation.total_seats);
        if available < 0 {
            return Err(StoreError::Invalid(format!(
                "total_seats cannot be lower than the {} seats already reserved",
                formation.reserved_seats()
            )));
        }
        formation.total_seats = total;
        formation.available_seats = available;
    }
    if let Some(title) = patch.title {
        formation.title = title;
    }
    if let Some(formation_type) = patch.formation_type {
        formation.formation_type = formation_type;
    }
    if let Some(date) = patch.date {
        formation.date = date;
    }
    if let Some(duration) = patch.duration {
        formation.duration = duration;
    }
    if let Some(price) = patch.price {
        formation.price = price;
    }
    if let Some(location) = patch.location {
        formation.location = location;
    }
    if let Some(instructor) = patch.instructor {
        formation.instructor = instructor;
    }
    if let Some(status) = patch.status {
        formation.status = status;
    }
    Ok(())
}

/// Persistence for formations and their inscriptions.
///
/// Every method that touches seats is one atomic unit: the seat counter and
/// the inscription row change together or not at all, and seat checks are
/// never a separate read followed by a write.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    async fn list_formations(&self, filter: &FormationFilter) -> Result<Vec<Formation>, StoreError>;

    async fn get_formation(&self, id: Uuid) -> Result<Formation, StoreError>;

    async fn create_formation(&self, new: NewFormation) -> Result<Formation, StoreError>;

    /// Changing `total_seats` shifts `available_seats` by the same amount.
    async fn update_formation(&self, id: Uuid, patch: FormationPatch) -> Result<Formation, StoreError>;

    async fn set_formation_status(&self, id: Uuid, status: FormationStatus) -> Result<Formation, StoreError>;

    /// Removes the formation together with its inscriptions.
    async fn delete_formation(&self, id: Uuid) -> Result<(), StoreError>;

    /// Newest first.
    async fn list_inscriptions(&self, filter: &InscriptionFilter) -> Result<Vec<Inscription>, StoreError>;

    async fn get_inscription(&self, id: Uuid) -> Result<Inscription, StoreError>;

    /// Takes one seat and inserts a PENDING inscription.
    async fn create_inscription(&self, new: NewInscription) -> Result<(Inscription, Formation), StoreError>;

    /// Edits registrant details and, when `status` is given, runs the status
    /// machine in the same unit. A rejected transition leaves the details untouched.
    async fn update_inscription(
        &self,
        id: Uuid,
        patch: InscriptionPatch,
        status: Option<InscriptionStatus>,
    ) -> Result<StatusChange, StoreError>;

    /// Applies the status machine and seat delta, marking the inscription notified.
    async fn update_inscription_status(
        &self,
        id: Uuid,
        status: InscriptionStatus,
    ) -> Result<StatusChange, StoreError>;

    /// Deletes the inscription, giving its seat back when it was ACCEPTED.
    async fn delete_inscription(&self, id: Uuid) -> Result<(Inscription, Formation), StoreError>;
}
