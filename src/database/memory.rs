use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::models::formation::{FormationFilter, FormationPatch, NewFormation};
use super::models::inscription::{InscriptionFilter, InscriptionPatch, NewInscription};
use super::models::{Formation, FormationStatus, Inscription, InscriptionStatus};
use super::store::{apply_formation_patch, RegistrationStore, StatusChange, StoreError};

#[derive(Debug, Default)]
struct Tables {
    formations: HashMap<Uuid, Formation>,
    inscriptions: HashMap<Uuid, Inscription>,
}

impl Tables {
    fn formation_mut(&mut self, id: Uuid) -> Result<&mut Formation, StoreError> {
        self.formations
            .get_mut(&id)
            .ok_or_else(|| StoreError::formation_not_found(id))
    }
}

/// In-process `RegistrationStore`. One mutex guards both tables, so each
/// call is atomic exactly like a database transaction would be.
#[derive(Debug, Default)]
pub struct MemoryRegistrationStore {
    tables: Mutex<Tables>,
}

impl MemoryRegistrationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn take_seat(formation: &mut Formation) -> Result<(), StoreError> {
    if formation.available_seats <= 0 {
        return Err(StoreError::NoSeatsAvailable);
    }
    formation.available_seats -= 1;
    formation.updated_at = Utc::now();
    Ok(())
}

fn release_seat(formation: &mut Formation) {
    formation.available_seats = (formation.available_seats + 1).min(formation.total_seats);
    formation.updated_at = Utc::now();
}

/// Nothing is written unless the transition and its seat move both succeed.
fn apply_status(
    tables: &mut Tables,
    current: Inscription,
    status: InscriptionStatus,
) -> Result<StatusChange, StoreError> {
    let previous = current.status;

    if previous == status {
        let formation = tables.formation_mut(current.formation_id)?.clone();
        return Ok(StatusChange {
            previous,
            inscription: current,
            formation,
        });
    }

    if !previous.can_transition_to(status) {
        return Err(StoreError::InvalidTransition { from: previous, to: status });
    }

    let formation = tables.formation_mut(current.formation_id)?;
    match previous.seat_delta(status) {
        delta if delta < 0 => take_seat(formation)?,
        delta if delta > 0 => release_seat(formation),
        _ => {}
    }
    let formation = formation.clone();

    let mut inscription = current;
    inscription.status = status;
    inscription.notified = true;
    inscription.updated_at = Utc::now();
    tables.inscriptions.insert(inscription.id, inscription.clone());

    Ok(StatusChange {
        previous,
        inscription,
        formation,
    })
}

fn apply_patch(inscription: &mut Inscription, patch: InscriptionPatch) {
    if let Some(first_name) = patch.first_name {
        inscription.first_name = first_name;
    }
    if let Some(last_name) = patch.last_name {
        inscription.last_name = last_name;
    }
    if let Some(email) = patch.email {
        inscription.email = email;
    }
    if let Some(phone) = patch.phone {
        inscription.phone = phone;
    }
    if let Some(birth_date) = patch.birth_date {
        inscription.birth_date = birth_date;
    }
    if let Some(message) = patch.message {
        inscription.message = message;
    }
    if let Some(notified) = patch.notified {
        inscription.notified = notified;
    }
    inscription.updated_at = Utc::now();
}

#[async_trait]
impl RegistrationStore for MemoryRegistrationStore {
    async fn list_formations(&self, filter: &FormationFilter) -> Result<Vec<Formation>, StoreError> {
        let tables = self.tables.lock().await;
        let now = Utc::now();
        let mut formations: Vec<Formation> = tables
            .formations
            .values()
            .filter(|f| filter.matches(f, now))
            .cloned()
            .collect();
        formations.sort_by_key(|f| f.date);
        Ok(formations)
    }

    async fn get_formation(&self, id: Uuid) -> Result<Formation, StoreError> {
        let mut tables = self.tables.lock().await;
        tables.formation_mut(id).map(|f| f.clone())
    }

    async fn create_formation(&self, new: NewFormation) -> Result<Formation, StoreError> {
        if new.total_seats < 1 {
            return Err(StoreError::Invalid("total_seats must be at least 1".into()));
        }
        let now = Utc::now();
        let formation = Formation {
            id: Uuid::new_v4(),
            title: new.title,
            formation_type: new.formation_type,
            date: new.date,
            duration: new.duration,
            total_seats: new.total_seats,
            available_seats: new.total_seats,
            price: new.price,
            location: new.location,
            instructor: new.instructor,
            status: new.status,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.formations.insert(formation.id, formation.clone());
        Ok(formation)
    }

    async fn update_formation(&self, id: Uuid, patch: FormationPatch) -> Result<Formation, StoreError> {
        let mut tables = self.tables.lock().await;
        let stored = tables.formation_mut(id)?;

        // Work on a copy so a rejected patch leaves the row untouched.
        let mut formation = stored.clone();
        apply_formation_patch(&mut formation, patch)?;
        formation.updated_at = Utc::now();
        *stored = formation.clone();
        Ok(formation)
    }

    async fn set_formation_status(&self, id: Uuid, status: FormationStatus) -> Result<Formation, StoreError> {
        let mut tables = self.tables.lock().await;
        let formation = tables.formation_mut(id)?;
        formation.status = status;
        formation.updated_at = Utc::now();
        Ok(formation.clone())
    }

    async fn delete_formation(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        tables
            .formations
            .remove(&id)
            .ok_or_else(|| StoreError::formation_not_found(id))?;
        tables.inscriptions.retain(|_, i| i.formation_id != id);
        Ok(())
    }

    async fn list_inscriptions(&self, filter: &InscriptionFilter) -> Result<Vec<Inscription>, StoreError> {
        let tables = self.tables.lock().await;
        let mut inscriptions: Vec<Inscription> = tables
            .inscriptions
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        inscriptions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(inscriptions)
    }

    async fn get_inscription(&self, id: Uuid) -> Result<Inscription, StoreError> {
        let tables = self.tables.lock().await;
        tables
            .inscriptions
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::inscription_not_found(id))
    }

    async fn create_inscription(&self, new: NewInscription) -> Result<(Inscription, Formation), StoreError> {
        let mut tables = self.tables.lock().await;

        let formation = tables.formation_mut(new.formation_id)?;
        take_seat(formation)?;
        let formation = formation.clone();

        let now = Utc::now();
        let inscription = Inscription {
            id: Uuid::new_v4(),
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            phone: new.phone,
            birth_date: new.birth_date,
            message: new.message,
            formation_id: new.formation_id,
            status: InscriptionStatus::Pending,
            notified: false,
            created_at: now,
            updated_at: now,
        };
        tables.inscriptions.insert(inscription.id, inscription.clone());
        Ok((inscription, formation))
    }

    async fn update_inscription(
        &self,
        id: Uuid,
        patch: InscriptionPatch,
        status: Option<InscriptionStatus>,
    ) -> Result<StatusChange, StoreError> {
        let mut tables = self.tables.lock().await;

        let current = tables
            .inscriptions
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::inscription_not_found(id))?;
        let mut change = match status {
            Some(status) => apply_status(&mut tables, current, status)?,
            None => {
                let formation = tables.formation_mut(current.formation_id)?.clone();
                StatusChange {
                    previous: current.status,
                    inscription: current,
                    formation,
                }
            }
        };

        if !patch.is_empty() {
            apply_patch(&mut change.inscription, patch);
            tables.inscriptions.insert(id, change.inscription.clone());
        }
        Ok(change)
    }

    async fn update_inscription_status(
        &self,
        id: Uuid,
        status: InscriptionStatus,
    ) -> Result<StatusChange, StoreError> {
        let mut tables = self.tables.lock().await;

        let current = tables
            .inscriptions
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::inscription_not_found(id))?;
        apply_status(&mut tables, current, status)
    }

    async fn delete_inscription(&self, id: Uuid) -> Result<(Inscription, Formation), StoreError> {
        let mut tables = self.tables.lock().await;

        let inscription = tables
            .inscriptions
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::inscription_not_found(id))?;

        let formation = tables.formation_mut(inscription.formation_id)?;
        if inscription.status == InscriptionStatus::Accepted {
            release_seat(formation);
        }
        let formation = formation.clone();
        tables.inscriptions.remove(&id);

        Ok((inscription, formation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::FormationType;
    use chrono::{Duration, NaiveDate};
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn new_formation(seats: i32) -> NewFormation {
        NewFormation {
            title: "PSC1 samedi".into(),
            formation_type: FormationType::Psc1,
            date: Utc::now() + Duration::days(10),
            duration: "7h".into(),
            total_seats: seats,
            price: Decimal::new(6000, 2),
            location: "Toulon".into(),
            instructor: None,
            status: FormationStatus::Planned,
        }
    }

    fn registrant(formation_id: Uuid) -> NewInscription {
        NewInscription {
            first_name: "Lea".into(),
            last_name: "Martin".into(),
            email: "lea@example.org".into(),
            phone: "0600000000".into(),
            birth_date: NaiveDate::from_ymd_opt(1995, 4, 12).unwrap(),
            message: None,
            formation_id,
        }
    }

    #[tokio::test]
    async fn create_takes_a_seat() {
        let store = MemoryRegistrationStore::new();
        let formation = store.create_formation(new_formation(3)).await.unwrap();

        let (inscription, after) = store.create_inscription(registrant(formation.id)).await.unwrap();

        assert_eq!(inscription.status, InscriptionStatus::Pending);
        assert_eq!(after.available_seats, 2);
    }

    #[tokio::test]
    async fn full_formation_rejects_without_side_effects() {
        let store = MemoryRegistrationStore::new();
        let formation = store.create_formation(new_formation(1)).await.unwrap();
        store.create_inscription(registrant(formation.id)).await.unwrap();

        let err = store.create_inscription(registrant(formation.id)).await.unwrap_err();

        assert!(matches!(err, StoreError::NoSeatsAvailable));
        let inscriptions = store.list_inscriptions(&InscriptionFilter::default()).await.unwrap();
        assert_eq!(inscriptions.len(), 1);
        assert_eq!(store.get_formation(formation.id).await.unwrap().available_seats, 0);
    }

    #[tokio::test]
    async fn concurrent_creates_for_last_seat() {
        let store = Arc::new(MemoryRegistrationStore::new());
        let formation = store.create_formation(new_formation(10)).await.unwrap();
        // Bring the formation down to a single free seat.
        for _ in 0..9 {
            store.create_inscription(registrant(formation.id)).await.unwrap();
        }

        let a = tokio::spawn({
            let store = store.clone();
            async move { store.create_inscription(registrant(formation.id)).await }
        });
        let b = tokio::spawn({
            let store = store.clone();
            async move { store.create_inscription(registrant(formation.id)).await }
        });
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(StoreError::NoSeatsAvailable))));
        assert_eq!(store.get_formation(formation.id).await.unwrap().available_seats, 0);
    }

    #[tokio::test]
    async fn edit_applies_details_and_status_together() {
        let store = MemoryRegistrationStore::new();
        let formation = store.create_formation(new_formation(3)).await.unwrap();
        let (inscription, _) = store.create_inscription(registrant(formation.id)).await.unwrap();

        let patch = InscriptionPatch {
            email: Some("lea.new@example.org".into()),
            ..Default::default()
        };
        let change = store
            .update_inscription(inscription.id, patch, Some(InscriptionStatus::Accepted))
            .await
            .unwrap();

        assert!(change.changed());
        assert_eq!(change.inscription.email, "lea.new@example.org");
        assert_eq!(change.inscription.status, InscriptionStatus::Accepted);
        assert_eq!(change.formation.available_seats, 1);
        let stored = store.get_inscription(inscription.id).await.unwrap();
        assert_eq!(stored.email, "lea.new@example.org");
        assert_eq!(stored.status, InscriptionStatus::Accepted);
    }

    #[tokio::test]
    async fn rejected_transition_leaves_details_untouched() {
        let store = MemoryRegistrationStore::new();
        let formation = store.create_formation(new_formation(3)).await.unwrap();
        let (inscription, _) = store.create_inscription(registrant(formation.id)).await.unwrap();
        store
            .update_inscription_status(inscription.id, InscriptionStatus::Refused)
            .await
            .unwrap();

        let patch = InscriptionPatch {
            phone: Some("0700000000".into()),
            ..Default::default()
        };
        let err = store
            .update_inscription(inscription.id, patch, Some(InscriptionStatus::Accepted))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::InvalidTransition { .. }));
        let stored = store.get_inscription(inscription.id).await.unwrap();
        assert_eq!(stored.phone, "0600000000");
        assert_eq!(stored.status, InscriptionStatus::Refused);
        assert_eq!(store.get_formation(formation.id).await.unwrap().available_seats, 2);
    }

    #[tokio::test]
    async fn reducing_total_below_reserved_is_rejected() {
        let store = MemoryRegistrationStore::new();
        let formation = store.create_formation(new_formation(2)).await.unwrap();
        store.create_inscription(registrant(formation.id)).await.unwrap();
        store.create_inscription(registrant(formation.id)).await.unwrap();

        let patch = FormationPatch {
            total_seats: Some(1),
            ..Default::default()
        };
        assert!(matches!(
            store.update_formation(formation.id, patch).await,
            Err(StoreError::Invalid(_))
        ));

        let patch = FormationPatch {
            total_seats: Some(5),
            ..Default::default()
        };
        let grown = store.update_formation(formation.id, patch).await.unwrap();
        assert_eq!((grown.total_seats, grown.available_seats), (5, 3));
    }
}
