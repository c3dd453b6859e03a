//! Registration workflow: seat accounting first, notifications second.
//!
//! Each operation commits its data change through the [`RegistrationStore`]
//! as one atomic unit, then dispatches emails through the [`Notifier`].
//! Notification outcomes are logged by the notifier and never change the
//! result of the operation.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::database::models::inscription::{InscriptionFilter, InscriptionPatch, NewInscription};
use crate::database::models::{Formation, Inscription, InscriptionStatus};
use crate::database::{RegistrationStore, StoreError};
use crate::error::ApiError;
use crate::services::notifications::Notifier;
use crate::services::validation::{nullable, optional, FieldErrors};

#[derive(Debug, Clone, Serialize)]
pub struct InscriptionDetails {
    #[serde(flatten)]
    pub inscription: Inscription,
    pub formation: Formation,
}

#[derive(Clone)]
pub struct InscriptionService {
    store: Arc<dyn RegistrationStore>,
    notifier: Notifier,
}

impl InscriptionService {
    pub fn new(store: Arc<dyn RegistrationStore>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    /// Reserve a seat and record a PENDING inscription, then notify the
    /// registrant and the admin address.
    pub async fn create(&self, new: NewInscription) -> Result<Inscription, StoreError> {
        let (inscription, formation) = self.store.create_inscription(new).await?;
        info!(
            inscription = %inscription.id,
            formation = %formation.id,
            available_seats = formation.available_seats,
            "inscription created"
        );

        self.notifier.inscription_received(&inscription, &formation).await;
        Ok(inscription)
    }

    pub async fn list(&self, filter: &InscriptionFilter) -> Result<Vec<Inscription>, StoreError> {
        self.store.list_inscriptions(filter).await
    }

    pub async fn get(&self, id: Uuid) -> Result<InscriptionDetails, StoreError> {
        let inscription = self.store.get_inscription(id).await?;
        let formation = self.store.get_formation(inscription.formation_id).await?;
        Ok(InscriptionDetails { inscription, formation })
    }

    /// Move an inscription to `status`. Re-applying the current status is a
    /// no-op and sends nothing.
    pub async fn update_status(&self, id: Uuid, status: InscriptionStatus) -> Result<Inscription, StoreError> {
        let change = self.store.update_inscription_status(id, status).await?;
        if !change.changed() {
            return Ok(change.inscription);
        }

        info!(
            inscription = %id,
            from = %change.previous,
            to = %change.inscription.status,
            available_seats = change.formation.available_seats,
            "inscription status changed"
        );

        self.notifier.status_changed(&change.inscription, &change.formation).await;
        Ok(change.inscription)
    }

    /// Edit registrant details and optionally the status in one store unit.
    /// The status email goes out after the write, to the stored address.
    pub async fn update(
        &self,
        id: Uuid,
        patch: InscriptionPatch,
        status: Option<InscriptionStatus>,
    ) -> Result<Inscription, StoreError> {
        let change = self.store.update_inscription(id, patch, status).await?;
        if change.changed() {
            info!(
                inscription = %id,
                from = %change.previous,
                to = %change.inscription.status,
                available_seats = change.formation.available_seats,
                "inscription status changed"
            );
            self.notifier.status_changed(&change.inscription, &change.formation).await;
        }
        Ok(change.inscription)
    }

    /// Delete an inscription, returning its seat when it held one, then
    /// tell the registrant.
    pub async fn remove(&self, id: Uuid) -> Result<Inscription, StoreError> {
        let (inscription, formation) = self.store.delete_inscription(id).await?;
        info!(
            inscription = %id,
            status = %inscription.status,
            available_seats = formation.available_seats,
            "inscription deleted"
        );

        self.notifier.inscription_removed(&inscription, &formation).await;
        Ok(inscription)
    }
}

/// Public registration form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InscriptionInput {
    pub formation_id: Option<Uuid>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<String>,
    pub message: Option<String>,
}

impl InscriptionInput {
    pub fn validate(self) -> Result<NewInscription, ApiError> {
        let mut errors = FieldErrors::new();
        let first_name = errors.required("first_name", self.first_name.as_deref());
        let last_name = errors.required("last_name", self.last_name.as_deref());
        let email = errors.email("email", self.email.as_deref());
        let phone = errors.required("phone", self.phone.as_deref());
        let birth_date = errors.date("birth_date", self.birth_date.as_deref());
        if self.formation_id.is_none() {
            errors.add("formation_id", "This field is required");
        }
        errors.finish()?;

        match (self.formation_id, birth_date) {
            (Some(formation_id), Some(birth_date)) => Ok(NewInscription {
                first_name,
                last_name,
                email,
                phone,
                birth_date,
                message: optional(self.message),
                formation_id,
            }),
            _ => Err(ApiError::bad_request("Invalid inscription payload")),
        }
    }
}

/// Admin edit: registrant fields, `notified`, and optionally a new status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InscriptionUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub message: Option<Option<String>>,
    pub notified: Option<bool>,
    pub status: Option<InscriptionStatus>,
}

impl InscriptionUpdate {
    pub fn validate(self) -> Result<(InscriptionPatch, Option<InscriptionStatus>), ApiError> {
        let mut errors = FieldErrors::new();
        let first_name = self.first_name.map(|v| errors.required("first_name", Some(&v)));
        let last_name = self.last_name.map(|v| errors.required("last_name", Some(&v)));
        let email = self.email.map(|v| errors.email("email", Some(&v)));
        let phone = self.phone.map(|v| errors.required("phone", Some(&v)));
        let birth_date = match self.birth_date.as_deref() {
            Some(raw) => errors.date("birth_date", Some(raw)),
            None => None,
        };
        errors.finish()?;

        let patch = InscriptionPatch {
            first_name,
            last_name,
            email,
            phone,
            birth_date,
            message: self.message.map(optional),
            notified: self.notified,
        };
        Ok((patch, self.status))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: InscriptionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryRegistrationStore;
    use crate::testing::{sample_formation, sample_registrant, RecordingMailer, TEST_ADMIN_EMAIL};

    struct Fixture {
        service: InscriptionService,
        store: Arc<MemoryRegistrationStore>,
        mailer: Arc<RecordingMailer>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryRegistrationStore::new());
        let mailer = Arc::new(RecordingMailer::new());
        let notifier = Notifier::new(mailer.clone(), "Test", Some(TEST_ADMIN_EMAIL.into()));
        Fixture {
            service: InscriptionService::new(store.clone(), notifier),
            store,
            mailer,
        }
    }

    async fn seats(store: &MemoryRegistrationStore, id: Uuid) -> i32 {
        store.get_formation(id).await.unwrap().available_seats
    }

    #[tokio::test]
    async fn create_notifies_registrant_and_admin() {
        let f = fixture();
        let formation = f.store.create_formation(sample_formation(10)).await.unwrap();

        let inscription = f.service.create(sample_registrant(formation.id)).await.unwrap();

        assert_eq!(inscription.status, InscriptionStatus::Pending);
        assert!(!inscription.notified);
        assert_eq!(seats(&f.store, formation.id).await, 9);
        assert_eq!(f.mailer.sent_to(&inscription.email).len(), 1);
        assert_eq!(f.mailer.sent_to(TEST_ADMIN_EMAIL).len(), 1);
    }

    #[tokio::test]
    async fn mail_failure_does_not_undo_the_registration() {
        let f = fixture();
        f.mailer.set_failing(true);
        let formation = f.store.create_formation(sample_formation(2)).await.unwrap();

        let inscription = f.service.create(sample_registrant(formation.id)).await.unwrap();

        assert!(f.store.get_inscription(inscription.id).await.is_ok());
        assert_eq!(seats(&f.store, formation.id).await, 1);
    }

    #[tokio::test]
    async fn accept_twice_decrements_once() {
        let f = fixture();
        let formation = f.store.create_formation(sample_formation(10)).await.unwrap();
        let inscription = f.service.create(sample_registrant(formation.id)).await.unwrap();
        assert_eq!(seats(&f.store, formation.id).await, 9);
        f.mailer.clear();

        let accepted = f.service.update_status(inscription.id, InscriptionStatus::Accepted).await.unwrap();
        assert_eq!(accepted.status, InscriptionStatus::Accepted);
        assert!(accepted.notified);
        assert_eq!(seats(&f.store, formation.id).await, 8);
        assert_eq!(f.mailer.sent().len(), 1);

        f.service.update_status(inscription.id, InscriptionStatus::Accepted).await.unwrap();
        assert_eq!(seats(&f.store, formation.id).await, 8);
        assert_eq!(f.mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn refusing_an_accepted_inscription_gives_the_seat_back() {
        let f = fixture();
        let formation = f.store.create_formation(sample_formation(10)).await.unwrap();
        let inscription = f.service.create(sample_registrant(formation.id)).await.unwrap();
        f.service.update_status(inscription.id, InscriptionStatus::Accepted).await.unwrap();

        f.service.update_status(inscription.id, InscriptionStatus::Refused).await.unwrap();

        assert_eq!(seats(&f.store, formation.id).await, 9);
    }

    #[tokio::test]
    async fn terminal_states_reject_transitions() {
        let f = fixture();
        let formation = f.store.create_formation(sample_formation(10)).await.unwrap();
        let inscription = f.service.create(sample_registrant(formation.id)).await.unwrap();
        f.service.update_status(inscription.id, InscriptionStatus::Cancelled).await.unwrap();

        let err = f
            .service
            .update_status(inscription.id, InscriptionStatus::Accepted)
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::InvalidTransition { .. }));
        assert_eq!(seats(&f.store, formation.id).await, 9);
    }

    #[tokio::test]
    async fn accepting_without_free_seat_fails_cleanly() {
        let f = fixture();
        let formation = f.store.create_formation(sample_formation(1)).await.unwrap();
        let inscription = f.service.create(sample_registrant(formation.id)).await.unwrap();
        assert_eq!(seats(&f.store, formation.id).await, 0);

        let err = f
            .service
            .update_status(inscription.id, InscriptionStatus::Accepted)
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::NoSeatsAvailable));
        let stored = f.store.get_inscription(inscription.id).await.unwrap();
        assert_eq!(stored.status, InscriptionStatus::Pending);
        assert_eq!(seats(&f.store, formation.id).await, 0);
    }

    #[tokio::test]
    async fn removing_an_accepted_inscription_restores_one_seat() {
        let f = fixture();
        let formation = f.store.create_formation(sample_formation(10)).await.unwrap();
        let inscription = f.service.create(sample_registrant(formation.id)).await.unwrap();
        f.service.update_status(inscription.id, InscriptionStatus::Accepted).await.unwrap();
        let before = seats(&f.store, formation.id).await;
        f.mailer.clear();

        f.service.remove(inscription.id).await.unwrap();

        assert_eq!(seats(&f.store, formation.id).await, before + 1);
        assert!(matches!(
            f.store.get_inscription(inscription.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(f.mailer.sent_to(&inscription.email).len(), 1);
    }

    #[tokio::test]
    async fn removing_a_pending_inscription_still_sends_the_cancellation() {
        let f = fixture();
        let formation = f.store.create_formation(sample_formation(10)).await.unwrap();
        let inscription = f.service.create(sample_registrant(formation.id)).await.unwrap();
        f.mailer.clear();

        f.service.remove(inscription.id).await.unwrap();

        assert_eq!(seats(&f.store, formation.id).await, 9);
        assert_eq!(f.mailer.sent_to(&inscription.email).len(), 1);
    }

    #[tokio::test]
    async fn update_applies_status_and_details() {
        let f = fixture();
        let formation = f.store.create_formation(sample_formation(10)).await.unwrap();
        let inscription = f.service.create(sample_registrant(formation.id)).await.unwrap();

        let patch = InscriptionPatch {
            phone: Some("0700000000".into()),
            ..Default::default()
        };
        let updated = f
            .service
            .update(inscription.id, patch, Some(InscriptionStatus::Accepted))
            .await
            .unwrap();

        assert_eq!(updated.phone, "0700000000");
        assert_eq!(updated.status, InscriptionStatus::Accepted);
        assert_eq!(seats(&f.store, formation.id).await, 8);
    }

    #[tokio::test]
    async fn registration_seat_is_never_returned() {
        let f = fixture();
        let formation = f.store.create_formation(sample_formation(10)).await.unwrap();

        let accepted = f.service.create(sample_registrant(formation.id)).await.unwrap();
        f.service.update_status(accepted.id, InscriptionStatus::Accepted).await.unwrap();
        assert_eq!(seats(&f.store, formation.id).await, 8);
        f.service.update_status(accepted.id, InscriptionStatus::Cancelled).await.unwrap();
        assert_eq!(seats(&f.store, formation.id).await, 9);
        f.service.remove(accepted.id).await.unwrap();
        assert_eq!(seats(&f.store, formation.id).await, 9);

        let refused = f.service.create(sample_registrant(formation.id)).await.unwrap();
        f.service.update_status(refused.id, InscriptionStatus::Refused).await.unwrap();
        assert_eq!(seats(&f.store, formation.id).await, 8);
    }

    #[tokio::test]
    async fn status_mail_follows_an_email_change_in_the_same_edit() {
        let f = fixture();
        let formation = f.store.create_formation(sample_formation(10)).await.unwrap();
        let inscription = f.service.create(sample_registrant(formation.id)).await.unwrap();
        f.mailer.clear();

        let patch = InscriptionPatch {
            email: Some("lea.new@example.org".into()),
            ..Default::default()
        };
        f.service
            .update(inscription.id, patch, Some(InscriptionStatus::Accepted))
            .await
            .unwrap();

        assert_eq!(f.mailer.sent_to("lea.new@example.org").len(), 1);
        assert!(f.mailer.sent_to(&inscription.email).is_empty());
    }

    #[test]
    fn registration_form_is_validated_field_by_field() {
        let input: InscriptionInput = serde_json::from_value(serde_json::json!({
            "first_name": "Léa",
            "email": "lea@",
            "birth_date": "12/04/2008"
        }))
        .unwrap();

        let body = input.validate().unwrap_err().to_json();
        let fields = body["field_errors"].as_object().unwrap();
        for field in ["last_name", "email", "phone", "birth_date", "formation_id"] {
            assert!(fields.contains_key(field), "missing error for {}", field);
        }
        assert!(!fields.contains_key("first_name"));
    }

    #[test]
    fn admin_update_splits_status_from_details() {
        let update: InscriptionUpdate = serde_json::from_value(serde_json::json!({
            "status": "REFUSED",
            "message": null,
            "notified": true
        }))
        .unwrap();

        let (patch, status) = update.validate().unwrap();
        assert_eq!(status, Some(InscriptionStatus::Refused));
        assert_eq!(patch.message, Some(None));
        assert_eq!(patch.notified, Some(true));
        assert!(patch.first_name.is_none());
    }
}
