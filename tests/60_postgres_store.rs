//! Seat accounting against a real PostgreSQL. Runs only when
//! `DATABASE_URL` points at a disposable database.

mod common;

use std::sync::Arc;

use anyhow::Result;

use secourisme_api::database::models::inscription::InscriptionPatch;
use secourisme_api::database::models::InscriptionStatus;
use secourisme_api::database::{PgRegistrationStore, RegistrationStore, StoreError};
use secourisme_api::testing::{sample_formation, sample_registrant};

async fn store() -> Result<Option<PgRegistrationStore>> {
    Ok(common::database().await?.map(PgRegistrationStore::new))
}

#[tokio::test]
async fn seats_follow_the_workflow() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };

    let formation = store.create_formation(sample_formation(2)).await?;
    let (inscription, formation_after) = store.create_inscription(sample_registrant(formation.id)).await?;
    assert_eq!(formation_after.available_seats, 1);

    let change = store
        .update_inscription_status(inscription.id, InscriptionStatus::Accepted)
        .await?;
    assert!(change.changed());
    assert!(change.inscription.notified);
    assert_eq!(change.formation.available_seats, 0);

    let again = store
        .update_inscription_status(inscription.id, InscriptionStatus::Accepted)
        .await?;
    assert!(!again.changed());
    assert_eq!(again.formation.available_seats, 0);

    let full = store.create_inscription(sample_registrant(formation.id)).await;
    assert!(matches!(full, Err(StoreError::NoSeatsAvailable)));

    let (_, formation_after) = store.delete_inscription(inscription.id).await?;
    assert_eq!(formation_after.available_seats, 1);

    store.delete_formation(formation.id).await?;
    Ok(())
}

#[tokio::test]
async fn concurrent_creates_take_one_seat() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let store = Arc::new(store);
    let formation_id = store.create_formation(sample_formation(1)).await?.id;

    let a = {
        let store = store.clone();
        tokio::spawn(async move { store.create_inscription(sample_registrant(formation_id)).await })
    };
    let b = {
        let store = store.clone();
        tokio::spawn(async move { store.create_inscription(sample_registrant(formation_id)).await })
    };
    let results = [a.await?, b.await?];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(StoreError::NoSeatsAvailable))));
    assert_eq!(store.get_formation(formation_id).await?.available_seats, 0);

    store.delete_formation(formation_id).await?;
    Ok(())
}

#[tokio::test]
async fn edit_commits_details_and_status_together() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let formation = store.create_formation(sample_formation(3)).await?;
    let (inscription, _) = store.create_inscription(sample_registrant(formation.id)).await?;

    let patch = InscriptionPatch {
        email: Some("lea.new@example.org".into()),
        ..Default::default()
    };
    let change = store
        .update_inscription(inscription.id, patch, Some(InscriptionStatus::Accepted))
        .await?;
    assert!(change.changed());
    assert_eq!(change.inscription.email, "lea.new@example.org");
    assert_eq!(change.formation.available_seats, 1);

    // PENDING is not reachable from ACCEPTED: the phone change is rolled back with it.
    let patch = InscriptionPatch {
        phone: Some("0700000000".into()),
        ..Default::default()
    };
    let err = store
        .update_inscription(inscription.id, patch, Some(InscriptionStatus::Pending))
        .await;
    assert!(matches!(err, Err(StoreError::InvalidTransition { .. })));
    let stored = store.get_inscription(inscription.id).await?;
    assert_eq!(stored.phone, inscription.phone);
    assert_eq!(stored.status, InscriptionStatus::Accepted);

    store.delete_formation(formation.id).await?;
    Ok(())
}
