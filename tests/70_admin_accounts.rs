//! Account rules against a real PostgreSQL. Runs only when `DATABASE_URL`
//! points at a disposable database.

mod common;

use anyhow::Result;

use common::unique_email;
use secourisme_api::database::models::Role;
use secourisme_api::services::users::{AdminUpdate, NewAdmin, UserService};

fn new_admin(email: &str, role: Role) -> NewAdmin {
    NewAdmin {
        email: email.to_string(),
        password: "correct horse".into(),
        first_name: "Camille".into(),
        last_name: "Durand".into(),
        role: Some(role),
    }
}

#[tokio::test]
async fn admins_never_see_super_admins() -> Result<()> {
    let Some(pool) = common::database().await? else {
        return Ok(());
    };
    let users = UserService::new(pool);
    let admin = users.create(None, new_admin(&unique_email("admin"), Role::Admin)).await?;
    let root = users.create(None, new_admin(&unique_email("root"), Role::SuperAdmin)).await?;

    let visible = users.list(Role::Admin).await?;
    assert!(visible.iter().all(|a| a.role == Role::Admin));
    assert!(visible.iter().any(|a| a.id == admin.id));

    let err = users.get(Role::Admin, root.id).await.unwrap_err();
    assert_eq!(err.status_code(), 403);
    let err = users.delete(Role::Admin, root.id).await.unwrap_err();
    assert_eq!(err.status_code(), 403);
    assert_eq!(users.get(Role::SuperAdmin, root.id).await?.id, root.id);

    // Only a SUPER_ADMIN may hand out the role.
    let promote = AdminUpdate {
        role: Some(Role::SuperAdmin),
        ..Default::default()
    };
    let err = users.update(Role::Admin, admin.id, promote).await.unwrap_err();
    assert_eq!(err.status_code(), 403);
    let err = users
        .create(Some(Role::Admin), new_admin(&unique_email("sneaky"), Role::SuperAdmin))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);

    users.delete(Role::SuperAdmin, admin.id).await?;
    Ok(())
}

#[tokio::test]
async fn duplicate_emails_conflict() -> Result<()> {
    let Some(pool) = common::database().await? else {
        return Ok(());
    };
    let users = UserService::new(pool);
    let taken = unique_email("taken");
    let first = users.create(None, new_admin(&taken, Role::Admin)).await?;

    // Same address, different case.
    let err = users
        .create(None, new_admin(&taken.to_uppercase(), Role::Admin))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 409);

    let second = users.create(None, new_admin(&unique_email("other"), Role::Admin)).await?;
    let update = AdminUpdate {
        email: Some(taken.clone()),
        ..Default::default()
    };
    let err = users.update(Role::Admin, second.id, update).await.unwrap_err();
    assert_eq!(err.status_code(), 409);

    let authenticated = users.authenticate(&taken, "correct horse").await?;
    assert_eq!(authenticated.id, first.id);

    users.delete(Role::SuperAdmin, first.id).await?;
    users.delete(Role::SuperAdmin, second.id).await?;
    Ok(())
}
