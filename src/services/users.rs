//! Admin accounts and the rules about who may touch whom.

use chrono::Utc;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::auth::password::{ensure_strength, hash_password, verify_password};
use crate::database::models::{Admin, AdminProfile, Role};
use crate::error::ApiError;
use crate::services::mailer::is_valid_address;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

const PROFILE_COLUMNS: &str = "id, email, first_name, last_name, role, avatar, created_at, updated_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewAdmin {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminUpdate {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub password: Option<String>,
}

/// An ADMIN never sees or changes a SUPER_ADMIN account.
pub fn ensure_can_manage(actor: Role, target: Role) -> Result<(), ApiError> {
    if actor != Role::SuperAdmin && target == Role::SuperAdmin {
        return Err(ApiError::forbidden("You are not allowed to manage a super administrator"));
    }
    Ok(())
}

/// Only a SUPER_ADMIN hands out SUPER_ADMIN.
pub fn ensure_can_grant(actor: Role, role: Role) -> Result<(), ApiError> {
    if role == Role::SuperAdmin && actor != Role::SuperAdmin {
        return Err(ApiError::forbidden("Only a super administrator can grant the super administrator role"));
    }
    Ok(())
}

fn normalize_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_lowercase();
    if !is_valid_address(&email) {
        return Err(ApiError::invalid_field("email", "Invalid email address"));
    }
    Ok(email)
}

fn required(field: &str, value: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::invalid_field(field, "This field is required"));
    }
    Ok(value.to_string())
}

/// Locks every SUPER_ADMIN row for the rest of the transaction and returns
/// how many there are. Concurrent demotions and deletions queue up here.
async fn lock_super_admins(conn: &mut PgConnection) -> Result<usize, ApiError> {
    let ids: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM admins WHERE role = $1 ORDER BY id FOR UPDATE")
        .bind(Role::SuperAdmin)
        .fetch_all(conn)
        .await?;
    Ok(ids.len())
}

async fn fetch_admin(conn: &mut PgConnection, id: Uuid) -> Result<Admin, ApiError> {
    sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Administrator {} not found", id)))
}

async fn save_admin(conn: &mut PgConnection, admin: &Admin) -> Result<AdminProfile, ApiError> {
    Ok(sqlx::query_as::<_, AdminProfile>(&format!(
        "UPDATE admins
         SET email = $2, password_hash = $3, first_name = $4, last_name = $5,
             role = $6, avatar = $7, updated_at = $8
         WHERE id = $1
         RETURNING {PROFILE_COLUMNS}"
    ))
    .bind(admin.id)
    .bind(&admin.email)
    .bind(&admin.password_hash)
    .bind(&admin.first_name)
    .bind(&admin.last_name)
    .bind(admin.role)
    .bind(&admin.avatar)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?)
}

#[derive(Clone)]
pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Admin>, ApiError> {
        Ok(sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find(&self, id: Uuid) -> Result<Admin, ApiError> {
        sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Administrator {} not found", id)))
    }

    /// Same error for unknown email and wrong password.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Admin, ApiError> {
        let email = email.trim().to_lowercase();
        let admin = self
            .find_by_email(&email)
            .await?
            .ok_or_else(|| ApiError::unauthorized(INVALID_CREDENTIALS))?;

        if !verify_password(password, &admin.password_hash)? {
            return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
        }
        Ok(admin)
    }

    /// `actor` is `None` for the command line, which may create any role.
    pub async fn create(&self, actor: Option<Role>, new: NewAdmin) -> Result<AdminProfile, ApiError> {
        let email = normalize_email(&new.email)?;
        let first_name = required("first_name", &new.first_name)?;
        let last_name = required("last_name", &new.last_name)?;
        let role = new.role.unwrap_or(Role::Admin);
        if let Some(actor) = actor {
            ensure_can_grant(actor, role)?;
        }
        ensure_strength(&new.password)?;

        if self.find_by_email(&email).await?.is_some() {
            return Err(ApiError::conflict("This email is already in use"));
        }

        let password_hash = hash_password(&new.password)?;
        let profile = sqlx::query_as::<_, AdminProfile>(&format!(
            "INSERT INTO admins (id, email, password_hash, first_name, last_name, role)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&email)
        .bind(&password_hash)
        .bind(&first_name)
        .bind(&last_name)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;

        info!(admin = %profile.id, role = %role, "admin account created");
        Ok(profile)
    }

    pub async fn list(&self, actor: Role) -> Result<Vec<AdminProfile>, ApiError> {
        let profiles = match actor {
            Role::SuperAdmin => {
                sqlx::query_as::<_, AdminProfile>(&format!(
                    "SELECT {PROFILE_COLUMNS} FROM admins ORDER BY created_at DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
            Role::Admin => {
                sqlx::query_as::<_, AdminProfile>(&format!(
                    "SELECT {PROFILE_COLUMNS} FROM admins WHERE role = $1 ORDER BY created_at DESC"
                ))
                .bind(Role::Admin)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(profiles)
    }

    pub async fn get(&self, actor: Role, id: Uuid) -> Result<AdminProfile, ApiError> {
        let admin = self.find(id).await?;
        ensure_can_manage(actor, admin.role)?;
        Ok(admin.into())
    }

    pub async fn me(&self, id: Uuid) -> Result<AdminProfile, ApiError> {
        self.find(id)
            .await
            .map(AdminProfile::from)
            .map_err(|_| ApiError::not_found("Profile not found"))
    }

    pub async fn update(&self, actor: Role, id: Uuid, update: AdminUpdate) -> Result<AdminProfile, ApiError> {
        let mut tx = self.pool.begin().await?;
        let super_admins = match update.role {
            Some(_) => lock_super_admins(&mut tx).await?,
            None => 0,
        };
        let mut admin = fetch_admin(&mut tx, id).await?;
        ensure_can_manage(actor, admin.role)?;

        if let Some(role) = update.role {
            ensure_can_grant(actor, role)?;
            if admin.role == Role::SuperAdmin && role != Role::SuperAdmin && super_admins <= 1 {
                return Err(ApiError::bad_request("The last super administrator cannot be demoted"));
            }
            admin.role = role;
        }

        if let Some(email) = update.email {
            let email = normalize_email(&email)?;
            if email != admin.email {
                if self.find_by_email(&email).await?.is_some() {
                    return Err(ApiError::conflict("This email is already in use"));
                }
                admin.email = email;
            }
        }
        if let Some(first_name) = update.first_name {
            admin.first_name = required("first_name", &first_name)?;
        }
        if let Some(last_name) = update.last_name {
            admin.last_name = required("last_name", &last_name)?;
        }
        if let Some(password) = update.password {
            ensure_strength(&password)?;
            admin.password_hash = hash_password(&password)?;
        }

        let profile = save_admin(&mut tx, &admin).await?;
        tx.commit().await?;
        Ok(profile)
    }

    async fn save(&self, admin: &Admin) -> Result<AdminProfile, ApiError> {
        let mut conn = self.pool.acquire().await?;
        save_admin(&mut conn, admin).await
    }

    /// The SUPER_ADMIN rows stay locked from the count to the delete.
    pub async fn delete(&self, actor: Role, id: Uuid) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;
        let super_admins = lock_super_admins(&mut tx).await?;
        let admin = fetch_admin(&mut tx, id).await?;
        ensure_can_manage(actor, admin.role)?;

        if admin.role == Role::SuperAdmin && super_admins <= 1 {
            return Err(ApiError::bad_request("The last super administrator cannot be deleted"));
        }

        sqlx::query("DELETE FROM admins WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!(admin = %id, "admin account deleted");
        Ok(())
    }

    pub async fn change_password(&self, id: Uuid, current: &str, new_password: &str) -> Result<(), ApiError> {
        let mut admin = self.find(id).await?;
        if !verify_password(current, &admin.password_hash)? {
            return Err(ApiError::bad_request("Current password is incorrect"));
        }
        ensure_strength(new_password)?;
        admin.password_hash = hash_password(new_password)?;
        self.save(&admin).await?;
        Ok(())
    }

    /// Reset without the current password; command line only.
    pub async fn reset_password(&self, email: &str, new_password: &str) -> Result<(), ApiError> {
        let email = normalize_email(email)?;
        let mut admin = self
            .find_by_email(&email)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("No administrator with email {}", email)))?;
        ensure_strength(new_password)?;
        admin.password_hash = hash_password(new_password)?;
        self.save(&admin).await?;
        Ok(())
    }

    /// Record a new avatar URL and hand back the previous one for cleanup.
    pub async fn set_avatar(&self, id: Uuid, url: String) -> Result<(AdminProfile, Option<String>), ApiError> {
        let mut admin = self.find(id).await?;
        let previous = admin.avatar.replace(url);
        let profile = self.save(&admin).await?;
        Ok((profile, previous))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Role::SuperAdmin, Role::SuperAdmin, true)]
    #[case(Role::SuperAdmin, Role::Admin, true)]
    #[case(Role::Admin, Role::Admin, true)]
    #[case(Role::Admin, Role::SuperAdmin, false)]
    fn manage_rules(#[case] actor: Role, #[case] target: Role, #[case] allowed: bool) {
        assert_eq!(ensure_can_manage(actor, target).is_ok(), allowed);
    }

    #[rstest]
    #[case(Role::SuperAdmin, Role::SuperAdmin, true)]
    #[case(Role::Admin, Role::Admin, true)]
    #[case(Role::Admin, Role::SuperAdmin, false)]
    fn grant_rules(#[case] actor: Role, #[case] role: Role, #[case] allowed: bool) {
        let result = ensure_can_grant(actor, role);
        assert_eq!(result.is_ok(), allowed);
        if let Err(e) = result {
            assert_eq!(e.status_code(), 403);
        }
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Lea@Example.ORG ").unwrap(), "lea@example.org");
        assert!(normalize_email("not-an-email").is_err());
        assert!(required("first_name", "   ").is_err());
    }
}
