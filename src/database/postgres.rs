use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::models::formation::{FormationFilter, FormationPatch, NewFormation};
use super::models::inscription::{InscriptionFilter, InscriptionPatch, NewInscription};
use super::models::{Formation, FormationStatus, Inscription, InscriptionStatus};
use super::store::{apply_formation_patch, RegistrationStore, StatusChange, StoreError};

/// `RegistrationStore` backed by PostgreSQL. Seat changes are conditional
/// updates inside the same transaction as the inscription write.
#[derive(Clone)]
pub struct PgRegistrationStore {
    pool: PgPool,
}

impl PgRegistrationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn fetch_formation(conn: &mut PgConnection, id: Uuid) -> Result<Formation, StoreError> {
    sqlx::query_as::<_, Formation>("SELECT * FROM formations WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| StoreError::formation_not_found(id))
}

/// Decrement only while a seat is left. `None` means the guard failed.
async fn take_seat(conn: &mut PgConnection, id: Uuid) -> Result<Option<Formation>, sqlx::Error> {
    sqlx::query_as::<_, Formation>(
        r#"UPDATE formations
           SET available_seats = available_seats - 1, updated_at = now()
           WHERE id = $1 AND available_seats > 0
           RETURNING *"#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await
}

async fn release_seat(conn: &mut PgConnection, id: Uuid) -> Result<Formation, StoreError> {
    sqlx::query_as::<_, Formation>(
        r#"UPDATE formations
           SET available_seats = LEAST(available_seats + 1, total_seats), updated_at = now()
           WHERE id = $1
           RETURNING *"#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| StoreError::formation_not_found(id))
}

async fn lock_inscription(conn: &mut PgConnection, id: Uuid) -> Result<Inscription, StoreError> {
    sqlx::query_as::<_, Inscription>("SELECT * FROM inscriptions WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| StoreError::inscription_not_found(id))
}

/// Status machine and seat delta for an inscription already locked in `conn`.
async fn apply_status(
    conn: &mut PgConnection,
    current: Inscription,
    status: InscriptionStatus,
) -> Result<StatusChange, StoreError> {
    let previous = current.status;

    if previous == status {
        let formation = fetch_formation(conn, current.formation_id).await?;
        return Ok(StatusChange {
            previous,
            inscription: current,
            formation,
        });
    }

    if !previous.can_transition_to(status) {
        return Err(StoreError::InvalidTransition { from: previous, to: status });
    }

    let formation = match previous.seat_delta(status) {
        delta if delta < 0 => take_seat(conn, current.formation_id)
            .await?
            .ok_or(StoreError::NoSeatsAvailable)?,
        delta if delta > 0 => release_seat(conn, current.formation_id).await?,
        _ => fetch_formation(conn, current.formation_id).await?,
    };

    let inscription = sqlx::query_as::<_, Inscription>(
        r#"UPDATE inscriptions
           SET status = $2, notified = TRUE, updated_at = now()
           WHERE id = $1
           RETURNING *"#,
    )
    .bind(current.id)
    .bind(status)
    .fetch_one(&mut *conn)
    .await?;

    Ok(StatusChange {
        previous,
        inscription,
        formation,
    })
}

async fn apply_patch(conn: &mut PgConnection, id: Uuid, patch: InscriptionPatch) -> Result<Inscription, StoreError> {
    sqlx::query_as::<_, Inscription>(
        r#"UPDATE inscriptions
           SET first_name = COALESCE($2, first_name),
               last_name = COALESCE($3, last_name),
               email = COALESCE($4, email),
               phone = COALESCE($5, phone),
               birth_date = COALESCE($6, birth_date),
               message = CASE WHEN $7 THEN $8 ELSE message END,
               notified = COALESCE($9, notified),
               updated_at = now()
           WHERE id = $1
           RETURNING *"#,
    )
    .bind(id)
    .bind(patch.first_name)
    .bind(patch.last_name)
    .bind(patch.email)
    .bind(patch.phone)
    .bind(patch.birth_date)
    .bind(patch.message.is_some())
    .bind(patch.message.flatten())
    .bind(patch.notified)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| StoreError::inscription_not_found(id))
}

#[async_trait]
impl RegistrationStore for PgRegistrationStore {
    async fn list_formations(&self, filter: &FormationFilter) -> Result<Vec<Formation>, StoreError> {
        let rows = sqlx::query_as::<_, Formation>(
            r#"SELECT * FROM formations
               WHERE ($1::text IS NULL OR formation_type = $1)
                 AND ($2::text IS NULL OR status = $2)
                 AND (NOT $3 OR date >= $4)
               ORDER BY date ASC"#,
        )
        .bind(filter.formation_type)
        .bind(filter.status)
        .bind(filter.upcoming)
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_formation(&self, id: Uuid) -> Result<Formation, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_formation(&mut conn, id).await
    }

    async fn create_formation(&self, new: NewFormation) -> Result<Formation, StoreError> {
        if new.total_seats < 1 {
            return Err(StoreError::Invalid("total_seats must be at least 1".into()));
        }
        let formation = sqlx::query_as::<_, Formation>(
            r#"INSERT INTO formations
                 (id, title, formation_type, date, duration, total_seats, available_seats,
                  price, location, instructor, status)
               VALUES ($1, $2, $3, $4, $5, $6, $6, $7, $8, $9, $10)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(new.formation_type)
        .bind(new.date)
        .bind(&new.duration)
        .bind(new.total_seats)
        .bind(new.price)
        .bind(&new.location)
        .bind(&new.instructor)
        .bind(new.status)
        .fetch_one(&self.pool)
        .await?;
        Ok(formation)
    }

    async fn update_formation(&self, id: Uuid, patch: FormationPatch) -> Result<Formation, StoreError> {
        let mut tx = self.pool.begin().await?;

        let mut formation = sqlx::query_as::<_, Formation>("SELECT * FROM formations WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::formation_not_found(id))?;

        apply_formation_patch(&mut formation, patch)?;

        let updated = sqlx::query_as::<_, Formation>(
            r#"UPDATE formations
               SET title = $2, formation_type = $3, date = $4, duration = $5,
                   total_seats = $6, available_seats = $7, price = $8, location = $9,
                   instructor = $10, status = $11, updated_at = now()
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(id)
        .bind(&formation.title)
        .bind(formation.formation_type)
        .bind(formation.date)
        .bind(&formation.duration)
        .bind(formation.total_seats)
        .bind(formation.available_seats)
        .bind(formation.price)
        .bind(&formation.location)
        .bind(&formation.instructor)
        .bind(formation.status)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn set_formation_status(&self, id: Uuid, status: FormationStatus) -> Result<Formation, StoreError> {
        sqlx::query_as::<_, Formation>(
            "UPDATE formations SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::formation_not_found(id))
    }

    async fn delete_formation(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM formations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::formation_not_found(id));
        }
        Ok(())
    }

    async fn list_inscriptions(&self, filter: &InscriptionFilter) -> Result<Vec<Inscription>, StoreError> {
        let rows = sqlx::query_as::<_, Inscription>(
            r#"SELECT * FROM inscriptions
               WHERE ($1::uuid IS NULL OR formation_id = $1)
                 AND ($2::text IS NULL OR status = $2)
               ORDER BY created_at DESC"#,
        )
        .bind(filter.formation_id)
        .bind(filter.status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_inscription(&self, id: Uuid) -> Result<Inscription, StoreError> {
        sqlx::query_as::<_, Inscription>("SELECT * FROM inscriptions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::inscription_not_found(id))
    }

    async fn create_inscription(&self, new: NewInscription) -> Result<(Inscription, Formation), StoreError> {
        let mut tx = self.pool.begin().await?;

        let formation = match take_seat(&mut tx, new.formation_id).await? {
            Some(formation) => formation,
            None => {
                // Distinguish a full session from a missing one; the transaction rolls back on drop.
                fetch_formation(&mut tx, new.formation_id).await?;
                return Err(StoreError::NoSeatsAvailable);
            }
        };

        let inscription = sqlx::query_as::<_, Inscription>(
            r#"INSERT INTO inscriptions
                 (id, first_name, last_name, email, phone, birth_date, message,
                  formation_id, status, notified)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(new.birth_date)
        .bind(&new.message)
        .bind(new.formation_id)
        .bind(InscriptionStatus::Pending)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((inscription, formation))
    }

    async fn update_inscription(
        &self,
        id: Uuid,
        patch: InscriptionPatch,
        status: Option<InscriptionStatus>,
    ) -> Result<StatusChange, StoreError> {
        let mut tx = self.pool.begin().await?;

        let current = lock_inscription(&mut tx, id).await?;
        let mut change = match status {
            Some(status) => apply_status(&mut tx, current, status).await?,
            None => {
                let formation = fetch_formation(&mut tx, current.formation_id).await?;
                StatusChange {
                    previous: current.status,
                    inscription: current,
                    formation,
                }
            }
        };

        if !patch.is_empty() {
            change.inscription = apply_patch(&mut tx, id, patch).await?;
        }

        tx.commit().await?;
        Ok(change)
    }

    async fn update_inscription_status(
        &self,
        id: Uuid,
        status: InscriptionStatus,
    ) -> Result<StatusChange, StoreError> {
        let mut tx = self.pool.begin().await?;

        let current = lock_inscription(&mut tx, id).await?;
        let change = apply_status(&mut tx, current, status).await?;

        tx.commit().await?;
        Ok(change)
    }

    async fn delete_inscription(&self, id: Uuid) -> Result<(Inscription, Formation), StoreError> {
        let mut tx = self.pool.begin().await?;

        let inscription = lock_inscription(&mut tx, id).await?;

        sqlx::query("DELETE FROM inscriptions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let formation = if inscription.status == InscriptionStatus::Accepted {
            release_seat(&mut tx, inscription.formation_id).await?
        } else {
            fetch_formation(&mut tx, inscription.formation_id).await?
        };

        tx.commit().await?;
        Ok((inscription, formation))
    }
}
