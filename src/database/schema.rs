use sqlx::PgPool;
use tracing::info;

use super::DatabaseError;

/// Statements run in order at startup. Each one is idempotent.
const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS admins (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'ADMIN' CHECK (role IN ('ADMIN', 'SUPER_ADMIN')),
        avatar TEXT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS formations (
        id UUID PRIMARY KEY,
        title TEXT NOT NULL,
        formation_type TEXT NOT NULL,
        date TIMESTAMPTZ NOT NULL,
        duration TEXT NOT NULL,
        total_seats INTEGER NOT NULL CHECK (total_seats >= 1),
        available_seats INTEGER NOT NULL,
        price NUMERIC(10, 2) NOT NULL CHECK (price >= 0),
        location TEXT NOT NULL,
        instructor TEXT NULL,
        status TEXT NOT NULL DEFAULT 'PLANNED',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        CONSTRAINT formations_seats_in_bounds CHECK (available_seats >= 0 AND available_seats <= total_seats)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS inscriptions (
        id UUID PRIMARY KEY,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT NOT NULL,
        phone TEXT NOT NULL,
        birth_date DATE NOT NULL,
        message TEXT NULL,
        formation_id UUID NOT NULL REFERENCES formations(id) ON DELETE CASCADE,
        status TEXT NOT NULL DEFAULT 'PENDING'
            CHECK (status IN ('PENDING', 'ACCEPTED', 'REFUSED', 'CANCELLED')),
        notified BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_inscriptions_formation ON inscriptions(formation_id)",
    r#"CREATE TABLE IF NOT EXISTS documents (
        id UUID PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT NULL,
        category TEXT NOT NULL,
        file_name TEXT NOT NULL,
        file_path TEXT NOT NULL,
        file_size BIGINT NOT NULL,
        mime_type TEXT NOT NULL,
        downloads INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS images (
        id UUID PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT NULL,
        category TEXT NOT NULL,
        file_name TEXT NOT NULL,
        file_path TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS news (
        id UUID PRIMARY KEY,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        excerpt TEXT NULL,
        image_url TEXT NULL,
        published BOOLEAN NOT NULL DEFAULT FALSE,
        published_at TIMESTAMPTZ NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
];

/// Create every table the API needs if it is missing.
pub async fn init_db(pool: &PgPool) -> Result<(), DatabaseError> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Database schema ready ({} statements)", SCHEMA.len());
    Ok(())
}
