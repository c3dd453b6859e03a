//! Site settings stored as key/value rows and served as one document.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::info;

use crate::database::models::Setting;
use crate::error::ApiError;

pub const LAST_BACKUP: &str = "system.last_backup";
pub const LAST_RESTORE: &str = "system.last_restore";
pub const LAST_RESET: &str = "system.last_reset";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSettings {
    pub email: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialSettings {
    pub facebook: String,
    pub instagram: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub email_inscription: bool,
    pub email_contact: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email_inscription: true,
            email_contact: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSettings {
    pub contact: ContactSettings,
    pub social: SocialSettings,
    pub notifications: NotificationSettings,
}

impl SiteSettings {
    /// Unknown keys are ignored; missing keys keep their defaults.
    pub fn from_pairs(pairs: &HashMap<String, String>) -> Self {
        let mut settings = Self::default();
        let text = |key: &str, target: &mut String| {
            if let Some(value) = pairs.get(key) {
                *target = value.clone();
            }
        };
        let flag = |key: &str, target: &mut bool| {
            if let Some(value) = pairs.get(key) {
                *target = value == "true";
            }
        };

        text("contact.email", &mut settings.contact.email);
        text("contact.phone", &mut settings.contact.phone);
        text("contact.address", &mut settings.contact.address);
        text("social.facebook", &mut settings.social.facebook);
        text("social.instagram", &mut settings.social.instagram);
        flag("notifications.email_inscription", &mut settings.notifications.email_inscription);
        flag("notifications.email_contact", &mut settings.notifications.email_contact);
        settings
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactPatch {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SocialPatch {
    pub facebook: Option<String>,
    pub instagram: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationPatch {
    pub email_inscription: Option<bool>,
    pub email_contact: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    #[serde(default)]
    pub contact: ContactPatch,
    #[serde(default)]
    pub social: SocialPatch,
    #[serde(default)]
    pub notifications: NotificationPatch,
}

impl SettingsPatch {
    /// Rows to upsert, in a stable order.
    pub fn into_pairs(self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        let mut push = |key: &'static str, value: Option<String>| {
            if let Some(value) = value {
                pairs.push((key, value.trim().to_string()));
            }
        };

        push("contact.email", self.contact.email);
        push("contact.phone", self.contact.phone);
        push("contact.address", self.contact.address);
        push("social.facebook", self.social.facebook);
        push("social.instagram", self.social.instagram);
        push(
            "notifications.email_inscription",
            self.notifications.email_inscription.map(|b| b.to_string()),
        );
        push(
            "notifications.email_contact",
            self.notifications.email_contact.map(|b| b.to_string()),
        );
        pairs
    }
}

#[derive(Clone)]
pub struct SettingsService {
    pool: PgPool,
}

impl SettingsService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self) -> Result<SiteSettings, ApiError> {
        let rows = sqlx::query_as::<_, Setting>("SELECT * FROM settings")
            .fetch_all(&self.pool)
            .await?;
        let pairs = rows.into_iter().map(|s| (s.key, s.value)).collect();
        Ok(SiteSettings::from_pairs(&pairs))
    }

    pub async fn update(&self, patch: SettingsPatch) -> Result<SiteSettings, ApiError> {
        let pairs = patch.into_pairs();
        let mut tx = self.pool.begin().await?;
        for (key, value) in &pairs {
            upsert(&mut *tx, key, value).await?;
        }
        tx.commit().await?;

        info!(keys = pairs.len(), "settings updated");
        self.get().await
    }

    pub async fn value(&self, key: &str) -> Result<Option<String>, ApiError> {
        Ok(sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Stamp a `system.*` key with the current time.
    pub async fn touch(&self, key: &str) -> Result<(), ApiError> {
        let mut conn = self.pool.acquire().await?;
        upsert(&mut *conn, key, &Utc::now().to_rfc3339()).await?;
        Ok(())
    }
}

pub async fn upsert(conn: &mut sqlx::PgConnection, key: &str, value: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO settings (key, value, updated_at) VALUES ($1, $2, now())
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
    )
    .bind(key)
    .bind(value)
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_from_rows() {
        let pairs: HashMap<String, String> = [
            ("contact.email", "contact@aloha.test"),
            ("social.instagram", "@aloha"),
            ("notifications.email_contact", "false"),
            ("system.last_backup", "2025-01-01T00:00:00Z"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let settings = SiteSettings::from_pairs(&pairs);
        assert_eq!(settings.contact.email, "contact@aloha.test");
        assert_eq!(settings.contact.phone, "");
        assert_eq!(settings.social.instagram, "@aloha");
        assert!(settings.notifications.email_inscription);
        assert!(!settings.notifications.email_contact);
    }

    #[test]
    fn patch_only_writes_given_keys() {
        let patch: SettingsPatch = serde_json::from_value(serde_json::json!({
            "contact": { "phone": " 04 94 00 00 00 " },
            "notifications": { "email_inscription": false }
        }))
        .unwrap();

        assert_eq!(
            patch.into_pairs(),
            vec![
                ("contact.phone", "04 94 00 00 00".to_string()),
                ("notifications.email_inscription", "false".to_string()),
            ]
        );
    }
}
