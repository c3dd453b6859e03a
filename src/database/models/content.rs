use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::text_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentCategory {
    FormationsPro,
    FormationsPublic,
    SauvetageSportif,
    General,
}

text_enum!(DocumentCategory {
    FormationsPro => "FORMATIONS_PRO",
    FormationsPublic => "FORMATIONS_PUBLIC",
    SauvetageSportif => "SAUVETAGE_SPORTIF",
    General => "GENERAL",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageCategory {
    Formations,
    Sauvetage,
    Evenements,
    Equipe,
}

text_enum!(ImageCategory {
    Formations => "formations",
    Sauvetage => "sauvetage",
    Evenements => "evenements",
    Equipe => "equipe",
});

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: DocumentCategory,
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub downloads: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GalleryImage {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: ImageCategory,
    pub file_name: String,
    pub file_path: String,
    /// Public URL, derived from the file name.
    #[sqlx(skip)]
    #[serde(default)]
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GalleryImage {
    pub fn with_url(mut self) -> Self {
        self.url = format!("/uploads/galerie/{}", self.file_name);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct News {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub image_url: Option<String>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}
