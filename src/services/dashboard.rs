//! Dashboard figures. Formation and inscription aggregates are computed from
//! the registration store; the remaining counters come straight from SQL.

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;

use crate::database::models::formation::FormationFilter;
use crate::database::models::inscription::InscriptionFilter;
use crate::database::models::{Formation, FormationStatus, FormationType, Inscription, InscriptionStatus};
use crate::database::RegistrationStore;
use crate::error::ApiError;

pub const UPCOMING_LIMIT: usize = 5;
pub const MONTHS_WINDOW: u32 = 12;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormationCounts {
    pub total: usize,
    pub upcoming: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub accepted: usize,
    pub refused: usize,
    pub cancelled: usize,
}

impl StatusCounts {
    fn add(&mut self, status: InscriptionStatus) {
        self.total += 1;
        match status {
            InscriptionStatus::Pending => self.pending += 1,
            InscriptionStatus::Accepted => self.accepted += 1,
            InscriptionStatus::Refused => self.refused += 1,
            InscriptionStatus::Cancelled => self.cancelled += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentCounts {
    pub total: i64,
    pub downloads: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub formations: FormationCounts,
    pub inscriptions: StatusCounts,
    pub documents: DocumentCounts,
    pub images: i64,
    pub published_news: i64,
    pub admins: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub formation_type: FormationType,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthCount {
    /// `YYYY-MM`
    pub month: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthTrend {
    pub month: String,
    #[serde(flatten)]
    pub counts: StatusCounts,
}

/// First day of each of the last `MONTHS_WINDOW` months, oldest first.
fn month_window(now: DateTime<Utc>) -> Vec<NaiveDate> {
    let current = NaiveDate::from_ymd_opt(now.year(), now.month(), 1).unwrap_or(NaiveDate::MIN);
    (0..MONTHS_WINDOW)
        .rev()
        .filter_map(|back| current.checked_sub_months(Months::new(back)))
        .collect()
}

fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

fn same_month(a: NaiveDate, b: DateTime<Utc>) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

pub fn formation_counts(formations: &[Formation], now: DateTime<Utc>) -> FormationCounts {
    FormationCounts {
        total: formations.len(),
        upcoming: formations
            .iter()
            .filter(|f| f.date >= now && f.status != FormationStatus::Cancelled)
            .count(),
    }
}

pub fn status_counts(inscriptions: &[Inscription]) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for i in inscriptions {
        counts.add(i.status);
    }
    counts
}

/// Next sessions, soonest first, cancelled ones left out.
pub fn upcoming(mut formations: Vec<Formation>, now: DateTime<Utc>) -> Vec<Formation> {
    formations.retain(|f| f.date >= now && f.status != FormationStatus::Cancelled);
    formations.sort_by_key(|f| f.date);
    formations.truncate(UPCOMING_LIMIT);
    formations
}

/// Every type that has at least one formation, in declaration order.
pub fn by_type(formations: &[Formation]) -> Vec<TypeCount> {
    FormationType::ALL
        .iter()
        .map(|t| TypeCount {
            formation_type: *t,
            count: formations.iter().filter(|f| f.formation_type == *t).count(),
        })
        .filter(|c| c.count > 0)
        .collect()
}

/// Formations per session month over the last twelve months.
pub fn by_month(formations: &[Formation], now: DateTime<Utc>) -> Vec<MonthCount> {
    month_window(now)
        .into_iter()
        .map(|month| MonthCount {
            month: month_key(month),
            count: formations.iter().filter(|f| same_month(month, f.date)).count(),
        })
        .collect()
}

/// Inscriptions per creation month and status over the last twelve months.
pub fn trends(inscriptions: &[Inscription], now: DateTime<Utc>) -> Vec<MonthTrend> {
    month_window(now)
        .into_iter()
        .map(|month| MonthTrend {
            month: month_key(month),
            counts: status_counts(
                &inscriptions
                    .iter()
                    .filter(|i| same_month(month, i.created_at))
                    .cloned()
                    .collect::<Vec<_>>(),
            ),
        })
        .collect()
}

#[derive(Clone)]
pub struct DashboardService {
    pool: PgPool,
    store: Arc<dyn RegistrationStore>,
}

impl DashboardService {
    pub fn new(pool: PgPool, store: Arc<dyn RegistrationStore>) -> Self {
        Self { pool, store }
    }

    async fn formations(&self) -> Result<Vec<Formation>, ApiError> {
        Ok(self.store.list_formations(&FormationFilter::default()).await?)
    }

    async fn inscriptions(&self) -> Result<Vec<Inscription>, ApiError> {
        Ok(self.store.list_inscriptions(&InscriptionFilter::default()).await?)
    }

    pub async fn stats(&self) -> Result<DashboardStats, ApiError> {
        let now = Utc::now();
        let formations = formation_counts(&self.formations().await?, now);
        let inscriptions = status_counts(&self.inscriptions().await?);

        let (documents, downloads): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COALESCE(SUM(downloads), 0)::BIGINT FROM documents")
                .fetch_one(&self.pool)
                .await?;
        let (images,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM images")
            .fetch_one(&self.pool)
            .await?;
        let (published_news,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM news WHERE published")
            .fetch_one(&self.pool)
            .await?;
        let (admins,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM admins")
            .fetch_one(&self.pool)
            .await?;

        Ok(DashboardStats {
            formations,
            inscriptions,
            documents: DocumentCounts {
                total: documents,
                downloads,
            },
            images,
            published_news,
            admins,
        })
    }

    pub async fn upcoming(&self) -> Result<Vec<Formation>, ApiError> {
        Ok(upcoming(self.formations().await?, Utc::now()))
    }

    pub async fn formations_by_type(&self) -> Result<Vec<TypeCount>, ApiError> {
        Ok(by_type(&self.formations().await?))
    }

    pub async fn formations_by_month(&self) -> Result<Vec<MonthCount>, ApiError> {
        Ok(by_month(&self.formations().await?, Utc::now()))
    }

    pub async fn inscription_trends(&self) -> Result<Vec<MonthTrend>, ApiError> {
        Ok(trends(&self.inscriptions().await?, Utc::now()))
    }
}
