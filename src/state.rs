use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;

use crate::config::AppConfig;
use crate::database::RegistrationStore;
use crate::services::excel::FormationCatalog;
use crate::services::inscriptions::InscriptionService;
use crate::services::mailer::Mailer;
use crate::services::notifications::Notifier;
use crate::services::uploads::{UploadStore, EXCEL};

/// Shared handles passed to every handler through axum's `State`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pool: PgPool,
    pub registrations: Arc<dyn RegistrationStore>,
    pub notifier: Notifier,
    pub uploads: UploadStore,
    pub catalog: FormationCatalog,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        pool: PgPool,
        registrations: Arc<dyn RegistrationStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let notifier = Notifier::new(mailer, config.mail.site_name.clone(), config.mail.admin_email.clone());
        let uploads = UploadStore::new(config.uploads.root.clone());
        let catalog = FormationCatalog::new(uploads.dir(EXCEL));

        Self {
            config: Arc::new(config),
            pool,
            registrations,
            notifier,
            uploads,
            catalog,
            started_at: Instant::now(),
        }
    }

    pub fn inscriptions(&self) -> InscriptionService {
        InscriptionService::new(self.registrations.clone(), self.notifier.clone())
    }
}
