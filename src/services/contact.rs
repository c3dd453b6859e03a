//! Public forms relayed to the site administrator by email.
//!
//! Nothing is persisted. The admin notice is the whole point of a form, so a
//! missing `ADMIN_EMAIL` is a client-visible error and a failed delivery is a
//! 502. The copy sent back to the visitor is best-effort.

use serde::Deserialize;
use tracing::info;

use crate::error::ApiError;
use crate::services::notifications::{EmailTemplate, Notifier};
use crate::services::validation::{optional, FieldErrors};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SauvetageRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<String>,
    pub observation: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub report_type: Option<String>,
    pub details: Option<String>,
    pub location: Option<String>,
}

/// What a form produced once the admin has been told.
struct Outgoing {
    visitor: String,
    notice_subject: String,
    notice: EmailTemplate,
    confirmation_subject: &'static str,
    confirmation: EmailTemplate,
}

#[derive(Clone)]
pub struct ContactService {
    notifier: Notifier,
}

impl ContactService {
    pub fn new(notifier: Notifier) -> Self {
        Self { notifier }
    }

    pub async fn sauvetage(&self, request: SauvetageRequest) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        let first_name = errors.required("first_name", request.first_name.as_deref());
        let last_name = errors.required("last_name", request.last_name.as_deref());
        let email = errors.email("email", request.email.as_deref());
        let phone = errors.required("phone", request.phone.as_deref());
        let birth_date = errors.date("birth_date", request.birth_date.as_deref());
        errors.finish()?;
        let Some(birth_date) = birth_date else {
            return Err(ApiError::invalid_field("birth_date", "This field is required"));
        };

        self.relay(Outgoing {
            visitor: email.clone(),
            notice_subject: format!("Inscription sauvetage sportif - {} {}", first_name, last_name),
            notice: EmailTemplate::SauvetageNotice {
                first_name: first_name.clone(),
                last_name: last_name.clone(),
                email,
                phone,
                birth_date,
                observation: optional(request.observation),
            },
            confirmation_subject: "Confirmation de votre demande - Sauvetage sportif",
            confirmation: EmailTemplate::SauvetageConfirmation { first_name, last_name },
        })
        .await
    }

    pub async fn contact(&self, request: ContactRequest) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        let name = errors.required("name", request.name.as_deref());
        let email = errors.email("email", request.email.as_deref());
        let subject = errors.required("subject", request.subject.as_deref());
        let message = errors.required("message", request.message.as_deref());
        errors.finish()?;

        self.relay(Outgoing {
            visitor: email.clone(),
            notice_subject: format!("Nouveau message de contact - {}", subject),
            notice: EmailTemplate::ContactNotice {
                name: name.clone(),
                email,
                subject: subject.clone(),
                message,
            },
            confirmation_subject: "Confirmation de réception de votre message",
            confirmation: EmailTemplate::ContactConfirmation { name, subject },
        })
        .await
    }

    pub async fn report(&self, request: ReportRequest) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        let name = errors.required("name", request.name.as_deref());
        let email = errors.email("email", request.email.as_deref());
        let report_type = errors.required("report_type", request.report_type.as_deref());
        let details = errors.required("details", request.details.as_deref());
        errors.finish()?;

        self.relay(Outgoing {
            visitor: email.clone(),
            notice_subject: format!("Nouveau signalement - {}", report_type),
            notice: EmailTemplate::ReportNotice {
                name: name.clone(),
                email,
                report_type: report_type.clone(),
                details,
                location: optional(request.location),
            },
            confirmation_subject: "Confirmation de votre signalement",
            confirmation: EmailTemplate::ReportConfirmation { name, report_type },
        })
        .await
    }

    async fn relay(&self, outgoing: Outgoing) -> Result<(), ApiError> {
        if self.notifier.admin_email().is_none() {
            return Err(ApiError::bad_request("Administrator email is not configured"));
        }
        if !self
            .notifier
            .send_to_admin(&outgoing.notice_subject, outgoing.notice)
            .await
        {
            return Err(ApiError::bad_gateway("The message could not be delivered"));
        }

        let confirmed = self
            .notifier
            .send(&outgoing.visitor, outgoing.confirmation_subject, outgoing.confirmation)
            .await;
        info!(subject = %outgoing.notice_subject, confirmed, "public form relayed");
        Ok(())
    }
}
