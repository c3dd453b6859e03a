//! Email templates and best-effort dispatch.
//!
//! Every message the API sends is described by an [`EmailTemplate`] variant
//! carrying the data it needs, or by ready-made HTML. [`Notifier::send`]
//! renders it, hands it to the configured [`Mailer`] and reports success as a
//! `bool`: delivery problems are logged here and never bubble up to the
//! operation that triggered the email.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::mailer::{is_valid_address, Mailer, OutgoingEmail};
use crate::database::models::{Formation, Inscription, InscriptionStatus};

#[derive(Debug, Clone, PartialEq)]
pub enum EmailTemplate {
    InscriptionConfirmation {
        first_name: String,
        formation_title: String,
        formation_date: DateTime<Utc>,
    },
    InscriptionAdminNotice {
        full_name: String,
        email: String,
        phone: String,
        birth_date: NaiveDate,
        message: Option<String>,
        formation_title: String,
        formation_date: DateTime<Utc>,
        available_seats: i32,
    },
    InscriptionStatusChanged {
        first_name: String,
        formation_title: String,
        formation_date: DateTime<Utc>,
        status: InscriptionStatus,
    },
    InscriptionCancelled {
        first_name: String,
        formation_title: String,
        formation_date: DateTime<Utc>,
    },
    SauvetageNotice {
        first_name: String,
        last_name: String,
        email: String,
        phone: String,
        birth_date: NaiveDate,
        observation: Option<String>,
    },
    SauvetageConfirmation {
        first_name: String,
        last_name: String,
    },
    ContactNotice {
        name: String,
        email: String,
        subject: String,
        message: String,
    },
    ContactConfirmation {
        name: String,
        subject: String,
    },
    ReportNotice {
        name: String,
        email: String,
        report_type: String,
        details: String,
        location: Option<String>,
    },
    ReportConfirmation {
        name: String,
        report_type: String,
    },
}

/// Either a named template with its data, or raw HTML content.
#[derive(Debug, Clone, PartialEq)]
pub enum EmailBody {
    Template(EmailTemplate),
    Html(String),
}

impl From<EmailTemplate> for EmailBody {
    fn from(template: EmailTemplate) -> Self {
        EmailBody::Template(template)
    }
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn french_date(date: DateTime<Utc>) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn layout(site_name: &str, heading: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{heading}</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <h2 style="color: #c81e1e;">{heading}</h2>
        {content}
        <p style="color: #666; font-size: 12px; margin-top: 40px;">{site}</p>
    </div>
</body>
</html>"#,
        heading = escape_html(heading),
        content = content,
        site = escape_html(site_name),
    )
}

fn row(label: &str, value: &str) -> String {
    format!("<li><strong>{}</strong> : {}</li>", label, escape_html(value))
}

impl EmailTemplate {
    /// Render to a complete HTML document.
    pub fn render(&self, site_name: &str) -> String {
        match self {
            EmailTemplate::InscriptionConfirmation {
                first_name,
                formation_title,
                formation_date,
            } => layout(
                site_name,
                "Demande d'inscription reçue",
                &format!(
                    "<p>Bonjour {},</p><p>Nous avons bien reçu votre demande d'inscription à la formation \
                     <strong>{}</strong> du {}. Elle est en cours de traitement et vous recevrez une réponse \
                     prochainement.</p>",
                    escape_html(first_name),
                    escape_html(formation_title),
                    french_date(*formation_date)
                ),
            ),
            EmailTemplate::InscriptionAdminNotice {
                full_name,
                email,
                phone,
                birth_date,
                message,
                formation_title,
                formation_date,
                available_seats,
            } => layout(
                site_name,
                "Nouvelle inscription",
                &format!(
                    "<p>Une nouvelle demande d'inscription a été enregistrée.</p><ul>{}{}{}{}{}{}{}{}</ul>",
                    row("Formation", formation_title),
                    row("Date", &french_date(*formation_date)),
                    row("Nom", full_name),
                    row("Email", email),
                    row("Téléphone", phone),
                    row("Date de naissance", &birth_date.format("%d/%m/%Y").to_string()),
                    row("Message", message.as_deref().unwrap_or("")),
                    row("Places restantes", &available_seats.to_string()),
                ),
            ),
            EmailTemplate::InscriptionStatusChanged {
                first_name,
                formation_title,
                formation_date,
                status,
            } => {
                let (heading, verdict) = match status {
                    InscriptionStatus::Accepted => (
                        "Inscription acceptée",
                        "a été acceptée. Nous vous attendons avec plaisir",
                    ),
                    InscriptionStatus::Refused => (
                        "Inscription refusée",
                        "n'a malheureusement pas pu être retenue",
                    ),
                    InscriptionStatus::Cancelled => ("Inscription annulée", "a été annulée"),
                    InscriptionStatus::Pending => ("Inscription en attente", "est en attente de validation"),
                };
                layout(
                    site_name,
                    heading,
                    &format!(
                        "<p>Bonjour {},</p><p>Votre inscription à la formation <strong>{}</strong> du {} {}.</p>",
                        escape_html(first_name),
                        escape_html(formation_title),
                        french_date(*formation_date),
                        verdict
                    ),
                )
            }
            EmailTemplate::InscriptionCancelled {
                first_name,
                formation_title,
                formation_date,
            } => layout(
                site_name,
                "Inscription annulée",
                &format!(
                    "<p>Bonjour {},</p><p>Votre inscription à la formation <strong>{}</strong> du {} a été \
                     supprimée. N'hésitez pas à nous contacter pour toute question.</p>",
                    escape_html(first_name),
                    escape_html(formation_title),
                    french_date(*formation_date)
                ),
            ),
            EmailTemplate::SauvetageNotice {
                first_name,
                last_name,
                email,
                phone,
                birth_date,
                observation,
            } => layout(
                site_name,
                "Nouvelle inscription - Sauvetage Sportif",
                &format!(
                    "<ul>{}{}{}{}{}{}</ul>",
                    row("Prénom", first_name),
                    row("Nom", last_name),
                    row("Email", email),
                    row("Téléphone", phone),
                    row("Date de naissance", &birth_date.format("%d/%m/%Y").to_string()),
                    row("Observation", observation.as_deref().unwrap_or("")),
                ),
            ),
            EmailTemplate::SauvetageConfirmation { first_name, last_name } => layout(
                site_name,
                "Demande d'inscription reçue",
                &format!(
                    "<p>Bonjour {} {},</p><p>Votre demande d'inscription au sauvetage sportif a bien été \
                     transmise. Nous revenons vers vous rapidement.</p>",
                    escape_html(first_name),
                    escape_html(last_name)
                ),
            ),
            EmailTemplate::ContactNotice {
                name,
                email,
                subject,
                message,
            } => layout(
                site_name,
                "Nouveau message de contact",
                &format!(
                    "<ul>{}{}{}{}</ul><p>{}</p>",
                    row("Nom", name),
                    row("Email", email),
                    row("Sujet", subject),
                    row("Date", &french_date(Utc::now())),
                    escape_html(message)
                ),
            ),
            EmailTemplate::ContactConfirmation { name, subject } => layout(
                site_name,
                "Message bien reçu",
                &format!(
                    "<p>Bonjour {},</p><p>Nous avons bien reçu votre message « {} » et vous répondrons \
                     dans les meilleurs délais.</p>",
                    escape_html(name),
                    escape_html(subject)
                ),
            ),
            EmailTemplate::ReportNotice {
                name,
                email,
                report_type,
                details,
                location,
            } => layout(
                site_name,
                "Nouveau signalement",
                &format!(
                    "<ul>{}{}{}{}{}</ul><p>{}</p>",
                    row("Nom", name),
                    row("Email", email),
                    row("Type", report_type),
                    row("Lieu", location.as_deref().unwrap_or("Non spécifié")),
                    row("Date", &french_date(Utc::now())),
                    escape_html(details)
                ),
            ),
            EmailTemplate::ReportConfirmation { name, report_type } => layout(
                site_name,
                "Signalement reçu",
                &format!(
                    "<p>Bonjour {},</p><p>Votre signalement ({}) a bien été transmis à notre équipe.</p>",
                    escape_html(name),
                    escape_html(report_type)
                ),
            ),
        }
    }
}

/// Renders and dispatches emails; every failure is logged and reported as `false`.
#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    site_name: String,
    admin_email: Option<String>,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, site_name: impl Into<String>, admin_email: Option<String>) -> Self {
        Self {
            mailer,
            site_name: site_name.into(),
            admin_email,
        }
    }

    pub fn admin_email(&self) -> Option<&str> {
        self.admin_email.as_deref()
    }

    pub async fn send(&self, to: &str, subject: &str, body: impl Into<EmailBody>) -> bool {
        if !is_valid_address(to) {
            warn!(to = %to, subject = %subject, "skipping email to invalid address");
            return false;
        }

        let html = match body.into() {
            EmailBody::Template(template) => template.render(&self.site_name),
            EmailBody::Html(html) => html,
        };
        let email = OutgoingEmail {
            to: to.trim().to_string(),
            subject: subject.to_string(),
            html,
        };

        match self.mailer.send(email).await {
            Ok(()) => {
                debug!(to = %to, subject = %subject, "email sent");
                true
            }
            Err(e) => {
                error!(to = %to, subject = %subject, "email delivery failed: {}", e);
                false
            }
        }
    }

    /// Sends to the configured admin address, `false` when there is none.
    pub async fn send_to_admin(&self, subject: &str, body: impl Into<EmailBody>) -> bool {
        match self.admin_email.clone() {
            Some(admin) => self.send(&admin, subject, body).await,
            None => {
                warn!(subject = %subject, "ADMIN_EMAIL not configured, admin notification skipped");
                false
            }
        }
    }

    /// Registrant confirmation and admin notice, sent concurrently.
    pub async fn inscription_received(&self, inscription: &Inscription, formation: &Formation) {
        let admin_subject = format!("Nouvelle inscription - {}", formation.title);
        let confirmation = self.send(
            &inscription.email,
            "Confirmation de votre demande d'inscription",
            EmailTemplate::InscriptionConfirmation {
                first_name: inscription.first_name.clone(),
                formation_title: formation.title.clone(),
                formation_date: formation.date,
            },
        );
        let notice = self.send_to_admin(
            &admin_subject,
            EmailTemplate::InscriptionAdminNotice {
                full_name: inscription.full_name(),
                email: inscription.email.clone(),
                phone: inscription.phone.clone(),
                birth_date: inscription.birth_date,
                message: inscription.message.clone(),
                formation_title: formation.title.clone(),
                formation_date: formation.date,
                available_seats: formation.available_seats,
            },
        );

        futures::join!(confirmation, notice);
    }

    pub async fn status_changed(&self, inscription: &Inscription, formation: &Formation) -> bool {
        let subject = match inscription.status {
            InscriptionStatus::Accepted => "Votre inscription a été acceptée",
            InscriptionStatus::Refused => "Votre inscription a été refusée",
            InscriptionStatus::Cancelled => "Votre inscription a été annulée",
            InscriptionStatus::Pending => "Votre inscription est en attente",
        };
        self.send(
            &inscription.email,
            subject,
            EmailTemplate::InscriptionStatusChanged {
                first_name: inscription.first_name.clone(),
                formation_title: formation.title.clone(),
                formation_date: formation.date,
                status: inscription.status,
            },
        )
        .await
    }

    pub async fn inscription_removed(&self, inscription: &Inscription, formation: &Formation) -> bool {
        self.send(
            &inscription.email,
            "Annulation de votre inscription",
            EmailTemplate::InscriptionCancelled {
                first_name: inscription.first_name.clone(),
                formation_title: formation.title.clone(),
                formation_date: formation.date,
            },
        )
        .await
    }
}
