pub mod backup;
pub mod contact;
pub mod dashboard;
pub mod documents;
pub mod excel;
pub mod formations;
pub mod gallery;
pub mod health;
pub mod inscriptions;
pub mod mailer;
pub mod news;
pub mod notifications;
pub mod settings;
pub mod uploads;
pub mod users;
pub mod validation;
