// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Site visitors read formations, documents, gallery, news and settings, and
// submit the registration and contact forms.
//
// Security Level: None
// Route Prefix: /api/* plus `/` and `/health`
// Middleware: CORS, tracing and body limits only

pub mod auth;
pub mod documents;
pub mod formations;
pub mod gallery;
pub mod inscriptions;
pub mod news;
pub mod settings;
pub mod system;
