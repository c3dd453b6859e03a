// handlers/protected/mod.rs - Admin handlers (ADMIN or SUPER_ADMIN JWT)
//
// Back-office operations: formations and their inscriptions, documents,
// gallery, news, admin accounts and the dashboard.
//
// Security Level: JWT with role ADMIN or SUPER_ADMIN
// Route Prefix: /api/*/admin/*, /api/admin/users/*, /api/dashboard/*, /api/auth/me
// Middleware: jwt_auth_middleware + require_admin
//
// Finer rules (an ADMIN never manages a SUPER_ADMIN account) are enforced by
// the services, using the `AuthUser` the middleware put in the request.

pub mod auth;
pub mod dashboard;
pub mod documents;
pub mod formations;
pub mod gallery;
pub mod inscriptions;
pub mod news;
pub mod settings;
pub mod users;
