// handlers/elevated/mod.rs - SUPER_ADMIN handlers
//
// Operations that can lock other administrators out or wipe the site:
// creating accounts, rewriting site settings, and whole-database export,
// import and reset.
//
// Security Level: JWT with role SUPER_ADMIN
// Route Prefix: /api/database/*, POST /api/admin/users, POST /api/settings/admin
// Middleware: jwt_auth_middleware + require_super_admin

pub mod database;
pub mod settings;
pub mod users;
