// handlers/mod.rs - Three handler tiers
//
// Public (no auth) → Protected (ADMIN or SUPER_ADMIN JWT) → Elevated (SUPER_ADMIN JWT)
//
// The tier a handler lives in decides which middleware stack the router puts
// in front of it. Handlers themselves only see `AppState` and, past the
// public tier, the request-scoped `AuthUser`.
pub mod elevated;
pub mod protected;
pub mod public;
