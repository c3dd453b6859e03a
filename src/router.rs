use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers::{elevated, protected, public};
use crate::middleware::{jwt_auth_middleware, require_admin, require_super_admin};
use crate::state::AppState;

/// Headroom over the largest file limit for the rest of a multipart body.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn app(state: AppState) -> Router {
    let uploads = &state.config.uploads;
    let body_limit = [
        uploads.max_document_bytes,
        uploads.max_image_bytes,
        uploads.max_avatar_bytes,
        uploads.max_excel_bytes,
    ]
    .into_iter()
    .max()
    .unwrap_or_default()
        + MULTIPART_OVERHEAD;

    Router::new()
        // Public
        .merge(public_routes())
        // ADMIN or SUPER_ADMIN
        .merge(
            admin_routes()
                .route_layer(from_fn(require_admin))
                .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware)),
        )
        // SUPER_ADMIN only
        .merge(
            super_admin_routes()
                .route_layer(from_fn(require_super_admin))
                .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware)),
        )
        .nest_service("/uploads", ServeDir::new(uploads.root.clone()))
        // Global middleware
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors(&state.config.security.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

fn public_routes() -> Router<AppState> {
    use public::*;

    Router::new()
        .route("/", get(system::root))
        .route("/health", get(system::health))
        .route("/api/health", get(system::health))
        .route("/api/auth/login", post(auth::login_post))
        // Formations and the imported catalog
        .route("/api/formations", get(formations::list))
        .route("/api/formations/catalog", get(formations::catalog))
        .route("/api/formations/:id", get(formations::get))
        // Registration and contact forms
        .route("/api/inscriptions", post(inscriptions::create))
        .route("/api/inscriptions/sauvetage-sportif", post(inscriptions::sauvetage))
        .route("/api/inscriptions/contact", post(inscriptions::contact))
        .route("/api/inscriptions/signalement", post(inscriptions::signalement))
        // Content
        .route("/api/documents", get(documents::list))
        .route("/api/documents/:id/download", get(documents::download))
        .route("/api/galerie", get(gallery::list))
        .route("/api/news", get(news::list))
        .route("/api/news/:id", get(news::get))
        .route("/api/settings", get(settings::get))
}

fn admin_routes() -> Router<AppState> {
    use protected::*;

    Router::new()
        .route("/api/auth/me", get(auth::session_me))
        // Formations
        .route("/api/formations/admin", post(formations::create))
        .route("/api/formations/admin/import", post(formations::import))
        .route(
            "/api/formations/admin/:id",
            put(formations::update).delete(formations::delete),
        )
        .route("/api/formations/admin/:id/status", put(formations::update_status))
        // Inscriptions
        .route("/api/inscriptions/admin", get(inscriptions::list))
        .route(
            "/api/inscriptions/admin/:id",
            get(inscriptions::get)
                .put(inscriptions::update)
                .delete(inscriptions::delete),
        )
        .route("/api/inscriptions/admin/:id/status", put(inscriptions::update_status))
        // Admin accounts and own profile
        .route("/api/admin/users", get(users::list))
        .route("/api/admin/users/me", get(users::me))
        .route("/api/admin/users/profile/password", put(users::change_password))
        .route("/api/admin/users/profile/avatar", post(users::upload_avatar))
        .route(
            "/api/admin/users/:id",
            get(users::get).put(users::update).delete(users::delete),
        )
        // Content management
        .route("/api/documents/admin", get(documents::list).post(documents::create))
        .route(
            "/api/documents/admin/:id",
            get(documents::get).put(documents::update).delete(documents::delete),
        )
        .route("/api/galerie/admin", get(gallery::list).post(gallery::create))
        .route("/api/galerie/admin/:id", put(gallery::update).delete(gallery::delete))
        .route("/api/news/admin", get(news::list).post(news::create))
        .route(
            "/api/news/admin/:id",
            get(news::get).put(news::update).delete(news::delete),
        )
        .route("/api/settings/admin", get(settings::get))
        // Dashboard
        .route("/api/dashboard/stats", get(dashboard::stats))
        .route("/api/dashboard/upcoming", get(dashboard::upcoming))
        .route("/api/dashboard/formations-by-type", get(dashboard::formations_by_type))
        .route("/api/dashboard/formations-by-month", get(dashboard::formations_by_month))
        .route("/api/dashboard/inscription-trends", get(dashboard::inscription_trends))
}

fn super_admin_routes() -> Router<AppState> {
    use elevated::*;

    Router::new()
        .route("/api/admin/users", post(users::create))
        .route("/api/settings/admin", post(settings::update))
        .route("/api/database/stats", get(database::stats))
        .route("/api/database/export", get(database::export))
        .route("/api/database/import", post(database::import))
        .route("/api/database/reset", post(database::reset))
}
