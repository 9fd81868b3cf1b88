use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;

use crate::api::handlers;
use crate::utils::logging;
use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(vec![Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers(vec![header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION]);

    let api = Router::new()
        .route("/photos", get(handlers::list_photos).post(handlers::upload_photo))
        .route(
            "/photos/:id",
            get(handlers::get_photo)
                .patch(handlers::update_photo)
                .delete(handlers::delete_photo),
        )
        .route("/archive", get(handlers::archive))
        .route("/archive/:year", get(handlers::archive_year))
        .route("/trash", get(handlers::list_trash))
        .route("/auth", get(handlers::auth_check));

    Router::new()
        .route("/", get(handlers::serve_index))
        .route("/photo/:id", get(handlers::serve_photo_page))
        .route("/health", get(handlers::health))
        .route("/media/*path", get(handlers::serve_media))
        .nest("/api", api)
        .nest_service("/static", ServeDir::new(&state.paths.static_dir))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(cors)
        .layer(logging::http_trace_layer())
        .with_state(state)
}
