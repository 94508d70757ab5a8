use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};

/// The API is read-only; only the headers the report endpoints read are allowed.
pub fn read_only_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-candidate-token"),
        ])
        .expose_headers([
            header::CONTENT_DISPOSITION,
            header::HeaderName::from_static("x-partial-failures"),
        ])
        .allow_origin(Any)
}
