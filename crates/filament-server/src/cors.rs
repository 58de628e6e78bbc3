//! CORS policy shared by every route.

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

/// `Access-Control-Allow-Methods` value.
pub const ALLOW_METHODS: &str = "OPTIONS, POST";

/// `Access-Control-Allow-Headers` value.
pub const ALLOW_HEADERS: &str = "Content-Type";

/// Build the CORS layer from an origin allow-list.
///
/// `"*"` anywhere in the list allows any origin. Entries that are not valid
/// header values are skipped.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(allow_origin(allowed_origins))
        .allow_methods([Method::OPTIONS, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

fn allow_origin(allowed_origins: &[String]) -> AllowOrigin {
    if allowed_origins.iter().any(|o| o.trim() == "*") {
        return AllowOrigin::any();
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    AllowOrigin::list(origins)
}
