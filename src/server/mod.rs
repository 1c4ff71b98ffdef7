//! HTTP read surface for the overlay collaborator

mod routes;

pub use routes::{create_router, create_router_with_name, AppState, DetectionsResponse};
