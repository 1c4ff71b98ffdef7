//! HTTP routes: health, the detection listing and the overlay controls

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::{get, post}, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::overlay::{render_text, OverlayState};
use crate::core::record::DetectionRecord;
use crate::detector::Detector;

#[derive(Clone)]
pub struct AppState { pub detector: Arc<Detector>, pub app_name: String }

impl AppState {
    pub fn new(detector: Arc<Detector>, app_name: impl Into<String>) -> Self {
        Self { detector, app_name: app_name.into() }
    }
}

#[derive(Debug, Serialize)]
pub struct DetectionsResponse { pub detections: Vec<DetectionRecord>, pub count: usize }

pub fn create_router(detector: Arc<Detector>) -> Router { create_router_with_name(detector, "webdetector") }

pub fn create_router_with_name(detector: Arc<Detector>, app_name: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/detections", get(list_detections))
        .route("/overlay", get(overlay))
        .route("/overlay/text", get(overlay_text))
        .route("/overlay/toggle", post(toggle_overlay))
        .route("/overlay/font/increase", post(increase_font))
        .route("/overlay/font/decrease", post(decrease_font))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(detector, app_name))
}

pub(crate) async fn health(State(s): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok", "service": s.app_name}))
}

pub(crate) async fn list_detections(State(s): State<AppState>) -> Result<Json<DetectionsResponse>, (StatusCode, String)> {
    let detections = s.detector.list_detections().await.map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
    Ok(Json(DetectionsResponse { count: detections.len(), detections }))
}

pub(crate) async fn overlay(State(s): State<AppState>) -> Json<OverlayState> {
    Json(s.detector.overlay())
}

/// The panel body as plain text.
pub(crate) async fn overlay_text(State(s): State<AppState>) -> Result<String, (StatusCode, String)> {
    let records = s.detector.list_detections().await.map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
    Ok(render_text(&records))
}

pub(crate) async fn toggle_overlay(State(s): State<AppState>) -> Json<OverlayState> {
    s.detector.toggle_overlay();
    Json(s.detector.overlay())
}

pub(crate) async fn increase_font(State(s): State<AppState>) -> Json<OverlayState> {
    s.detector.increase_font();
    Json(s.detector.overlay())
}

pub(crate) async fn decrease_font(State(s): State<AppState>) -> Json<OverlayState> {
    s.detector.decrease_font();
    Json(s.detector.overlay())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DetectorConfig;
    use crate::core::record::Detection;
    use crate::store::DetectionStore;

    fn state() -> AppState {
        let detector = Detector::new(DetectorConfig::default(), DetectionStore::memory("http")).unwrap();
        AppState::new(Arc::new(detector), "test")
    }

    #[tokio::test]
    async fn test_unavailable_before_open() {
        let err = list_detections(State(state())).await.err().unwrap();
        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_lists_after_open() {
        let s = state();
        s.detector.open().await.unwrap();
        s.detector.store().append(Detection::now("https://p.test/", "client_secret", "cs"));
        s.detector.flush().await;
        let Json(body) = list_detections(State(s)).await.unwrap();
        assert_eq!(body.count, 1);
        assert_eq!(body.detections[0].key, "client_secret");
    }

    #[tokio::test]
    async fn test_overlay_controls() {
        let s = state();
        let Json(initial) = overlay(State(s.clone())).await;
        assert_eq!(initial, OverlayState::default());

        let Json(shown) = toggle_overlay(State(s.clone())).await;
        assert!(shown.visible);
        let Json(bigger) = increase_font(State(s.clone())).await;
        assert_eq!(bigger.font_size, 13);
        for _ in 0..10 {
            decrease_font(State(s.clone())).await;
        }
        let Json(last) = overlay(State(s)).await;
        assert!(last.visible);
        assert_eq!(last.font_size, 8);
    }

    #[tokio::test]
    async fn test_overlay_text() {
        let s = state();
        assert_eq!(overlay_text(State(s.clone())).await.err().unwrap().0, StatusCode::SERVICE_UNAVAILABLE);

        s.detector.open().await.unwrap();
        s.detector.store().append(Detection::now("https://p.test/", "access_token", "tok"));
        s.detector.flush().await;
        let text = overlay_text(State(s)).await.unwrap();
        assert!(text.starts_with("Detected Logs\n"));
        assert!(text.contains("access_token: tok"));
    }
}
