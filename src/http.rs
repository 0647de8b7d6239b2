//! HTTP front-ends.
//!
//! One router serves both hosts. The web-app host mounts the endpoints at the
//! root; the functions custom-handler host expects them under `/api`.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::de::DeserializeOwned;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::service::{CiRequest, HazardService, ValuesRequest, CI_USAGE, VALUES_USAGE};

/// Port variable set by the functions host for custom handlers.
pub const FUNCTIONS_PORT_ENV: &str = "FUNCTIONS_CUSTOMHANDLER_PORT";

/// Which host the router is mounted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    WebApp,
    Functions,
}

impl HostKind {
    /// Path prefix the host routes requests under.
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::WebApp => "",
            Self::Functions => "/api",
        }
    }
}

/// Build the router for `host`.
pub fn router(service: Arc<HazardService>, host: HostKind) -> Router {
    let prefix = host.prefix();
    Router::new()
        .route(&format!("{prefix}/get_values"), post(get_values_handler))
        .route(&format!("{prefix}/get_ci_values"), post(get_ci_values_handler))
        .layer(Extension(service))
}

// ============================================================================
// Handlers
// ============================================================================

async fn get_values_handler(
    Extension(service): Extension<Arc<HazardService>>,
    body: Bytes,
) -> Response {
    let request: ValuesRequest = match decode_body(&body, VALUES_USAGE) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };
    let file = request.file.clone().unwrap_or_default();

    let result = run_blocking(move || service.get_values(&request)).await;
    match &result {
        Ok(values) => info!(%file, bands = values.len(), "get_values"),
        Err(e) => info!(%file, error = %e, "get_values failed"),
    }

    match result {
        Ok(values) => Json(values).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn get_ci_values_handler(
    Extension(service): Extension<Arc<HazardService>>,
    body: Bytes,
) -> Response {
    let request: CiRequest = match decode_body(&body, CI_USAGE) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    // Pure computation; no need for a blocking worker
    match service.get_ci_values(&request) {
        Ok(ci) => {
            info!(lower = ci.lower_value, upper = ci.upper_value, "get_ci_values");
            Json(ci).into_response()
        }
        Err(e) => {
            info!(error = %e, "get_ci_values failed");
            e.into_response()
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Decode a JSON body. Any failure, including a type mismatch on a known
/// field, is reported with the endpoint's usage message.
fn decode_body<T: DeserializeOwned>(body: &[u8], usage: &str) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "Rejected request body");
        Error::InvalidInput(usage.to_string())
    })
}

/// Run raster work on a blocking worker thread.
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Internal(format!("worker task failed: {e}")))?
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            error!(error = %self, "Request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStore;
    use crate::test_utils::{Georef, TiffBuilder};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_router(host: HostKind) -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("flood.tif"),
            TiffBuilder::new(8, 8, 3)
                .georef(Georef::area(10.0, 50.0, 0.5, 0.5))
                .build(),
        )
        .unwrap();
        let service = Arc::new(HazardService::new(Arc::new(LocalStore::new(dir.path()))));
        (dir, router(service, host))
    }

    async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_values_ok() {
        let (_dir, app) = test_router(HostKind::WebApp);

        // lon 11.0 -> column 2, lat 48.5 -> row 3
        let (status, body) = post_json(
            app,
            "/get_values",
            r#"{"file": "flood.tif", "bands": [3, 1], "lat": 48.5, "lon": 11.0}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"band": 3, "value": 232.0}, {"band": 1, "value": 32.0}])
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_values_client_errors() {
        let (_dir, app) = test_router(HostKind::WebApp);

        let (status, body) = post_json(app.clone(), "/get_values", "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, VALUES_USAGE);

        let (status, body) =
            post_json(app.clone(), "/get_values", r#"{"file": "flood.tif", "bands": ["x"], "lat": 1, "lon": 1}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, VALUES_USAGE);

        let (status, body) =
            post_json(app.clone(), "/get_values", r#"{"bands": [1], "lat": 48.5, "lon": 11.0}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Please pass a file name in the request body");

        let (status, body) = post_json(
            app.clone(),
            "/get_values",
            r#"{"file": "flood.tif", "bands": [4], "lat": 48.5, "lon": 11.0}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Band 4 does not exist in the raster");

        let (status, body) = post_json(
            app,
            "/get_values",
            r#"{"file": "missing.tif", "bands": [1], "lat": 48.5, "lon": 11.0}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "File missing.tif cannot be opened or does not exist");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_values_out_of_bounds() {
        let (_dir, app) = test_router(HostKind::WebApp);
        let (status, body) = post_json(
            app,
            "/get_values",
            r#"{"file": "flood.tif", "bands": [1], "lat": 48.5, "lon": 20.0}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            "Lat/lon coordinates resolved to col/row (20, 3) and are outside of the raster extent ((0, 0), (8, 8))"
        );
    }

    #[tokio::test]
    async fn test_get_ci_values() {
        let (_dir, app) = test_router(HostKind::WebApp);

        let (status, body) = post_json(
            app.clone(),
            "/get_ci_values",
            r#"{"haz_stats": {"mean": 22.405237, "std_dev": 0.940294}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["lower_bound"], "0.05");
        assert_eq!(json["upper_bound"], "0.95");
        assert!((json["lower_val"].as_f64().unwrap() - 21.713556).abs() < 1e-5);

        let (status, body) = post_json(
            app.clone(),
            "/get_ci_values",
            r#"{"haz_stats": {"mean": 1.0, "std_dev": 1.0}, "distribution": "gamma"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "only normal distribution is currently implemented");

        let (status, body) = post_json(
            app.clone(),
            "/get_ci_values",
            r#"{"haz_stats": {"mean": 1.0, "std_dev": 1.0}, "distribution": "gamma", "confidence_level": 1.5}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "only normal distribution is currently implemented");

        let (status, body) = post_json(app, "/get_ci_values", r#"{"haz_stats": "high"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, CI_USAGE);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_functions_host_routes_under_api() {
        let (_dir, app) = test_router(HostKind::Functions);
        let (status, _) = post_json(
            app.clone(),
            "/api/get_values",
            r#"{"file": "flood.tif", "bands": [1], "lat": 48.5, "lon": 11.0}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = post_json(
            app,
            "/get_values",
            r#"{"file": "flood.tif", "bands": [1], "lat": 48.5, "lon": 11.0}"#,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_server_errors_map_to_500() {
        let response = Error::Projection("no inverse".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let response = Error::InvalidInput("bad".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
