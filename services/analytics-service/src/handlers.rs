use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::error::{ServiceError, ValidationError};
use crate::models::{CaptureResponse, EventPayload};
use crate::normalize::validate_and_normalize;
use crate::state::AppState;

const CAPTURED_MESSAGE: &str = "Captured analytics";

pub async fn healthz() -> &'static str {
    "welcome"
}

pub async fn readyz(State(state): State<AppState>) -> StatusCode {
    match state.store.ping().await {
        Ok(()) => StatusCode::OK,
        Err(err) => {
            tracing::warn!(error = %err, operation = "ping", "event store not ready");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

pub async fn capture(
    State(state): State<AppState>,
    payload: Result<Json<EventPayload>, JsonRejection>,
) -> impl IntoResponse {
    match capture_event(&state, payload).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn capture_event(
    state: &AppState,
    payload: Result<Json<EventPayload>, JsonRejection>,
) -> Result<CaptureResponse, ServiceError> {
    let Json(payload) = payload.map_err(|rejection| {
        let err = ValidationError::MalformedBody(rejection.body_text());
        tracing::error!(error = %err, operation = "parse", "error parsing request");
        err
    })?;

    let event = validate_and_normalize(payload).map_err(|err| {
        tracing::error!(error = %err, operation = "validate", "error parsing request");
        err
    })?;

    let ack = state.store.persist(&event).await.map_err(|err| {
        tracing::error!(
            error = %err,
            operation = "insert",
            event_id = %event.id,
            "failed to insert analytics"
        );
        err
    })?;

    tracing::debug!(
        event_id = %ack.id,
        installation_id = %ack.installation_id,
        event_type = %event.event_type,
        "captured analytics"
    );

    Ok(CaptureResponse {
        message: CAPTURED_MESSAGE,
        installation_id: ack.installation_id,
    })
}

pub async fn find_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(err) => {
            let err = ValidationError::InvalidEventId(err.to_string());
            tracing::error!(error = %err, operation = "find", "invalid event id");
            return ServiceError::from(err).into_response();
        }
    };

    match state.store.find(id).await {
        Ok(Some(event)) => (StatusCode::OK, Json(event)).into_response(),
        Ok(None) => ServiceError::not_found(format!("event {id} not found")).into_response(),
        Err(err) => {
            tracing::error!(error = %err, operation = "find", event_id = %id, "failed to load event");
            ServiceError::from(err).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use axum::{
        body::Body,
        http::{header, Request},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use tracing_subscriber::EnvFilter;

    use crate::app::build_router;
    use crate::normalize::unix_now;
    use crate::store::memory::MemoryEventStore;

    use super::*;

    fn setup() -> (Arc<MemoryEventStore>, Router) {
        let store = Arc::new(MemoryEventStore::default());
        let app = build_router(AppState::new(store.clone()));
        (store, app)
    }

    fn post_analytics(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/analytics")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Routes this thread's events, at the service's default `info` filter,
    /// into a buffer until the guard drops.
    fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("info"))
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        (buffer, tracing::subscriber::set_default(subscriber))
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(resp.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn captures_event_and_assigns_installation_id() {
        let (store, app) = setup();
        let before = unix_now();

        let resp = app
            .oneshot(post_analytics(r#"{"eventType":"click","meta":{"x":1}}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = json_body(resp).await;
        assert_eq!(body["message"], "Captured analytics");
        let installation_id = body["InstallationID"].as_str().unwrap();
        assert!(!installation_id.is_empty());

        let events = store.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].installation_id, installation_id);
        assert_eq!(events[0].installation_id, events[0].id.to_string());
        assert_eq!(events[0].meta.as_ref().unwrap()["x"], json!(1));
        assert!(events[0].stored_at >= before && events[0].stored_at <= unix_now());
    }

    #[tokio::test]
    async fn echoes_client_installation_id() {
        let (store, app) = setup();

        let resp = app
            .oneshot(post_analytics(
                r#"{"eventType":"open","installationId":"install-7","createdAt":12}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["InstallationID"], "install-7");

        let events = store.events();
        assert_eq!(events[0].installation_id, "install-7");
        assert_eq!(events[0].created_at, Some(12));
        assert_ne!(events[0].stored_at, 12);
    }

    #[tokio::test]
    async fn empty_event_type_is_rejected() {
        let (store, app) = setup();

        let resp = app.oneshot(post_analytics(r#"{"eventType":""}"#)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = json_body(resp).await;
        assert_eq!(body["status"], "Invalid request.");
        assert_eq!(body["error"], "event type cannot be empty");
        assert!(store.events().is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let (store, app) = setup();

        let bodies = [
            r#"{"eventType":"click""#,
            r#"{"eventType":"click","meta":[1]}"#,
            r#"{"eventType":"click","createdAt":"x"}"#,
            r#"{"eventType":5}"#,
        ];
        for body in bodies {
            let resp = app.clone().oneshot(post_analytics(body)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {body}");
            let body = json_body(resp).await;
            assert_eq!(body["status"], "Invalid request.");
            assert!(body["error"]
                .as_str()
                .unwrap()
                .starts_with("malformed request body"));
        }
        assert!(store.events().is_empty());
    }

    #[tokio::test]
    async fn missing_content_type_is_rejected() {
        let (store, app) = setup();

        let req = Request::builder()
            .method("POST")
            .uri("/analytics")
            .body(Body::from(r#"{"eventType":"click"}"#))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = json_body(resp).await;
        assert_eq!(body["status"], "Invalid request.");
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("malformed request body"));
        assert!(store.events().is_empty());
    }

    #[tokio::test]
    async fn logs_each_request_at_info() {
        let (_store, app) = setup();
        let (logs, _guard) = capture_logs();

        let resp = app
            .oneshot(post_analytics(r#"{"eventType":"click"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let output = logs.contents();
        let finished: Vec<&str> = output
            .lines()
            .filter(|line| line.contains("finished processing request"))
            .collect();
        assert_eq!(finished.len(), 1, "log output: {output}");
        assert!(finished[0].contains("/analytics"));
        assert!(finished[0].contains("200"));
    }

    #[tokio::test]
    async fn store_failure_is_reported() {
        let (store, app) = setup();
        store.set_available(false);

        let resp = app
            .oneshot(post_analytics(r#"{"eventType":"click"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = json_body(resp).await;
        assert_eq!(body["status"], "Invalid request.");
        assert_eq!(body["error"], "store unavailable: connection refused");
        assert!(store.events().is_empty());
    }

    #[tokio::test]
    async fn same_payload_twice_stores_two_documents() {
        let (store, app) = setup();
        let payload = r#"{"eventType":"click","installationId":"install-1"}"#;

        for _ in 0..2 {
            let resp = app.clone().oneshot(post_analytics(payload)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let events = store.events();
        assert_eq!(events.len(), 2);
        assert_ne!(events[0].id, events[1].id);
    }

    #[tokio::test]
    async fn stored_meta_round_trips() {
        let (store, app) = setup();
        let meta = json!({
            "screen": "home",
            "ratio": 0.5,
            "tags": ["a", "b"],
            "nested": {"ok": true, "missing": null}
        });
        let payload = json!({"eventType": "view", "meta": meta}).to_string();

        let resp = app.clone().oneshot(post_analytics(&payload)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let id = store.events()[0].id;
        let resp = app.oneshot(get(&format!("/analytics/{id}"))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let doc = json_body(resp).await;
        assert_eq!(doc["_id"], id.to_string());
        assert_eq!(doc["event_type"], "view");
        assert_eq!(doc["meta"], meta);
        assert!(doc["stored_at"].is_i64());
    }

    #[tokio::test]
    async fn find_reports_missing_and_invalid_ids() {
        let (_store, app) = setup();

        let resp = app
            .clone()
            .oneshot(get(&format!("/analytics/{}", Uuid::new_v4())))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(resp).await["status"], "Not found.");

        let (logs, _guard) = capture_logs();
        let resp = app.oneshot(get("/analytics/not-a-uuid")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let output = logs.contents();
        assert!(output.contains("invalid event id"), "log output: {output}");
        assert!(output.contains("find"));
    }

    #[tokio::test]
    async fn healthz_ignores_store_health() {
        let (store, app) = setup();
        store.set_available(false);

        let resp = app.oneshot(get("/healthz")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"welcome");
    }

    #[tokio::test]
    async fn readyz_tracks_store_health() {
        let (store, app) = setup();

        let resp = app.clone().oneshot(get("/readyz")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        store.set_available(false);
        let resp = app.oneshot(get("/readyz")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
