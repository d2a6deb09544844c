//! Axum router receiving gateway webhooks.
//!
//! `POST <path>` accepts a JSON object or a form-encoded body, classifies
//! it and hands the resulting [`BillingEvent`](pelecard::events::BillingEvent)
//! to an [`EventDispatcher`].

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode};
use pelecard::config::WebhookConfig;
use pelecard::events::EventDispatcher;
use pelecard::webhook;
use serde_json::{Map, Value, json};

/// Header carrying the webhook signature, if the gateway sends one.
pub const SIGNATURE_HEADER: &str = "X-Pelecard-Signature";

/// Errors answered to the webhook sender.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The body is neither a JSON object nor a form.
    #[error("invalid webhook payload: {0}")]
    InvalidBody(String),

    /// Signature validation failed.
    #[error("Invalid webhook signature")]
    InvalidSignature,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSignature => StatusCode::FORBIDDEN,
        };
        let body = json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Shared state of the webhook route.
#[derive(Clone, Debug, Default)]
pub struct WebhookState {
    /// Receives every classified event.
    pub dispatcher: EventDispatcher,
    /// Whether to run the signature check.
    pub signature_validation: bool,
}

impl WebhookState {
    /// State dispatching to `dispatcher`, with signature validation on.
    #[must_use]
    pub const fn new(dispatcher: EventDispatcher) -> Self {
        Self {
            dispatcher,
            signature_validation: true,
        }
    }
}

/// `POST <path>` - receives a gateway notification.
///
/// # Errors
///
/// Returns 400 if the body cannot be parsed and 403 if the signature is rejected.
pub async fn post_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, WebhookError> {
    if state.signature_validation {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());
        if !webhook::verify_signature(signature, &body) {
            return Err(WebhookError::InvalidSignature);
        }
    }

    let payload = parse_payload(&headers, &body)?;
    let event = webhook::into_event(payload);

    #[cfg(feature = "telemetry")]
    tracing::info!(event = event.name(), "Received Pelecard webhook");

    state.dispatcher.dispatch(&event).await;
    Ok(Json(json!({ "status": "success" })))
}

fn parse_payload(headers: &HeaderMap, body: &[u8]) -> Result<Map<String, Value>, WebhookError> {
    let is_form = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"));

    if is_form {
        return Ok(url::form_urlencoded::parse(body)
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect());
    }
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(WebhookError::InvalidBody("expected a JSON object".to_owned())),
        Err(e) => Err(WebhookError::InvalidBody(e.to_string())),
    }
}

/// Route path for a configured webhook path, with a single leading slash.
#[must_use]
pub fn route_path(path: &str) -> String {
    format!("/{}", path.trim_matches('/'))
}

/// Creates an Axum [`axum::Router`] serving `POST <path>`.
pub fn webhook_router(path: &str, state: WebhookState) -> axum::Router {
    axum::Router::new()
        .route(&route_path(path), axum::routing::post(post_webhook))
        .with_state(state)
}

/// Creates the webhook router from configuration.
pub fn router_from_config(config: &WebhookConfig, dispatcher: EventDispatcher) -> axum::Router {
    webhook_router(
        &config.path,
        WebhookState {
            dispatcher,
            signature_validation: config.signature_validation,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http::Request;
    use pelecard::events::{BillingEvent, EventListener};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<BillingEvent>>,
    }

    impl EventListener for Recorder {
        fn on_event<'a>(
            &'a self,
            event: &'a BillingEvent,
        ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
            self.events.lock().unwrap().push(event.clone());
            Box::pin(async {})
        }
    }

    fn app(recorder: &Arc<Recorder>) -> axum::Router {
        let listener: Arc<dyn EventListener> = Arc::<Recorder>::clone(recorder);
        let dispatcher = EventDispatcher::new().with_listener(listener);
        router_from_config(&WebhookConfig::default(), dispatcher)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post(content_type: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/pelecard/webhook")
            .header(CONTENT_TYPE, content_type)
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_json_success_payload() {
        let recorder = Arc::new(Recorder::default());
        let response = app(&recorder)
            .oneshot(post(
                "application/json",
                r#"{"StatusCode":"000","PelecardTransactionId":"tx-1"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "success"}));

        let events = recorder.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            BillingEvent::PaymentSucceeded { response, .. } => {
                assert_eq!(response.transaction_id().as_deref(), Some("tx-1"));
            }
            other => panic!("unexpected event {other}"),
        }
    }

    #[tokio::test]
    async fn test_form_payload() {
        let recorder = Arc::new(Recorder::default());
        let response = app(&recorder)
            .oneshot(post(
                "application/x-www-form-urlencoded",
                "StatusCode=006&ErrorMessage=Declined",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let events = recorder.events.lock().unwrap();
        assert_eq!(events[0].name(), "payment.failed");
    }

    #[tokio::test]
    async fn test_invalid_body() {
        let recorder = Arc::new(Recorder::default());
        let response = app(&recorder)
            .oneshot(post("application/json", "[1,2,3]"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
        assert!(recorder.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_body_is_a_failure_event() {
        let recorder = Arc::new(Recorder::default());
        let response = app(&recorder)
            .oneshot(post("application/json", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(recorder.events.lock().unwrap()[0].name(), "payment.failed");
    }

    #[tokio::test]
    async fn test_get_not_routed() {
        let recorder = Arc::new(Recorder::default());
        let request = Request::builder()
            .uri("/pelecard/webhook")
            .body(Body::empty())
            .unwrap();
        let response = app(&recorder).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_route_path() {
        assert_eq!(route_path("pelecard/webhook"), "/pelecard/webhook");
        assert_eq!(route_path("/hooks/"), "/hooks");
    }
}
