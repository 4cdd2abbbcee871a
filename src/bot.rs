use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use tracing::{debug, error, info, warn};

use crate::config::AddressingMode;
use crate::platform::line::{self, WebhookPayload};
use crate::platform::{IncomingMessage, Messenger};
use crate::registry::RecipientRegistry;
use crate::replies;

/// Shared application state
pub struct AppState {
    pub channel_secret: String,
    pub addressing: AddressingMode,
    pub registry: RecipientRegistry,
    pub messenger: Arc<dyn Messenger>,
}

impl AppState {
    pub fn new(
        channel_secret: String,
        addressing: AddressingMode,
        registry: RecipientRegistry,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            channel_secret,
            addressing,
            registry,
            messenger,
        }
    }
}

/// Failures surfaced to LINE by the webhook endpoint.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("unhandled processing error: {0:#}")]
    Processing(#[from] anyhow::Error),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        match self {
            WebhookError::InvalidSignature => {
                warn!("Rejected webhook: invalid signature");
                (StatusCode::BAD_REQUEST, "Bad Request").into_response()
            }
            WebhookError::Processing(e) => {
                error!("Unexpected error handling webhook: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/callback", post(callback))
        .with_state(state)
}

/// `POST /callback` — LINE webhook entry point.
async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, WebhookError> {
    let signature = headers
        .get(line::SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    debug!("Received webhook body: {}", String::from_utf8_lossy(&body));
    debug!("Signature: {}", signature);

    if !line::verify_signature(&state.channel_secret, &body, signature) {
        return Err(WebhookError::InvalidSignature);
    }

    let payload = WebhookPayload::parse(&body)?;
    debug!(
        "Webhook for {:?} with {} event(s)",
        payload.destination,
        payload.events.len()
    );
    for event in &payload.events {
        match event.as_text_message() {
            Some(incoming) => handle_message(&state, &incoming).await,
            None => debug!("Ignoring webhook event of type '{}'", event.event_type),
        }
    }

    Ok("OK")
}

/// Register the sender (per addressing mode) and answer with a canned reply.
/// A failed reply is logged and does not fail the webhook.
pub async fn handle_message(state: &AppState, incoming: &IncomingMessage) {
    if let Some(id) = incoming.source.recipient_id(state.addressing) {
        if state.registry.register(id).await {
            info!(
                "Added {} {} to broadcast recipients",
                incoming.source.kind(),
                id
            );
        }
    }

    info!(
        "Message from user {:?} in {} {:?}: {}",
        incoming.source.user_id(),
        incoming.source.kind(),
        incoming.source.chat_id(),
        incoming.text
    );

    let reply = replies::reply_for(&incoming.text);
    info!("Replying with: {}", reply);

    if let Err(e) = state
        .messenger
        .reply_text(&incoming.reply_token, reply)
        .await
    {
        error!("Failed to send reply: {:#}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::RecordingMessenger;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const SECRET: &str = "test-secret";

    fn state(addressing: AddressingMode, messenger: Arc<RecordingMessenger>) -> Arc<AppState> {
        Arc::new(AppState::new(
            SECRET.to_string(),
            addressing,
            RecipientRegistry::new(),
            messenger,
        ))
    }

    fn text_event(source: &str, reply_token: &str, text: &str) -> String {
        format!(
            r#"{{"type":"message","replyToken":"{reply_token}","source":{source},"message":{{"type":"text","id":"1","text":"{text}"}}}}"#
        )
    }

    fn payload(events: &[String]) -> String {
        format!(r#"{{"destination":"Ubot","events":[{}]}}"#, events.join(","))
    }

    fn signed_request(body: &str, signature: &str) -> Request<Body> {
        Request::post("/callback")
            .header("X-Line-Signature", signature)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(resp: Response) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_valid_webhook_replies_and_acknowledges() {
        let messenger = Arc::new(RecordingMessenger::default());
        let app = router(state(AddressingMode::Chat, messenger.clone()));
        let body = payload(&[text_event(
            r#"{"type":"user","userId":"U1"}"#,
            "rt-1",
            "我要完成任務",
        )]);

        let resp = app
            .oneshot(signed_request(&body, &line::sign(SECRET, body.as_bytes())))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "OK");
        assert_eq!(
            messenger.replies(),
            vec![("rt-1".to_string(), replies::TASK_REPLY.to_string())]
        );
    }

    #[tokio::test]
    async fn test_tampered_body_is_rejected_before_reply() {
        let messenger = Arc::new(RecordingMessenger::default());
        let app_state = state(AddressingMode::User, messenger.clone());
        let app = router(app_state.clone());
        let original = payload(&[text_event(
            r#"{"type":"user","userId":"U1"}"#,
            "rt-1",
            "hello",
        )]);
        let signature = line::sign(SECRET, original.as_bytes());
        let tampered = original.replace("hello", "滷小 SMALL");

        let resp = app
            .oneshot(signed_request(&tampered, &signature))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(messenger.replies().is_empty());
        assert!(app_state.registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_signature_is_rejected() {
        let messenger = Arc::new(RecordingMessenger::default());
        let app = router(state(AddressingMode::Chat, messenger.clone()));
        let req = Request::post("/callback")
            .body(Body::from(payload(&[])))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_body_is_internal_error() {
        let messenger = Arc::new(RecordingMessenger::default());
        let app = router(state(AddressingMode::Chat, messenger.clone()));
        let body = "{not json";
        let resp = app
            .oneshot(signed_request(body, &line::sign(SECRET, body.as_bytes())))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let text = body_text(resp).await;
        assert!(!text.contains("json"), "error detail leaked: {}", text);
    }

    #[tokio::test]
    async fn test_verification_request_is_acknowledged() {
        let messenger = Arc::new(RecordingMessenger::default());
        let app = router(state(AddressingMode::Chat, messenger.clone()));
        let body = payload(&[]);
        let resp = app
            .oneshot(signed_request(&body, &line::sign(SECRET, body.as_bytes())))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(messenger.replies().is_empty());
    }

    #[tokio::test]
    async fn test_get_is_not_allowed() {
        let messenger = Arc::new(RecordingMessenger::default());
        let app = router(state(AddressingMode::Chat, messenger));
        let req = Request::get("/callback").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_chat_mode_registers_groups_and_rooms_only() {
        let messenger = Arc::new(RecordingMessenger::default());
        let app_state = state(AddressingMode::Chat, messenger.clone());
        let body = payload(&[
            text_event(r#"{"type":"user","userId":"U1"}"#, "rt-1", "hi"),
            text_event(
                r#"{"type":"group","groupId":"C1","userId":"U2"}"#,
                "rt-2",
                "hi",
            ),
            text_event(r#"{"type":"room","roomId":"R1"}"#, "rt-3", "hi"),
            text_event(
                r#"{"type":"group","groupId":"C1","userId":"U3"}"#,
                "rt-4",
                "hi",
            ),
        ]);
        let resp = router(app_state.clone())
            .oneshot(signed_request(&body, &line::sign(SECRET, body.as_bytes())))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(app_state.registry.snapshot().await, vec!["C1", "R1"]);
        assert_eq!(messenger.replies().len(), 4);
    }

    #[tokio::test]
    async fn test_user_mode_registers_every_user() {
        let messenger = Arc::new(RecordingMessenger::default());
        let app_state = state(AddressingMode::User, messenger.clone());
        let body = payload(&[
            text_event(r#"{"type":"user","userId":"U1"}"#, "rt-1", "hi"),
            text_event(
                r#"{"type":"group","groupId":"C1","userId":"U2"}"#,
                "rt-2",
                "hi",
            ),
            text_event(r#"{"type":"user","userId":"U1"}"#, "rt-3", "hi"),
        ]);
        router(app_state.clone())
            .oneshot(signed_request(&body, &line::sign(SECRET, body.as_bytes())))
            .await
            .unwrap();
        assert_eq!(app_state.registry.snapshot().await, vec!["U1", "U2"]);
    }

    #[tokio::test]
    async fn test_reply_failure_still_acknowledges() {
        let messenger = Arc::new(RecordingMessenger {
            fail_replies: true,
            ..Default::default()
        });
        let app_state = state(AddressingMode::User, messenger.clone());
        let body = payload(&[text_event(
            r#"{"type":"user","userId":"U1"}"#,
            "rt-1",
            "滷肉飯",
        )]);
        let resp = router(app_state.clone())
            .oneshot(signed_request(&body, &line::sign(SECRET, body.as_bytes())))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(app_state.registry.snapshot().await, vec!["U1"]);
    }

    #[tokio::test]
    async fn test_handle_message_uses_reply_token() {
        let messenger = Arc::new(RecordingMessenger::default());
        let app_state = state(AddressingMode::User, messenger.clone());
        let incoming = IncomingMessage {
            source: crate::platform::MessageSource::User {
                user_id: "U9".into(),
            },
            reply_token: "token-abc".into(),
            text: "滷小 SMALL 在嗎".into(),
        };
        handle_message(&app_state, &incoming).await;
        assert_eq!(
            messenger.replies(),
            vec![("token-abc".to_string(), replies::GREETING_REPLY.to_string())]
        );
        assert!(messenger.pushes().is_empty());
    }
}
