use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};

use super::handlers::{
    chat_handler::chat,
    thread_handler::{create_thread, delete_thread, get_thread, list_threads, rename_thread},
};
use super::services::ConversationService;

/// Create routes for threads and chat. Every route requires the user header.
pub fn routes(service: Arc<ConversationService>) -> Router {
    Router::new()
        .route("/api/threads", post(create_thread).get(list_threads))
        .route("/api/threads/{id}", get(get_thread).delete(delete_thread))
        .route("/api/threads/{id}/rename", put(rename_thread))
        .route("/api/chat", post(chat))
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PricingConfig;
    use crate::features::agent::{AgentClient, AgentError, AgentOutput, AgentReply, UsageRecord};
    use crate::features::conversations::stores::FileThreadStore;
    use crate::shared::constants::USER_ID_HEADER;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct EchoAgent;

    #[async_trait]
    impl AgentClient for EchoAgent {
        async fn invoke(&self, query: &str, _context: &str) -> Result<AgentReply, AgentError> {
            Ok(AgentReply {
                output: AgentOutput::Narrative(format!("You asked about {}", query)),
                usage: vec![UsageRecord::new(400, 100)],
            })
        }
    }

    async fn app() -> (Router, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileThreadStore::open(dir.path()).await.unwrap();
        let service = ConversationService::new(
            Arc::new(store),
            Arc::new(EchoAgent),
            PricingConfig::default(),
            Duration::from_secs(5),
        );
        (routes(Arc::new(service)), dir)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_missing_user_header_is_rejected() {
        let (app, _dir) = app().await;

        let (status, body) = send(&app, Method::GET, "/api/threads", None, None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_unsafe_user_header_is_rejected() {
        let (app, _dir) = app().await;

        let (status, _) = send(&app, Method::GET, "/api/threads", Some("../etc"), None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_thread_lifecycle() {
        let (app, _dir) = app().await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/threads",
            Some("alice"),
            Some(json!({ "thread_name": "BTC ideas" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["name"], "BTC ideas");

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/api/threads/{}/rename", id),
            Some("alice"),
            Some(json!({ "new_name": "ETH ideas" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "ETH ideas");

        let (status, body) = send(&app, Method::GET, "/api/threads", Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["total"], 1);
        assert_eq!(body["data"][0]["name"], "ETH ideas");

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/threads/{}", id),
            Some("bob"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            Method::DELETE,
            &format!("/api/threads/{}", id),
            Some("alice"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/threads/{}", id),
            Some("alice"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_chat_creates_thread_and_reports_usage() {
        let (app, _dir) = app().await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/chat",
            Some("alice"),
            Some(json!({ "query": "RSI divergence" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["answer"], "You asked about RSI divergence");
        assert_eq!(data["tokens_used"], 500);
        assert!(data["cost"].as_f64().unwrap() > 0.0);
        assert_eq!(
            data["chatsummary"],
            "User asked: RSI divergence. Provided explanation."
        );

        let id = data["conversation_id"].as_str().unwrap();
        let (status, thread) = send(
            &app,
            Method::GET,
            &format!("/api/threads/{}", id),
            Some("alice"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(thread["data"]["message_count"], 2);
        assert_eq!(thread["data"]["messages"][0]["role"], "user");
        assert_eq!(thread["data"]["messages"][1]["metadata"]["tokens"], 500);
    }

    #[tokio::test]
    async fn test_chat_with_unknown_thread_is_not_found() {
        let (app, _dir) = app().await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/chat",
            Some("alice"),
            Some(json!({ "query": "hi", "conversation_id": uuid::Uuid::new_v4() })),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_chat_rejects_empty_query() {
        let (app, _dir) = app().await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/chat",
            Some("alice"),
            Some(json!({ "query": "" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
