// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the operator REST API.
//!
//! Provides [`ApiClient`], the reqwest-backed [`OperatorApi`] used for cache
//! refetches and mutation writes. Every request carries the bearer token held
//! by the credential store; a `401` surfaces as [`RelayDeskError::Unauthorized`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use relaydesk_config::model::ApiConfig;
use relaydesk_core::RelayDeskError;
use relaydesk_core::traits::{CredentialStore, OperatorApi};
use relaydesk_core::types::{
    Conversation, ConversationFilter, ConversationId, ConversationStatus, Message, Operator,
    OperatorId,
};

/// Error body returned by the API on non-success responses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ConversationList {
    conversations: Vec<Conversation>,
}

/// HTTP client for REST API communication.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
}

impl ApiClient {
    /// Creates a client for the API rooted at `config.base_url`.
    pub fn new(
        config: &ApiConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, RelayDeskError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RelayDeskError::Api {
                status: None,
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> Result<Url, RelayDeskError> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&raw).map_err(|e| RelayDeskError::Config(format!("invalid API url `{raw}`: {e}")))
    }

    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, RelayDeskError> {
        let token = self.credentials.token().ok_or(RelayDeskError::Unauthorized)?;
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(token.expose_secret()))
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, RelayDeskError> {
        let response = builder.send().await.map_err(|e| RelayDeskError::Api {
            status: None,
            message: format!("HTTP request failed: {e}"),
        })?;

        let status = response.status();
        debug!(status = %status, url = %response.url(), "api response received");

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(RelayDeskError::Unauthorized);
        }

        let body = response.text().await.map_err(|e| RelayDeskError::Api {
            status: Some(status.as_u16()),
            message: format!("failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(api_err) => format!("{} ({})", api_err.message, api_err.error),
                Err(_) => format!("API returned {status}: {body}"),
            };
            return Err(RelayDeskError::Api {
                status: Some(status.as_u16()),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| RelayDeskError::Protocol {
            message: format!("failed to parse API response: {e}"),
            source: Some(Box::new(e)),
        })
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, RelayDeskError> {
        self.execute(self.request(Method::GET, url)?).await
    }

    async fn patch<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, RelayDeskError> {
        let builder = self.request(Method::PATCH, self.url(path)?)?.json(&body);
        self.execute(builder).await
    }
}

#[async_trait]
impl OperatorApi for ApiClient {
    async fn list_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> Result<Vec<Conversation>, RelayDeskError> {
        let mut url = self.url("conversations")?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(status) = filter.status {
                query.append_pair("status", &status.to_string());
            }
            if let Some(operator) = filter.operator {
                query.append_pair("user_id", &operator.to_string());
            }
            if let Some(search) = &filter.search {
                query.append_pair("search", search);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        let list: ConversationList = self.get(url).await?;
        Ok(list.conversations)
    }

    async fn get_conversation(&self, id: ConversationId) -> Result<Conversation, RelayDeskError> {
        self.get(self.url(&format!("conversations/{id}"))?).await
    }

    async fn list_messages(
        &self,
        conversation: ConversationId,
    ) -> Result<Vec<Message>, RelayDeskError> {
        let mut url = self.url("messages")?;
        url.query_pairs_mut()
            .append_pair("conversation_id", &conversation.to_string());
        self.get(url).await
    }

    async fn list_operators(&self) -> Result<Vec<Operator>, RelayDeskError> {
        self.get(self.url("users")?).await
    }

    async fn send_message(
        &self,
        conversation: ConversationId,
        content: &str,
    ) -> Result<Message, RelayDeskError> {
        let body = serde_json::json!({
            "conversation_id": conversation,
            "content": content,
        });
        let builder = self
            .request(Method::POST, self.url("messages/send")?)?
            .json(&body);
        self.execute(builder).await
    }

    async fn assign_conversation(
        &self,
        conversation: ConversationId,
        operator: OperatorId,
    ) -> Result<Conversation, RelayDeskError> {
        self.patch(
            &format!("conversations/{conversation}/assign"),
            serde_json::json!({ "user_id": operator }),
        )
        .await
    }

    async fn update_status(
        &self,
        conversation: ConversationId,
        status: ConversationStatus,
    ) -> Result<Conversation, RelayDeskError> {
        self.patch(
            &format!("conversations/{conversation}/status"),
            serde_json::json!({ "status": status }),
        )
        .await
    }

    async fn close_conversation(
        &self,
        conversation: ConversationId,
    ) -> Result<Conversation, RelayDeskError> {
        self.patch(
            &format!("conversations/{conversation}/close"),
            serde_json::json!({}),
        )
        .await
    }

    async fn mark_read(
        &self,
        conversation: ConversationId,
    ) -> Result<Conversation, RelayDeskError> {
        self.patch(
            &format!("conversations/{conversation}/mark-read"),
            serde_json::json!({}),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaydesk_test_utils::MemoryCredentials;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CONV_ID: &str = "7f1c1d2e-1111-4a5b-9c3d-000000000001";
    const OPERATOR_ID: &str = "7f1c1d2e-2222-4a5b-9c3d-000000000002";

    fn test_client(base_url: &str) -> ApiClient {
        let credentials = Arc::new(MemoryCredentials::with_token("tok-123"));
        ApiClient::new(&ApiConfig::default(), credentials)
            .unwrap()
            .with_base_url(base_url.to_string())
    }

    fn conversation_body(status: &str, user_id: Option<&str>) -> serde_json::Value {
        serde_json::json!({
            "id": CONV_ID,
            "telegram_user": {"id": 42, "first_name": "Ana", "username": "ana"},
            "user_id": user_id,
            "status": status,
            "last_message_at": null,
            "unread_count": 0,
            "created_at": "2026-01-05T10:00:00Z"
        })
    }

    #[tokio::test]
    async fn list_conversations_sends_filter_and_bearer() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/conversations"))
            .and(query_param("status", "waiting"))
            .and(header("authorization", "Bearer tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "conversations": [conversation_body("waiting", None)],
                "total": 1
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let filter = ConversationFilter {
            status: Some(ConversationStatus::Waiting),
            ..Default::default()
        };
        let list = client.list_conversations(&filter).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].telegram_user.id, 42);
    }

    #[tokio::test]
    async fn list_without_total_still_parses() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/conversations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "conversations": [conversation_body("active", Some(OPERATOR_ID))]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let list = client
            .list_conversations(&ConversationFilter::default())
            .await
            .unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].status, ConversationStatus::Active);
    }

    #[tokio::test]
    async fn assign_patches_user_id() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path(format!("/conversations/{CONV_ID}/assign")))
            .and(body_json(serde_json::json!({ "user_id": OPERATOR_ID })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(conversation_body("active", Some(OPERATOR_ID))),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let updated = client
            .assign_conversation(CONV_ID.parse().unwrap(), OPERATOR_ID.parse().unwrap())
            .await
            .unwrap();
        assert_eq!(updated.status, ConversationStatus::Active);
        assert_eq!(
            updated.assigned_operator.map(|o| o.to_string()).as_deref(),
            Some(OPERATOR_ID)
        );
    }

    #[tokio::test]
    async fn send_message_posts_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/messages/send"))
            .and(body_json(serde_json::json!({
                "conversation_id": CONV_ID,
                "content": "hello"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "7f1c1d2e-3333-4a5b-9c3d-000000000003",
                "conversation_id": CONV_ID,
                "from_user": true,
                "content": "hello",
                "read": true,
                "telegram_message_id": 99,
                "media_type": null,
                "media_url": null,
                "created_at": "2026-01-05T10:00:00Z"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let message = client
            .send_message(CONV_ID.parse().unwrap(), "hello")
            .await
            .unwrap();
        assert!(!message.id.is_temporary());
        assert!(message.from_operator);
    }

    #[tokio::test]
    async fn unauthorized_maps_to_dedicated_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "unauthorized",
                "message": "token expired"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.list_operators().await.unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn error_body_is_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path(format!("/conversations/{CONV_ID}/close")))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": "not_found",
                "message": "Conversation not found"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .close_conversation(CONV_ID.parse().unwrap())
            .await
            .unwrap_err();
        match err {
            RelayDeskError::Api { status, message } => {
                assert_eq!(status, Some(404));
                assert!(message.contains("not_found"), "got: {message}");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_token_fails_before_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = ApiClient::new(&ApiConfig::default(), Arc::new(MemoryCredentials::default()))
            .unwrap()
            .with_base_url(server.uri());
        let err = client.list_operators().await.unwrap_err();
        assert!(matches!(err, RelayDeskError::Unauthorized));
    }

    #[tokio::test]
    async fn messages_are_listed_by_conversation() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/messages"))
            .and(query_param("conversation_id", CONV_ID))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let messages = client.list_messages(CONV_ID.parse().unwrap()).await.unwrap();
        assert!(messages.is_empty());
    }
}
