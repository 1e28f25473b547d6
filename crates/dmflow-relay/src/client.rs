// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the surface-agent relay.
//!
//! Provides [`RelayClient`], which builds requests, attaches the optional
//! bearer token and turns non-2xx replies into executor errors carrying the
//! agent's own message.

use std::time::Duration;

use dmflow_core::DmflowError;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::debug;

use crate::types::{OpenSurfaceResponse, RelayErrorBody, SendMessageRequest};

/// HTTP client for relay communication.
#[derive(Debug, Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    base_url: String,
}

impl RelayClient {
    /// Creates a new relay client.
    ///
    /// `timeout` bounds every request; sends that simulate typing can take a
    /// while, so it should exceed the longest expected send.
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self, DmflowError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| DmflowError::Config(format!("invalid relay token header value: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| DmflowError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /v1/surfaces`
    pub async fn open_surface(&self) -> Result<String, DmflowError> {
        let response = self
            .client
            .post(format!("{}/v1/surfaces", self.base_url))
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;
        let body: OpenSurfaceResponse = response
            .json()
            .await
            .map_err(|e| DmflowError::executor(format!("malformed relay response: {e}")))?;
        debug!(surface = %body.surface_id, "relay opened surface");
        Ok(body.surface_id)
    }

    /// `POST /v1/surfaces/{id}/messages`
    pub async fn send_message(
        &self,
        surface_id: &str,
        request: &SendMessageRequest,
    ) -> Result<(), DmflowError> {
        let response = self
            .client
            .post(format!("{}/v1/surfaces/{surface_id}/messages", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await?;
        Ok(())
    }

    /// `DELETE /v1/surfaces/{id}`. A surface the agent no longer knows is already closed.
    pub async fn close_surface(&self, surface_id: &str) -> Result<(), DmflowError> {
        let response = self
            .client
            .delete(format!("{}/v1/surfaces/{surface_id}", self.base_url))
            .send()
            .await
            .map_err(transport_error)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(response).await?;
        Ok(())
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<(), DmflowError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await?;
        Ok(())
    }
}

fn transport_error(err: reqwest::Error) -> DmflowError {
    if err.is_timeout() {
        DmflowError::executor("relay request timed out")
    } else {
        DmflowError::executor(format!("relay unreachable: {err}"))
    }
}

/// Pass 2xx responses through; map anything else to an executor error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, DmflowError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<RelayErrorBody>(&body) {
        Ok(parsed) => parsed.error,
        Err(_) if body.is_empty() => format!("relay returned {status}"),
        Err(_) => format!("relay returned {status}: {body}"),
    };
    Err(DmflowError::executor(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypingDelay;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str, token: Option<&str>) -> RelayClient {
        RelayClient::new(base_url, token, Duration::from_secs(5)).unwrap()
    }

    fn request() -> SendMessageRequest {
        SendMessageRequest {
            username: "alice".into(),
            message: "Hi Alice!".into(),
            typing_delay: TypingDelay {
                min_ms: 50,
                max_ms: 250,
            },
        }
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = test_client("http://127.0.0.1:4317/", None);
        assert_eq!(client.base_url(), "http://127.0.0.1:4317");
    }

    #[tokio::test]
    async fn open_surface_returns_agent_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/surfaces"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"surface_id": "tab-7"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), None);
        assert_eq!(client.open_surface().await.unwrap(), "tab-7");
    }

    #[tokio::test]
    async fn send_posts_the_message_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/surfaces/tab-7/messages"))
            .and(header("authorization", "Bearer s3cret"))
            .and(body_json(serde_json::json!({
                "username": "alice",
                "message": "Hi Alice!",
                "typing_delay": {"min_ms": 50, "max_ms": 250}
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), Some("s3cret"));
        client.send_message("tab-7", &request()).await.unwrap();
    }

    #[tokio::test]
    async fn agent_error_message_is_preserved() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/surfaces/tab-7/messages"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_json(serde_json::json!({"error": "Message button not found"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), None);
        let err = client.send_message("tab-7", &request()).await.unwrap_err();
        match err {
            DmflowError::Executor { message } => assert_eq!(message, "Message button not found"),
            other => panic!("expected executor error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unstructured_error_includes_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/surfaces"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), None);
        let err = client.open_surface().await.unwrap_err().to_string();
        assert!(err.contains("502"), "got: {err}");
        assert!(err.contains("bad gateway"), "got: {err}");
    }

    #[tokio::test]
    async fn closing_an_unknown_surface_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/surfaces/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), None);
        client.close_surface("gone").await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_agent_is_an_executor_error() {
        // Nothing listens on this port once the server is dropped.
        let uri = {
            let server = MockServer::start().await;
            server.uri()
        };
        let client = test_client(&uri, None);
        let err = client.open_surface().await.unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("relay unreachable"), "got: {err}");
    }

    #[tokio::test]
    async fn slow_agent_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/surfaces/tab-1/messages"))
            .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let client = RelayClient::new(&server.uri(), None, Duration::from_millis(100)).unwrap();
        let err = client.send_message("tab-1", &request()).await.unwrap_err();
        assert!(err.to_string().contains("timed out"), "got: {err}");
    }
}
