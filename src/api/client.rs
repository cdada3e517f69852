//! HTTP implementation of [`GuestbookApi`].
//!
//! Every request gets a UUID v4 request id, sent as `X-Request-Id` and attached
//! to a tracing span that wraps the whole call, so client and server logs can
//! be correlated. Timeouts come from configuration; a request that exceeds
//! them fails as a network error instead of hanging.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::board::{Id, Message, Reply};
use crate::config::{ApiConfig, REQUEST_ID_HEADER, USER_AGENT};
use crate::error::{AppError, Result};

use super::{flatten_replies, Attachment, GuestbookApi, NewMessage, NewReply, ReplyPayload};

/// Body of a successful submission
#[derive(Debug, Deserialize)]
struct SubmitAck {
    #[serde(default)]
    message: Option<String>,
}

/// Body of a failed request
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// Guestbook API client over HTTP.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn messages_path() -> String {
        "/api/messages".to_string()
    }

    fn replies_path(message_id: &Id) -> String {
        format!("/api/messages/{}/replies", urlencoding::encode(message_id.as_str()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request inside a span carrying its request id.
    async fn send(
        &self,
        method: Method,
        path: &str,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<Response> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "api.request",
            request_id = %request_id,
            method = %method,
            path = %path,
            duration_ms = tracing::field::Empty,
        );

        let request = build(
            self.client
                .request(method, self.url(path))
                .header(REQUEST_ID_HEADER, request_id.to_string()),
        );

        let start = Instant::now();
        async move {
            let result = request.send().await;
            let duration_ms = start.elapsed().as_millis() as u64;
            tracing::Span::current().record("duration_ms", duration_ms);

            match result {
                Ok(response) => {
                    tracing::info!(status = response.status().as_u16(), duration_ms, "Request completed");
                    Ok(response)
                }
                Err(e) => {
                    tracing::warn!(error = %e, duration_ms, "Request failed");
                    Err(AppError::from(e))
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            Err(Self::read_error(response).await)
        }
    }

    async fn read_error(response: Response) -> AppError {
        let status = response.status();
        match response.text().await {
            Ok(body) => error_from_body(status, &body),
            Err(e) => AppError::from(e),
        }
    }

    async fn read_ack(response: Response) -> Result<String> {
        let ack: SubmitAck = Self::read_json(response).await?;
        Ok(ack.message.unwrap_or_else(|| "Posted".to_string()))
    }
}

/// Map a non-success response to an error, preferring the server's `error` text.
fn error_from_body(status: StatusCode, body: &str) -> AppError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });

    AppError::Rejected {
        status: status.as_u16(),
        message,
    }
}

fn file_part(attachment: Attachment) -> Result<Part> {
    Ok(Part::bytes(attachment.bytes)
        .file_name(attachment.file_name)
        .mime_str(&attachment.mime)?)
}

fn message_form(message: NewMessage) -> Result<Form> {
    let mut form = Form::new()
        .text("name", message.name)
        .text("email", message.email)
        .text("content", message.content);

    for image in message.images {
        form = form.part("images", file_part(image)?);
    }
    if let Some(video) = message.video {
        form = form.part("video", file_part(video)?);
    }
    for file in message.files {
        form = form.part("files", file_part(file)?);
    }
    Ok(form)
}

fn reply_form(reply: NewReply) -> Result<Form> {
    let mut form = Form::new()
        .text("name", reply.name)
        .text("email", reply.email)
        .text("content", reply.content);

    if let Some(parent_id) = reply.parent_id {
        form = form.text("parent_id", parent_id.to_string());
    }
    if let Some(image) = reply.image {
        form = form.part("image", file_part(image)?);
    }
    if let Some(video) = reply.video {
        form = form.part("video", file_part(video)?);
    }
    Ok(form)
}

#[async_trait]
impl GuestbookApi for HttpApi {
    async fn list_messages(&self) -> Result<Vec<Message>> {
        let response = self.send(Method::GET, &Self::messages_path(), |r| r).await?;
        Self::read_json(response).await
    }

    async fn post_message(&self, message: NewMessage) -> Result<String> {
        let form = message_form(message)?;
        let response = self
            .send(Method::POST, &Self::messages_path(), |r| r.multipart(form))
            .await?;
        Self::read_ack(response).await
    }

    async fn list_replies(&self, message_id: &Id) -> Result<Vec<Reply>> {
        let response = self
            .send(Method::GET, &Self::replies_path(message_id), |r| r)
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("Message {}", message_id)));
        }
        let payload: Vec<ReplyPayload> = Self::read_json(response).await?;
        Ok(flatten_replies(payload))
    }

    async fn post_reply(&self, message_id: &Id, reply: NewReply) -> Result<String> {
        let form = reply_form(reply)?;
        let response = self
            .send(Method::POST, &Self::replies_path(message_id), |r| r.multipart(form))
            .await?;
        Self::read_ack(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replies_path_encodes_id() {
        assert_eq!(HttpApi::replies_path(&Id::from(12)), "/api/messages/12/replies");
        assert_eq!(
            HttpApi::replies_path(&Id::from("a b/c")),
            "/api/messages/a%20b%2Fc/replies"
        );
    }

    #[test]
    fn test_url_joins_base() {
        let api = HttpApi::new(&ApiConfig {
            base_url: "http://localhost:8000/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(api.url("/api/messages"), "http://localhost:8000/api/messages");
    }

    #[test]
    fn test_error_body_uses_server_text() {
        let err = error_from_body(StatusCode::BAD_REQUEST, r#"{"error": "Please fill in all fields"}"#);
        match err {
            AppError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Please fill in all fields");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_error_body_falls_back_to_status() {
        let err = error_from_body(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>");
        match err {
            AppError::Rejected { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Internal Server Error");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_reply_form_builds_with_parent() {
        let reply = NewReply {
            name: "Anna".to_string(),
            email: "anna@example.com".to_string(),
            content: "hi".to_string(),
            parent_id: Some(Id::from(3)),
            image: Some(Attachment {
                file_name: "a.png".to_string(),
                mime: "image/png".to_string(),
                bytes: vec![1, 2, 3],
            }),
            video: None,
        };
        assert!(reply_form(reply).is_ok());
    }
}
