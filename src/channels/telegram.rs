use anyhow::{Context, Result};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use super::{Channel, OutboundMessage};
use crate::config::TelegramConfig;

const PARSE_MODE: &str = "Markdown";
/// Telegram rejects photo captions longer than this.
const CAPTION_LIMIT: usize = 1024;

/// Sends silent Markdown messages to a single chat through the Bot API.
pub struct TelegramChannel {
    client: Client,
    base_url: String,
    token: String,
    chat_id: String,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_notification: bool,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(config.timeout_secs))
                .build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token)
    }

    async fn send_message(&self, text: &str) -> Result<()> {
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode: PARSE_MODE,
            disable_notification: true,
        };
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&request)
            .send()
            .await
            .context("Failed to call sendMessage")?;
        check_response("sendMessage", response).await
    }

    async fn send_photo(&self, png: &[u8], caption: Option<&str>) -> Result<()> {
        let photo = Part::bytes(png.to_vec())
            .file_name("weather.png")
            .mime_str("image/png")?;
        let mut form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("disable_notification", "true")
            .part("photo", photo);
        if let Some(caption) = caption {
            form = form
                .text("caption", caption.to_string())
                .text("parse_mode", PARSE_MODE);
        }

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .context("Failed to call sendPhoto")?;
        check_response("sendPhoto", response).await
    }
}

async fn check_response(method: &str, response: reqwest::Response) -> Result<()> {
    let status = response.status();
    let body = response
        .text()
        .await
        .with_context(|| format!("Failed to read {method} response"))?;
    tracing::debug!("Telegram {method} response ({status}): {body}");

    match serde_json::from_str::<ApiResponse>(&body) {
        Ok(api) if api.ok && status.is_success() => Ok(()),
        Ok(api) => anyhow::bail!(
            "Telegram {method} failed ({status}): {}",
            api.description.unwrap_or_else(|| "unknown error".to_string())
        ),
        Err(_) => anyhow::bail!("Telegram {method} failed ({status}): {body}"),
    }
}

/// Telegram measures captions in UTF-16 code units.
fn fits_caption(text: &str) -> bool {
    text.encode_utf16().count() <= CAPTION_LIMIT
}

#[async_trait::async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<()> {
        tracing::info!("Sending message to chat {}:\n{}", self.chat_id, msg.text);
        match &msg.image {
            None => self.send_message(&msg.text).await?,
            Some(png) if fits_caption(&msg.text) => {
                self.send_photo(png, Some(&msg.text)).await?
            }
            Some(png) => {
                self.send_photo(png, None).await?;
                self.send_message(&msg.text).await?;
            }
        }
        tracing::info!("Message delivered to chat {}", self.chat_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn channel(server: &MockServer) -> TelegramChannel {
        TelegramChannel::new(&TelegramConfig {
            bot_token: "123:abc".into(),
            chat_id: "-100".into(),
            base_url: server.uri(),
            ..TelegramConfig::default()
        })
        .unwrap()
    }

    fn ok() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true, "result": {}}))
    }

    #[tokio::test]
    async fn test_text_message_is_silent_markdown() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": "-100",
                "text": "*Всем привет!👋*\n",
                "parse_mode": "Markdown",
                "disable_notification": true
            })))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;

        channel(&server)
            .send(&OutboundMessage::text("*Всем привет!👋*\n"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_photo_with_caption() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendPhoto"))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;

        let msg = OutboundMessage {
            text: "hello".into(),
            image: Some(vec![0x89, b'P', b'N', b'G']),
        };
        channel(&server).send(&msg).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("weather.png"));
        assert!(body.contains("name=\"caption\""));
        assert!(body.contains("name=\"disable_notification\""));
    }

    #[tokio::test]
    async fn test_long_text_goes_after_photo() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendPhoto"))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;

        let msg = OutboundMessage {
            text: "x".repeat(CAPTION_LIMIT + 1),
            image: Some(vec![1, 2, 3]),
        };
        channel(&server).send(&msg).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let photo_body = String::from_utf8_lossy(&requests[0].body);
        assert!(!photo_body.contains("name=\"caption\""));
    }

    #[test]
    fn test_caption_limit_counts_utf16_units() {
        assert!(fits_caption(&"x".repeat(CAPTION_LIMIT)));
        // each cake is one char but two UTF-16 units
        let cakes = "🎂".repeat(CAPTION_LIMIT / 2 + 1);
        assert!(cakes.chars().count() <= CAPTION_LIMIT);
        assert!(!fits_caption(&cakes));
    }

    #[tokio::test]
    async fn test_emoji_heavy_text_goes_after_photo() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendPhoto"))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;

        let msg = OutboundMessage {
            text: "🎂".repeat(CAPTION_LIMIT / 2 + 1),
            image: Some(vec![1, 2, 3]),
        };
        channel(&server).send(&msg).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let photo_body = String::from_utf8_lossy(&requests[0].body);
        assert!(!photo_body.contains("name=\"caption\""));
    }

    #[tokio::test]
    async fn test_api_error_carries_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let err = channel(&server)
            .send(&OutboundMessage::text("hi"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("chat not found"));
    }

    #[tokio::test]
    async fn test_non_json_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        assert!(channel(&server).send(&OutboundMessage::text("hi")).await.is_err());
    }
}
