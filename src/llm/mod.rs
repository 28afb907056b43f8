pub mod openai_compatible;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::HaikuConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, messages: Vec<Message>) -> Result<String>;
}

pub fn create_client(config: &HaikuConfig) -> Result<Box<dyn LlmClient>> {
    Ok(Box::new(openai_compatible::OpenAICompatibleClient::new(
        config,
    )?))
}
