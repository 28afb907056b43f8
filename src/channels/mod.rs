pub mod console;
pub mod telegram;

use anyhow::Result;

#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub text: String,
    /// PNG attachment sent alongside the text.
    pub image: Option<Vec<u8>>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }
}

#[async_trait::async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, msg: &OutboundMessage) -> Result<()>;
}
