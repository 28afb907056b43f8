use anyhow::Result;

use super::{FireContext, Provider, Section};
use crate::llm::{LlmClient, Message};

const SYSTEM_PROMPT: &str = "Ты пишешь короткие шуточные хокку для утренней рассылки в рабочем чате.";

/// A short LLM-written haiku appended after the main sections.
pub struct HaikuProvider {
    llm: Box<dyn LlmClient>,
    prompt: String,
}

impl HaikuProvider {
    pub fn new(llm: Box<dyn LlmClient>, prompt: impl Into<String>) -> Self {
        Self {
            llm,
            prompt: prompt.into(),
        }
    }
}

#[async_trait::async_trait]
impl Provider for HaikuProvider {
    fn name(&self) -> &str {
        "haiku"
    }

    fn section(&self) -> Section {
        Section::Supplement
    }

    async fn fetch(&self, ctx: &FireContext) -> Result<String> {
        let messages = vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(format!("Сегодня {}. {}", ctx.today(), self.prompt)),
        ];
        let haiku = self.llm.chat(messages).await?;
        tracing::info!("Haiku received ({} chars)", haiku.chars().count());
        Ok(format!("*{}*", haiku.trim()))
    }
}
