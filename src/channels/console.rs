use anyhow::Result;

use super::{Channel, OutboundMessage};

/// Prints messages to stdout instead of delivering them.
pub struct ConsoleChannel;

#[async_trait::async_trait]
impl Channel for ConsoleChannel {
    fn name(&self) -> &str {
        "console"
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<()> {
        println!("\n{}", msg.text);
        if let Some(image) = &msg.image {
            println!("[weather card attached: {} bytes]", image.len());
        }
        Ok(())
    }
}
