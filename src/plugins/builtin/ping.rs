//! Ping plugin - liveness check

use crate::application::errors::PluginResult;
use crate::domain::entities::{normalize_sender, CommandMetadata};
use crate::plugins::trait_def::{Plugin, PluginScope};

pub struct PingPlugin;

impl Plugin for PingPlugin {
    fn module_id(&self) -> &str {
        "ping"
    }

    fn description(&self) -> &str {
        "Replies to ping"
    }

    fn register(&self, scope: &mut PluginScope) -> PluginResult<()> {
        scope
            .command(
                CommandMetadata::new("ping")
                    .with_description("Check if the bot is alive")
                    .with_category("Core")
                    .public(),
            )
            .handle(|ctx, event| async move {
                let sender = normalize_sender(&event.sender_id);
                if !event.from_me && !ctx.rate_limiter.check(&sender) {
                    tracing::debug!("[{}] Rate limited ping from {}", event.chat_id, sender);
                    return Ok(());
                }
                ctx.reply(&event, "pong").await
            });
        Ok(())
    }
}
