//! AFK plugin - away status with automatic replies

use std::sync::Arc;

use crate::application::errors::PluginResult;
use crate::application::messaging::CommandParser;
use crate::domain::entities::{sender_user, CommandMetadata, Event, EventKind};
use crate::domain::traits::Predicate;
use crate::plugins::trait_def::{Plugin, PluginScope};

const DEFAULT_REASON: &str = "I'm busy right now.";

pub struct AfkPlugin;

impl Plugin for AfkPlugin {
    fn module_id(&self) -> &str {
        "afk"
    }

    fn description(&self) -> &str {
        "Away status and auto replies"
    }

    fn register(&self, scope: &mut PluginScope) -> PluginResult<()> {
        scope
            .command(
                CommandMetadata::new("afk")
                    .with_description("Set AFK status")
                    .with_category("Essentials")
                    .with_usage("[reason]")
                    .owner_only(),
            )
            .handle(|ctx, event| async move {
                let reason = match event.rest().trim() {
                    "" => DEFAULT_REASON.to_string(),
                    reason => reason.to_string(),
                };
                ctx.state.set_afk(true, &reason);
                ctx.reply(&event, &format!("AFK mode enabled\nReason: {}", reason)).await
            });

        // Owner activity that is not a command ends the away period
        let prefixes = scope.context().prefixes.clone();
        let own_plain: Predicate = Arc::new(move |event: &Event| {
            event.from_me && !CommandParser::is_command(&event.body, &prefixes.current())
        });
        scope.listen(EventKind::Message, own_plain, |ctx, event| async move {
            if ctx.state.afk().is_afk {
                ctx.state.set_afk(false, "");
                ctx.reply(&event, "Welcome back! AFK mode disabled.").await?;
            }
            Ok(())
        });

        let from_others: Predicate = Arc::new(|event: &Event| !event.from_me);
        scope.listen(EventKind::Message, from_others, |ctx, event| async move {
            let status = ctx.state.afk();
            if !status.is_afk {
                return Ok(());
            }
            let me = ctx.bot.bot_info();
            let mention = format!("@{}", sender_user(&me.id));
            if !event.is_group || event.body.contains(&mention) {
                ctx.reply(&event, &format!("I am currently AFK\nReason: {}", status.reason)).await?;
            }
            Ok(())
        });

        Ok(())
    }
}
