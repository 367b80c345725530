//! PM permit plugin - guards private chats from unapproved senders

use std::sync::Arc;

use crate::application::errors::PluginResult;
use crate::application::messaging::filters;
use crate::domain::entities::{normalize_sender, CommandMetadata, Event, EventKind};
use crate::domain::traits::Predicate;
use crate::plugins::trait_def::{Plugin, PluginContext, PluginScope};

/// Dynamic flag; overrides `security.pm-protection` when set
pub const PM_PROTECTION: &str = "PM_PROTECTION";

pub struct PmPermitPlugin;

fn target(event: &Event) -> Option<String> {
    event.args().first().map(|id| normalize_sender(id.trim_start_matches('@')))
}

pub fn protection_enabled(ctx: &PluginContext) -> bool {
    ctx.state.config_flag(PM_PROTECTION, ctx.config.security.pm_protection)
}

impl Plugin for PmPermitPlugin {
    fn module_id(&self) -> &str {
        "pmpermit"
    }

    fn description(&self) -> &str {
        "Private message protection"
    }

    fn register(&self, scope: &mut PluginScope) -> PluginResult<()> {
        scope
            .command(
                CommandMetadata::new("approve")
                    .with_description("Permit a user to message privately")
                    .with_category("Owner")
                    .with_aliases(["permit"])
                    .with_usage("<user_id>")
                    .owner_only(),
            )
            .handle(|ctx, event| async move {
                let Some(user) = target(&event).or_else(|| {
                    (!event.is_group).then(|| normalize_sender(&event.chat_id))
                }) else {
                    return ctx.reply(&event, "Usage: approve <user_id>").await;
                };
                ctx.state.permit_user(&user);
                ctx.state.reset_warnings(&user);
                ctx.reply(&event, &format!("{} has been permitted", user)).await
            });

        scope
            .command(
                CommandMetadata::new("disapprove")
                    .with_description("Revoke private message permission")
                    .with_category("Owner")
                    .with_aliases(["deny"])
                    .with_usage("<user_id>")
                    .owner_only(),
            )
            .handle(|ctx, event| async move {
                let Some(user) = target(&event) else {
                    return ctx.reply(&event, "Usage: disapprove <user_id>").await;
                };
                let text = if ctx.state.deny_user(&user) {
                    format!("{} access has been revoked", user)
                } else {
                    format!("{} was not permitted", user)
                };
                ctx.reply(&event, &text).await
            });

        let private_from_others: Predicate = Arc::new(|event: &Event| !event.from_me && !event.is_group);
        scope.listen(EventKind::Message, private_from_others, |ctx, event| async move {
            if !protection_enabled(&ctx) {
                return Ok(());
            }
            let sender = normalize_sender(&event.sender_id);
            if sender.is_empty()
                || filters::is_authorized(&event, ctx.owner_id(), &ctx.state)
                || ctx.state.is_permitted(&sender)
            {
                return Ok(());
            }

            let limit = ctx.config.security.pm_warn_limit;
            let count = ctx.state.add_warning(&sender);
            tracing::debug!("[{}] PM warning {}/{} for {}", event.chat_id, count, limit, sender);

            if count < limit {
                let text = format!(
                    "This account is protected. Please wait for approval.\nWarning {}/{}",
                    count, limit
                );
                ctx.reply(&event, &text).await
            } else if count == limit {
                ctx.reply(&event, "Warning limit reached. Further messages are ignored.").await
            } else {
                Ok(())
            }
        });

        Ok(())
    }
}
