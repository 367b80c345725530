//! Sudo plugin - manage the privileged-user list

use crate::application::errors::PluginResult;
use crate::domain::entities::{normalize_sender, CommandMetadata, Event};
use crate::plugins::trait_def::{Plugin, PluginScope};

pub struct SudoPlugin;

/// Target user from the first argument, normalized; bare numbers keep no host
fn target(event: &Event) -> Option<String> {
    event.args().first().map(|id| normalize_sender(id.trim_start_matches('@')))
}

impl Plugin for SudoPlugin {
    fn module_id(&self) -> &str {
        "sudo"
    }

    fn description(&self) -> &str {
        "Privileged user management"
    }

    fn register(&self, scope: &mut PluginScope) -> PluginResult<()> {
        scope
            .command(
                CommandMetadata::new("addsudo")
                    .with_description("Grant privileged access")
                    .with_category("Owner")
                    .with_usage("<user_id>")
                    .owner_only(),
            )
            .handle(|ctx, event| async move {
                let Some(user) = target(&event) else {
                    return ctx.reply(&event, "Usage: addsudo <user_id>").await;
                };
                let text = if ctx.state.add_sudo(&user) {
                    format!("{} is now a sudo user", user)
                } else {
                    format!("{} is already a sudo user", user)
                };
                ctx.reply(&event, &text).await
            });

        scope
            .command(
                CommandMetadata::new("delsudo")
                    .with_description("Revoke privileged access")
                    .with_category("Owner")
                    .with_usage("<user_id>")
                    .owner_only(),
            )
            .handle(|ctx, event| async move {
                let Some(user) = target(&event) else {
                    return ctx.reply(&event, "Usage: delsudo <user_id>").await;
                };
                let text = if ctx.state.remove_sudo(&user) {
                    format!("{} removed from sudo users", user)
                } else {
                    format!("{} is not a sudo user", user)
                };
                ctx.reply(&event, &text).await
            });

        scope
            .command(
                CommandMetadata::new("sudolist")
                    .with_description("List sudo users")
                    .with_category("Owner")
                    .owner_only(),
            )
            .handle(|ctx, event| async move {
                let users = ctx.state.sudo_users();
                if users.is_empty() {
                    return ctx.reply(&event, "No sudo users").await;
                }
                ctx.reply(&event, &format!("Sudo users:\n{}", users.join("\n"))).await
            });

        Ok(())
    }
}
