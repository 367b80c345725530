//! Setprefix plugin - runtime command prefix override

use crate::application::errors::PluginResult;
use crate::domain::entities::CommandMetadata;
use crate::plugins::trait_def::{Plugin, PluginScope};

pub struct SetPrefixPlugin;

impl Plugin for SetPrefixPlugin {
    fn module_id(&self) -> &str {
        "setprefix"
    }

    fn register(&self, scope: &mut PluginScope) -> PluginResult<()> {
        scope
            .command(
                CommandMetadata::new("setprefix")
                    .with_description("Change the command prefix")
                    .with_category("Owner")
                    .with_usage("<prefix> (1-2 characters, 'reset' for the default)")
                    .owner_only(),
            )
            .handle(|ctx, event| async move {
                let Some(prefix) = event.args().first().map(|p| p.to_string()) else {
                    let current = ctx.prefixes.active();
                    return ctx.reply(&event, &format!("Current prefix: {}", current)).await;
                };

                if prefix.eq_ignore_ascii_case("reset") {
                    ctx.state.clear_prefix();
                    let text = format!("Prefix reset to {}", ctx.prefixes.active());
                    return ctx.reply(&event, &text).await;
                }

                let len = prefix.chars().count();
                if !(1..=2).contains(&len) {
                    return ctx.reply(&event, "Prefix must be 1 or 2 characters").await;
                }

                ctx.state.set_prefix(&prefix);
                tracing::info!("Command prefix changed to {}", prefix);
                ctx.reply(&event, &format!("Prefix set to {}", prefix)).await
            });
        Ok(())
    }
}
