//! System plugin - plugin management commands

use std::sync::Arc;

use crate::application::errors::{BotError, PluginResult};
use crate::domain::entities::CommandMetadata;
use crate::plugins::manager::PluginManager;
use crate::plugins::trait_def::{Plugin, PluginContext, PluginScope};

pub struct SystemPlugin;

fn manager(ctx: &PluginContext) -> Result<Arc<PluginManager>, BotError> {
    ctx.manager()
        .ok_or_else(|| BotError::Internal("Plugin manager is gone".to_string()))
}

impl Plugin for SystemPlugin {
    fn module_id(&self) -> &str {
        "system"
    }

    fn description(&self) -> &str {
        "Plugin management"
    }

    fn register(&self, scope: &mut PluginScope) -> PluginResult<()> {
        scope
            .command(
                CommandMetadata::new("reload")
                    .with_description("Reload every plugin")
                    .with_category("System")
                    .owner_only(),
            )
            .handle(|ctx, event| async move {
                let summary = manager(&ctx)?.reload_all();
                if !summary.is_success() {
                    let failure = summary.render();
                    ctx.reporter.report(&failure, "Plugin reload").await;
                }
                ctx.reply(&event, &summary.render()).await
            });

        scope
            .command(
                CommandMetadata::new("load")
                    .with_description("Load or reload one plugin")
                    .with_category("System")
                    .with_usage("<module>")
                    .owner_only(),
            )
            .handle(|ctx, event| async move {
                let Some(module_id) = event.args().first().map(|m| m.to_string()) else {
                    return ctx.reply(&event, "Usage: load <module>").await;
                };
                let text = match manager(&ctx)?.try_load(&module_id) {
                    Ok(count) => format!("Loaded {} ({} handlers)", module_id, count),
                    Err(e) => format!("Failed to load {}: {}", module_id, e),
                };
                ctx.reply(&event, &text).await
            });

        scope
            .command(
                CommandMetadata::new("unload")
                    .with_description("Unload one plugin")
                    .with_category("System")
                    .with_usage("<module>")
                    .owner_only(),
            )
            .handle(|ctx, event| async move {
                let Some(module_id) = event.args().first().map(|m| m.to_string()) else {
                    return ctx.reply(&event, "Usage: unload <module>").await;
                };
                let text = if manager(&ctx)?.unload(&module_id) {
                    format!("Unloaded {}", module_id)
                } else {
                    format!("{} is not loaded", module_id)
                };
                ctx.reply(&event, &text).await
            });

        scope
            .command(
                CommandMetadata::new("plugins")
                    .with_description("List available plugins")
                    .with_category("System")
                    .owner_only(),
            )
            .handle(|ctx, event| async move {
                let manager = manager(&ctx)?;
                let lines: Vec<String> = manager
                    .catalog()
                    .discover()
                    .into_iter()
                    .map(|id| {
                        let mark = if manager.is_loaded(&id) { "+" } else { "-" };
                        format!("{} {}", mark, id)
                    })
                    .collect();
                ctx.reply(&event, &format!("Plugins:\n{}", lines.join("\n"))).await
            });

        Ok(())
    }
}
