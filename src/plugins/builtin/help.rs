//! Help plugin - renders the command index

use crate::application::errors::{BotError, PluginResult};
use crate::domain::entities::CommandMetadata;
use crate::plugins::trait_def::{Plugin, PluginScope};

pub struct HelpPlugin;

fn usage_of(prefix: &str, cmd: &CommandMetadata) -> String {
    let mut out = format!("{}{}", prefix, cmd.name);
    if !cmd.usage.is_empty() {
        out.push(' ');
        out.push_str(&cmd.usage);
    }
    if !cmd.description.is_empty() {
        out.push_str(&format!("\n{}", cmd.description));
    }
    if !cmd.aliases.is_empty() {
        let aliases: Vec<&str> = cmd.aliases.iter().map(String::as_str).collect();
        out.push_str(&format!("\nAliases: {}", aliases.join(", ")));
    }
    out
}

impl Plugin for HelpPlugin {
    fn module_id(&self) -> &str {
        "help"
    }

    fn register(&self, scope: &mut PluginScope) -> PluginResult<()> {
        scope
            .command(
                CommandMetadata::new("help")
                    .with_description("Show available commands")
                    .with_category("Core")
                    .with_aliases(["menu"])
                    .with_usage("[command]")
                    .public(),
            )
            .handle(|ctx, event| async move {
                let manager = ctx
                    .manager()
                    .ok_or_else(|| BotError::Internal("Plugin manager is gone".to_string()))?;
                let prefix = ctx.prefixes.active();

                if let Some(name) = event.args().first().map(|n| n.to_string()) {
                    let text = match manager.command(&name) {
                        Some(cmd) => usage_of(&prefix, &cmd),
                        None => format!("Unknown command: {}", name),
                    };
                    return ctx.reply(&event, &text).await;
                }

                let mut out = String::from("Commands");
                for (category, commands) in manager.commands_by_category() {
                    out.push_str(&format!("\n\n[{}]", category));
                    for cmd in commands {
                        out.push_str(&format!("\n{}{} - {}", prefix, cmd.name, cmd.description));
                    }
                }
                ctx.reply(&event, &out).await
            });
        Ok(())
    }
}
