//! Notes plugin - keyword notes stored in bot state

use crate::application::errors::PluginResult;
use crate::domain::entities::CommandMetadata;
use crate::plugins::trait_def::{Plugin, PluginScope};

pub struct NotesPlugin;

impl Plugin for NotesPlugin {
    fn module_id(&self) -> &str {
        "notes"
    }

    fn description(&self) -> &str {
        "Save and recall notes"
    }

    fn register(&self, scope: &mut PluginScope) -> PluginResult<()> {
        scope
            .command(
                CommandMetadata::new("save")
                    .with_description("Save a note")
                    .with_category("Notes")
                    .with_usage("<keyword> <text>"),
            )
            .handle(|ctx, event| async move {
                let rest = event.rest().trim();
                let Some((keyword, content)) = rest.split_once(char::is_whitespace) else {
                    return ctx.reply(&event, "Usage: save <keyword> <text>").await;
                };
                let keyword = keyword.to_lowercase();
                ctx.state.set_note(&keyword, content.trim());
                ctx.reply(&event, &format!("Note '{}' saved", keyword)).await
            });

        scope
            .command(
                CommandMetadata::new("get")
                    .with_description("Recall a note")
                    .with_category("Notes")
                    .with_aliases(["note"])
                    .with_usage("<keyword>"),
            )
            .handle(|ctx, event| async move {
                let Some(keyword) = event.args().first().map(|k| k.to_lowercase()) else {
                    return ctx.reply(&event, "Usage: get <keyword>").await;
                };
                match ctx.state.get_note(&keyword) {
                    Some(content) => ctx.reply(&event, &content).await,
                    None => ctx.reply(&event, &format!("No note named '{}'", keyword)).await,
                }
            });

        scope
            .command(
                CommandMetadata::new("delnote")
                    .with_description("Delete a note")
                    .with_category("Notes")
                    .with_usage("<keyword>"),
            )
            .handle(|ctx, event| async move {
                let Some(keyword) = event.args().first().map(|k| k.to_lowercase()) else {
                    return ctx.reply(&event, "Usage: delnote <keyword>").await;
                };
                let text = if ctx.state.delete_note(&keyword) {
                    format!("Note '{}' deleted", keyword)
                } else {
                    format!("No note named '{}'", keyword)
                };
                ctx.reply(&event, &text).await
            });

        scope
            .command(
                CommandMetadata::new("notes")
                    .with_description("List saved notes")
                    .with_category("Notes"),
            )
            .handle(|ctx, event| async move {
                let notes = ctx.state.notes();
                if notes.is_empty() {
                    return ctx.reply(&event, "No notes saved").await;
                }
                let list: Vec<String> = notes.keys().map(|k| format!("- {}", k)).collect();
                ctx.reply(&event, &format!("Saved notes:\n{}", list.join("\n"))).await
            });

        Ok(())
    }
}
