//! Config plugin - dynamic configuration flags stored in bot state

use serde_json::Value;

use crate::application::errors::PluginResult;
use crate::domain::entities::CommandMetadata;
use crate::plugins::trait_def::{Plugin, PluginScope};

pub struct ConfigPlugin;

/// Typed value for a raw argument: switches become booleans, numerals numbers
pub fn parse_value(raw: &str) -> Value {
    match raw.to_lowercase().as_str() {
        "on" | "true" => return Value::Bool(true),
        "off" | "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    Value::String(raw.to_string())
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Plugin for ConfigPlugin {
    fn module_id(&self) -> &str {
        "config"
    }

    fn description(&self) -> &str {
        "Runtime configuration flags"
    }

    fn register(&self, scope: &mut PluginScope) -> PluginResult<()> {
        scope
            .command(
                CommandMetadata::new("setcfg")
                    .with_description("Set a dynamic config value")
                    .with_category("Owner")
                    .with_usage("<KEY> <value>")
                    .owner_only(),
            )
            .handle(|ctx, event| async move {
                let rest = event.rest().trim();
                let Some((key, raw)) = rest.split_once(char::is_whitespace) else {
                    return ctx.reply(&event, "Usage: setcfg <KEY> <value>").await;
                };
                let key = key.to_uppercase();
                let value = parse_value(raw.trim());
                let text = format!("{} = {}", key, render(&value));
                ctx.state.set_config(&key, value);
                ctx.reply(&event, &text).await
            });

        scope
            .command(
                CommandMetadata::new("getcfg")
                    .with_description("Show a dynamic config value")
                    .with_category("Owner")
                    .with_usage("<KEY>")
                    .owner_only(),
            )
            .handle(|ctx, event| async move {
                let Some(key) = event.args().first().map(|k| k.to_uppercase()) else {
                    return ctx.reply(&event, "Usage: getcfg <KEY>").await;
                };
                let text = match ctx.state.config_value(&key) {
                    Some(value) => format!("{} = {}", key, render(&value)),
                    None => format!("{} is not set", key),
                };
                ctx.reply(&event, &text).await
            });

        scope
            .command(
                CommandMetadata::new("delcfg")
                    .with_description("Remove a dynamic config value")
                    .with_category("Owner")
                    .with_usage("<KEY>")
                    .owner_only(),
            )
            .handle(|ctx, event| async move {
                let Some(key) = event.args().first().map(|k| k.to_uppercase()) else {
                    return ctx.reply(&event, "Usage: delcfg <KEY>").await;
                };
                let text = if ctx.state.delete_config(&key) {
                    format!("{} removed", key)
                } else {
                    format!("{} is not set", key)
                };
                ctx.reply(&event, &text).await
            });

        scope
            .command(
                CommandMetadata::new("configs")
                    .with_description("List dynamic config values")
                    .with_category("Owner")
                    .owner_only(),
            )
            .handle(|ctx, event| async move {
                let configs = ctx.state.get_all_configs();
                if configs.is_empty() {
                    return ctx.reply(&event, "No dynamic config values").await;
                }
                let lines: Vec<String> = configs
                    .iter()
                    .map(|(k, v)| format!("{} = {}", k, render(v)))
                    .collect();
                ctx.reply(&event, &lines.join("\n")).await
            });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_switches_and_numbers() {
        assert_eq!(parse_value("ON"), json!(true));
        assert_eq!(parse_value("false"), json!(false));
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value("1.5"), json!(1.5));
        assert_eq!(parse_value("hello"), json!("hello"));
        assert_eq!(parse_value("NaN"), json!("NaN"));
    }
}
