//! Console adapter for development/testing

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::application::errors::BotError;
use crate::domain::entities::Event;
use crate::domain::traits::{Bot, BotInfo};

pub const CONSOLE_CHAT: &str = "console";

/// Console bot adapter for local development
pub struct ConsoleAdapter {
    info: BotInfo,
    user_id: String,
    as_self: bool,
}

impl ConsoleAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: BotInfo {
                id: "console@local".to_string(),
                name: name.into(),
                username: "console".to_string(),
            },
            user_id: "console@local".to_string(),
            as_self: true,
        }
    }

    /// Type as `user_id` instead of as the bot's own account
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self.as_self = false;
        self
    }

    /// Turn one input line into a message event
    pub fn event_for(&self, line: &str) -> Event {
        let event = Event::message(CONSOLE_CHAT, self.user_id.clone(), line);
        if self.as_self {
            event.from_me()
        } else {
            event
        }
    }

    /// Read stdin until EOF, forwarding each non-empty line as an event
    pub async fn listen(&self, events: mpsc::UnboundedSender<Event>) -> Result<(), BotError> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| BotError::Internal(format!("stdin: {}", e)))?
        {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if events.send(self.event_for(line)).is_err() {
                break;
            }
        }
        tracing::info!("Console input closed");
        Ok(())
    }
}

impl Default for ConsoleAdapter {
    fn default() -> Self {
        Self::new("ember-bot")
    }
}

#[async_trait]
impl Bot for ConsoleAdapter {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<String, BotError> {
        println!("[BOT -> {}] {}", chat_id, text);
        Ok("console_msg".to_string())
    }

    fn bot_info(&self) -> BotInfo {
        self.info.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_carry_console_identity() {
        let adapter = ConsoleAdapter::default();
        let event = adapter.event_for(".ping");
        assert!(event.from_me);
        assert_eq!(event.chat_id, CONSOLE_CHAT);

        let adapter = ConsoleAdapter::default().with_user("628123@s.example");
        let event = adapter.event_for("hi");
        assert!(!event.from_me);
        assert_eq!(event.sender_id, "628123@s.example");
        assert!(!event.is_group);
    }
}
