//! Error reporter - logs plugin failures and alerts the owner

use std::fmt::Display;
use std::sync::Arc;

use crate::domain::traits::Bot;

const MAX_ERROR_CHARS: usize = 500;

/// Sends failure reports to the owner's chat
pub struct ErrorReporter {
    bot: Arc<dyn Bot>,
    owner_chat: Option<String>,
}

impl ErrorReporter {
    pub fn new(bot: Arc<dyn Bot>, owner_chat: Option<String>) -> Self {
        Self { bot, owner_chat }
    }

    /// Log the error and forward it to the owner; true if the alert was delivered
    pub async fn report(&self, err: &(dyn Display + Sync), context: &str) -> bool {
        tracing::error!("{}: {}", context, err);

        let Some(chat) = &self.owner_chat else {
            return false;
        };

        let text: String = err.to_string().chars().take(MAX_ERROR_CHARS).collect();
        let report = format!("*System Alert*\n\n*Context:* `{}`\n*Error:* {}", context, text);

        match self.bot.send_message(chat, &report).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Failed to deliver error report: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::errors::BotError;
    use crate::domain::traits::BotInfo;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Bot for Outbox {
        async fn send_message(&self, chat_id: &str, text: &str) -> Result<String, BotError> {
            self.sent.lock().unwrap().push((chat_id.to_string(), text.to_string()));
            Ok("1".to_string())
        }

        fn bot_info(&self) -> BotInfo {
            BotInfo {
                id: "bot".to_string(),
                name: "bot".to_string(),
                username: "bot".to_string(),
            }
        }
    }

    #[tokio::test]
    async fn reports_to_owner_chat() {
        let outbox = Arc::new(Outbox::default());
        let reporter = ErrorReporter::new(outbox.clone(), Some("owner@x".to_string()));

        assert!(reporter.report(&"disk full", "Command save failed").await);
        let sent = outbox.sent.lock().unwrap();
        assert_eq!(sent[0].0, "owner@x");
        assert!(sent[0].1.contains("Command save failed"));
        assert!(sent[0].1.contains("disk full"));
    }

    #[tokio::test]
    async fn without_owner_only_logs() {
        let outbox = Arc::new(Outbox::default());
        let reporter = ErrorReporter::new(outbox.clone(), None);
        assert!(!reporter.report(&"boom", "ctx").await);
        assert!(outbox.sent.lock().unwrap().is_empty());
    }
}
