use chrono::Utc;

/// Kind of event delivered by the host messaging engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Message,
    Ready,
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Message => "message",
            EventKind::Ready => "ready",
        }
    }
}

/// Represents an inbound event from the host
#[derive(Debug, Clone)]
pub struct Event {
    pub id: String,
    pub kind: EventKind,
    /// Unix timestamp (seconds) assigned by the host
    pub timestamp: i64,
    pub sender_id: String,
    pub chat_id: String,
    pub body: String,
    /// Sent by the bot's own account
    pub from_me: bool,
    pub is_group: bool,
}

impl Event {
    pub fn new(kind: EventKind, chat_id: impl Into<String>, sender_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            timestamp: Utc::now().timestamp(),
            sender_id: sender_id.into(),
            chat_id: chat_id.into(),
            body: String::new(),
            from_me: false,
            is_group: false,
        }
    }

    pub fn message(chat_id: impl Into<String>, sender_id: impl Into<String>, body: impl Into<String>) -> Self {
        let mut event = Self::new(EventKind::Message, chat_id, sender_id);
        event.body = body.into();
        event
    }

    pub fn ready() -> Self {
        Self::new(EventKind::Ready, "", "")
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn from_me(mut self) -> Self {
        self.from_me = true;
        self
    }

    pub fn in_group(mut self) -> Self {
        self.is_group = true;
        self
    }

    /// Whitespace-separated words after the command word
    pub fn args(&self) -> Vec<&str> {
        self.body.split_whitespace().skip(1).collect()
    }

    /// Everything after the command word, trimmed
    pub fn rest(&self) -> &str {
        let body = self.body.trim_start();
        match body.find(char::is_whitespace) {
            Some(idx) => body[idx..].trim(),
            None => "",
        }
    }
}

/// Strip a device marker from a sender id (`123:4@host` -> `123@host`)
pub fn normalize_sender(id: &str) -> String {
    match id.split_once('@') {
        Some((user, host)) => {
            let user = user.split(':').next().unwrap_or(user);
            format!("{}@{}", user, host)
        }
        None => id.split(':').next().unwrap_or(id).to_string(),
    }
}

/// User part of a sender id (`123@host` -> `123`)
pub fn sender_user(id: &str) -> &str {
    let user = id.split('@').next().unwrap_or(id);
    user.split(':').next().unwrap_or(user)
}
