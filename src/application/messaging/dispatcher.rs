//! Event bus - in-process host dispatcher routing events to registered handlers

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::application::errors::{PluginError, PluginResult};
use crate::domain::entities::{Event, EventKind};
use crate::domain::traits::{Callback, EventDispatcher, HandlerToken, Predicate};

struct Registration {
    token: HandlerToken,
    kind: EventKind,
    predicate: Predicate,
    callback: Callback,
}

/// Handler table keyed by token, kept in registration order
pub struct EventBus {
    handlers: RwLock<Vec<Registration>>,
    next_token: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Number of live handlers
    pub fn len(&self) -> usize {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Route an event; returns how many handlers were invoked.
    ///
    /// Every predicate is evaluated before any callback runs, so handlers that
    /// register or deregister while the event is in flight do not change who sees it.
    pub async fn dispatch(&self, event: Event) -> usize {
        let matched: Vec<(HandlerToken, Callback)> = {
            let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
            handlers
                .iter()
                .filter(|h| h.kind == event.kind && (h.predicate)(&event))
                .map(|h| (h.token, h.callback.clone()))
                .collect()
        };

        tracing::debug!(
            "[{}] {} event matched {} handler(s)",
            event.chat_id,
            event.kind.as_str(),
            matched.len()
        );

        for (token, callback) in &matched {
            if let Err(e) = callback(event.clone()).await {
                tracing::warn!("[{}] Handler {} failed: {}", event.chat_id, token, e);
            }
        }

        matched.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher for EventBus {
    fn on(&self, kind: EventKind, predicate: Predicate, callback: Callback) -> PluginResult<HandlerToken> {
        let token = HandlerToken(self.next_token.fetch_add(1, Ordering::SeqCst));
        let mut handlers = self
            .handlers
            .write()
            .map_err(|_| PluginError::Dispatcher("Lock poisoned".to_string()))?;
        handlers.push(Registration {
            token,
            kind,
            predicate,
            callback,
        });
        Ok(token)
    }

    fn off(&self, token: HandlerToken) -> PluginResult<()> {
        let mut handlers = self
            .handlers
            .write()
            .map_err(|_| PluginError::Dispatcher("Lock poisoned".to_string()))?;
        let before = handlers.len();
        handlers.retain(|h| h.token != token);
        if handlers.len() == before {
            return Err(PluginError::UnknownToken(token.0));
        }
        Ok(())
    }
}
