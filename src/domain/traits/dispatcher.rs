use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::application::errors::{BotError, PluginResult};
use crate::domain::entities::{Event, EventKind};

/// Synchronous event filter
pub type Predicate = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// Future returned by a handler callback
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), BotError>> + Send>>;

/// Handler callback invoked with the matching event
pub type Callback = Arc<dyn Fn(Event) -> HandlerFuture + Send + Sync>;

/// Opaque handle identifying one registered handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerToken(pub u64);

impl fmt::Display for HandlerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// EventDispatcher trait - registration surface of the host messaging engine
pub trait EventDispatcher: Send + Sync {
    /// Register a predicate/callback pair for an event kind
    fn on(&self, kind: EventKind, predicate: Predicate, callback: Callback) -> PluginResult<HandlerToken>;

    /// Deregister exactly the handler identified by `token`
    fn off(&self, token: HandlerToken) -> PluginResult<()>;
}
