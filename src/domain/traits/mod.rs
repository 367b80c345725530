//! Domain traits - Abstractions for infrastructure implementations

pub mod bot;
pub mod dispatcher;
pub mod store;

pub use bot::{Bot, BotInfo};
pub use dispatcher::{Callback, EventDispatcher, HandlerFuture, HandlerToken, Predicate};
pub use store::StateBackend;
