//! Domain entities - Core business objects with no external dependencies

pub mod command;
pub mod event;
pub mod record;

pub use command::{AccessLevel, CommandIndex, CommandMetadata};
pub use event::{normalize_sender, sender_user, Event, EventKind};
pub use record::{unix_now, StateRecord};
