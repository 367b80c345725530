//! Message handling - Event routing, filters and command parsing

pub mod dispatcher;
pub mod filters;
pub mod parser;

pub use dispatcher::EventBus;
pub use filters::Prefixes;
pub use parser::{CommandParser, ParsedCommand};
