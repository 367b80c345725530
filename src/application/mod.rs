//! Application layer - Use cases and business logic
//! 
//! This layer contains:
//! - State: The cached runtime state shared by plugins
//! - Services: Rate limiting and error reporting for plugins
//! - Errors: Domain-specific errors
//! - Messaging: Event routing, filters, command parsing

pub mod errors;
pub mod messaging;
pub mod services;
pub mod state;
