//! Domain layer - Core types shared by every other layer
//! 
//! This layer contains:
//! - Entities: Events, state records, command metadata
//! - Traits: Abstractions for infrastructure (StateBackend, EventDispatcher, Bot)

pub mod entities;
pub mod traits;
