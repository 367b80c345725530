//! ember-bot - bot runtime core
//!
//! Durable state with local/remote reconciliation, a write-through state
//! cache, and hot-reloadable plugin units.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod plugins;
