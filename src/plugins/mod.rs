//! Plugin system for ember-bot
//! 
//! Plugin units declare handlers through a pure registration function;
//! the manager attaches them to the dispatcher and can detach them again.

pub mod builtin;
pub mod manager;
pub mod registry;
pub mod trait_def;

pub use manager::{LoadSummary, PluginDescriptor, PluginManager, PluginState};
pub use registry::PluginCatalog;
pub use trait_def::{CommandBuilder, HandlerDescriptor, Plugin, PluginContext, PluginScope};
