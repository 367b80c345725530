//! Built-in plugin units

mod afk;
mod config;
mod help;
mod notes;
mod ping;
mod pmpermit;
mod setprefix;
mod sudo;
mod system;

pub use afk::AfkPlugin;
pub use config::{parse_value, ConfigPlugin};
pub use help::HelpPlugin;
pub use notes::NotesPlugin;
pub use ping::PingPlugin;
pub use pmpermit::{PmPermitPlugin, PM_PROTECTION};
pub use setprefix::SetPrefixPlugin;
pub use sudo::SudoPlugin;
pub use system::SystemPlugin;

use crate::infrastructure::config::PluginConfig;
use super::registry::PluginCatalog;

/// Catalog with every built-in unit, honouring the disabled list
pub fn default_catalog(config: &PluginConfig) -> PluginCatalog {
    let catalog = PluginCatalog::new().with_disabled(config.disabled.iter().cloned());
    catalog.add(AfkPlugin);
    catalog.add(ConfigPlugin);
    catalog.add(HelpPlugin);
    catalog.add(NotesPlugin);
    catalog.add(PingPlugin);
    catalog.add(PmPermitPlugin);
    catalog.add(SetPrefixPlugin);
    catalog.add(SudoPlugin);
    catalog.add(SystemPlugin);
    catalog
}
