//! Event filters - composable predicates applied before any handler runs

use std::sync::Arc;

use super::parser::CommandParser;
use crate::application::state::StateManager;
use crate::domain::entities::{normalize_sender, sender_user, AccessLevel, Event};
use crate::domain::traits::Predicate;

/// Logical AND of every predicate, evaluated left to right
pub fn all_of(predicates: Vec<Predicate>) -> Predicate {
    Arc::new(move |event: &Event| predicates.iter().all(|p| p(event)))
}

pub fn any_event() -> Predicate {
    Arc::new(|_: &Event| true)
}

/// Rejects events timestamped before `boot_time`
pub fn boot_filter(boot_time: i64) -> Predicate {
    Arc::new(move |event: &Event| event.timestamp >= boot_time)
}

/// Configured owner or the bot's own account
pub fn is_owner(event: &Event, owner_id: Option<&str>) -> bool {
    if event.from_me {
        return true;
    }
    let sender = if event.sender_id.is_empty() { &event.chat_id } else { &event.sender_id };
    if sender.is_empty() {
        return false;
    }
    match owner_id {
        Some(owner) => sender_user(sender) == sender_user(owner),
        None => false,
    }
}

/// Owner, own account, or a privileged user
pub fn is_authorized(event: &Event, owner_id: Option<&str>, state: &StateManager) -> bool {
    if is_owner(event, owner_id) {
        return true;
    }
    !event.sender_id.is_empty() && state.is_sudo(&normalize_sender(&event.sender_id))
}

/// Authorization predicate for an access level
pub fn access_filter(level: AccessLevel, owner_id: Option<String>, state: Arc<StateManager>) -> Predicate {
    match level {
        AccessLevel::Owner => Arc::new(move |event: &Event| is_owner(event, owner_id.as_deref())),
        AccessLevel::Privileged => {
            Arc::new(move |event: &Event| is_authorized(event, owner_id.as_deref(), &state))
        }
        AccessLevel::Public => any_event(),
    }
}

/// Command prefixes, resolved per event so runtime overrides apply immediately
#[derive(Clone)]
pub struct Prefixes {
    state: Arc<StateManager>,
    primary: String,
    extras: Vec<String>,
}

impl Prefixes {
    pub fn new(state: Arc<StateManager>, primary: impl Into<String>, extras: Vec<String>) -> Self {
        Self {
            state,
            primary: primary.into(),
            extras,
        }
    }

    /// Active prefix (runtime override or configured primary) followed by the extras
    pub fn current(&self) -> Vec<String> {
        let mut prefixes = vec![self.state.prefix_or(&self.primary)];
        for extra in &self.extras {
            if !prefixes.contains(extra) {
                prefixes.push(extra.clone());
            }
        }
        prefixes
    }

    pub fn active(&self) -> String {
        self.state.prefix_or(&self.primary)
    }
}

/// Matches bodies invoking one of `names` under the current prefixes
pub fn command_filter(names: Vec<String>, prefixes: Prefixes) -> Predicate {
    Arc::new(move |event: &Event| {
        CommandParser::parse(&event.body, &prefixes.current())
            .map(|cmd| names.iter().any(|n| *n == cmd.name))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::{MemoryBackend, StateStore};

    fn state() -> Arc<StateManager> {
        let store = StateStore::new(Arc::new(MemoryBackend::new("local")));
        Arc::new(StateManager::new(Arc::new(store)))
    }

    #[tokio::test]
    async fn boot_filter_rejects_strictly_older_events() {
        let filter = boot_filter(100);
        assert!(!filter(&Event::message("c", "s", ".ping").with_timestamp(99)));
        assert!(filter(&Event::message("c", "s", ".ping").with_timestamp(100)));
        assert!(filter(&Event::message("c", "s", ".ping").with_timestamp(101)));
    }

    #[tokio::test]
    async fn owner_matches_user_part_or_self() {
        let owner = Some("628123");
        assert!(is_owner(&Event::message("c", "628123:2@s.example", "x"), owner));
        assert!(is_owner(&Event::message("c", "999@s.example", "x").from_me(), owner));
        assert!(!is_owner(&Event::message("c", "999@s.example", "x"), owner));
        assert!(!is_owner(&Event::message("c", "628123@s.example", "x"), None));
    }

    #[tokio::test]
    async fn access_levels() {
        let state = state();
        state.add_sudo("555@s.example");
        let owner = Some("1".to_string());

        let sudo_event = Event::message("c", "555:3@s.example", ".x");
        let stranger = Event::message("c", "777@s.example", ".x");

        let owner_only = access_filter(AccessLevel::Owner, owner.clone(), state.clone());
        let privileged = access_filter(AccessLevel::Privileged, owner.clone(), state.clone());
        let public = access_filter(AccessLevel::Public, owner, state);

        assert!(!owner_only(&sudo_event));
        assert!(privileged(&sudo_event));
        assert!(!privileged(&stranger));
        assert!(public(&stranger));
    }

    #[tokio::test]
    async fn command_filter_follows_prefix_override() {
        let state = state();
        let prefixes = Prefixes::new(state.clone(), ".", vec!["!".to_string()]);
        let filter = command_filter(vec!["ping".to_string(), "p".to_string()], prefixes);

        assert!(filter(&Event::message("c", "s", ".ping")));
        assert!(filter(&Event::message("c", "s", "!P now")));
        assert!(!filter(&Event::message("c", "s", ".pingpong")));
        assert!(!filter(&Event::message("c", "s", "#ping")));

        state.set_prefix("#");
        assert!(filter(&Event::message("c", "s", "#ping")));
        assert!(!filter(&Event::message("c", "s", ".ping")));
        assert!(filter(&Event::message("c", "s", "!ping")));
    }

    #[tokio::test]
    async fn all_of_requires_every_predicate() {
        let combined = all_of(vec![any_event(), boot_filter(10)]);
        assert!(combined(&Event::message("c", "s", "x").with_timestamp(10)));
        assert!(!combined(&Event::message("c", "s", "x").with_timestamp(9)));
    }
}
