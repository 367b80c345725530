//! Plugin lifecycle integration tests
//! Run with: cargo test --test plugin_lifecycle_test

use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;

use ember_bot::application::errors::{BotError, PluginResult};
use ember_bot::application::messaging::EventBus;
use ember_bot::application::state::StateManager;
use ember_bot::domain::entities::{CommandMetadata, Event};
use ember_bot::domain::traits::{Bot, BotInfo};
use ember_bot::infrastructure::config::Config;
use ember_bot::infrastructure::database::{MemoryBackend, StateStore};
use ember_bot::plugins::builtin::{self, AfkPlugin, PingPlugin};
use ember_bot::plugins::{Plugin, PluginCatalog, PluginContext, PluginManager, PluginScope, PluginState};

static INIT: Once = Once::new();

fn ensure_init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

const OWNER: &str = "100@s.example";
const BOOT: i64 = 1_000;

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<(String, String)>>,
}

impl Outbox {
    fn take(&self) -> Vec<String> {
        self.sent.lock().unwrap().drain(..).map(|(_, text)| text).collect()
    }
}

#[async_trait]
impl Bot for Outbox {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<String, BotError> {
        self.sent.lock().unwrap().push((chat_id.to_string(), text.to_string()));
        Ok("sent".to_string())
    }

    fn bot_info(&self) -> BotInfo {
        BotInfo {
            id: "999@s.example".to_string(),
            name: "ember".to_string(),
            username: "ember".to_string(),
        }
    }
}

struct Harness {
    bus: Arc<EventBus>,
    manager: Arc<PluginManager>,
    state: Arc<StateManager>,
    outbox: Arc<Outbox>,
}

fn harness(catalog: PluginCatalog) -> Harness {
    ensure_init();

    let mut config = Config::default();
    config.bot.owner_id = Some(OWNER.to_string());
    config.security.pm_warn_limit = 2;

    let store = StateStore::new(Arc::new(MemoryBackend::new("local")));
    let state = Arc::new(StateManager::new(Arc::new(store)));
    let outbox = Arc::new(Outbox::default());
    let context = PluginContext::new(state.clone(), Arc::new(config), outbox.clone()).with_boot_time(BOOT);

    let bus = Arc::new(EventBus::new());
    let manager = PluginManager::new(bus.clone(), Arc::new(catalog), Arc::new(context));
    Harness {
        bus,
        manager,
        state,
        outbox,
    }
}

fn catalog_of(units: Vec<Arc<dyn Plugin>>) -> PluginCatalog {
    let catalog = PluginCatalog::new();
    for unit in units {
        catalog.add_arc(unit);
    }
    catalog
}

fn mine(body: &str) -> Event {
    Event::message(OWNER, OWNER, body).from_me()
}

#[tokio::test]
async fn test_unload_stops_dispatch() {
    let h = harness(catalog_of(vec![Arc::new(PingPlugin)]));

    assert!(h.manager.load("ping"));
    assert_eq!(h.bus.dispatch(mine(".ping")).await, 1);
    assert_eq!(h.outbox.take(), vec!["pong".to_string()]);

    assert!(h.manager.unload("ping"));
    assert_eq!(h.manager.state("ping"), PluginState::Unloaded);
    assert_eq!(h.bus.dispatch(mine(".ping")).await, 0);
    assert!(h.outbox.take().is_empty());
    assert!(h.manager.command("ping").is_none());
}

#[tokio::test]
async fn test_reload_is_clean() {
    let h = harness(catalog_of(vec![Arc::new(PingPlugin)]));

    assert!(h.manager.load("ping"));
    let before = h.bus.len();
    assert!(h.manager.reload("ping"));

    assert_eq!(h.bus.len(), before);
    assert_eq!(h.bus.dispatch(mine(".ping")).await, 1);
    assert_eq!(h.outbox.take().len(), 1);
}

#[tokio::test]
async fn test_double_load_keeps_one_handler_set() {
    let h = harness(catalog_of(vec![Arc::new(AfkPlugin)]));

    assert!(h.manager.load("afk"));
    assert!(h.manager.load("afk"));

    let afk_entries = h.manager.commands().into_iter().filter(|c| c.name == "afk").count();
    assert_eq!(afk_entries, 1);
    assert_eq!(h.bus.len(), 3);

    assert_eq!(h.bus.dispatch(mine(".afk lunch")).await, 1);
    assert_eq!(h.outbox.take().len(), 1);
    assert!(h.state.afk().is_afk);
    assert_eq!(h.state.afk().reason, "lunch");
}

#[tokio::test]
async fn test_reload_all_does_not_duplicate_metadata() {
    let h = harness(builtin::default_catalog(&Config::default().plugins));

    let first = h.manager.load_all();
    assert!(first.is_success());
    let commands = h.manager.commands().len();
    let handlers = h.bus.len();

    let second = h.manager.reload_all();
    assert_eq!(second.loaded.len(), first.loaded.len());
    assert_eq!(h.manager.commands().len(), commands);
    assert_eq!(h.bus.len(), handlers);

    let mut names: Vec<String> = h.manager.commands().into_iter().map(|c| c.name).collect();
    names.dedup();
    assert_eq!(names.len(), commands);
}

#[tokio::test]
async fn test_reload_all_picks_up_new_units() {
    struct Echo;
    impl Plugin for Echo {
        fn module_id(&self) -> &str {
            "echo"
        }

        fn register(&self, scope: &mut PluginScope) -> PluginResult<()> {
            scope
                .command(CommandMetadata::new("echo").public())
                .handle(|ctx, event| async move { ctx.reply(&event, event.rest()).await });
            Ok(())
        }
    }

    let h = harness(catalog_of(vec![Arc::new(PingPlugin)]));
    h.manager.load_all();
    assert!(h.manager.command("echo").is_none());

    h.manager.catalog().add(Echo);
    let summary = h.manager.reload_all();
    assert_eq!(summary.loaded, vec!["echo".to_string(), "ping".to_string()]);

    h.bus.dispatch(mine(".echo hello there")).await;
    assert_eq!(h.outbox.take(), vec!["hello there".to_string()]);
}

#[tokio::test]
async fn test_boot_filter_drops_backlog() {
    let h = harness(catalog_of(vec![Arc::new(PingPlugin)]));
    h.manager.load("ping");

    assert_eq!(h.bus.dispatch(mine(".ping").with_timestamp(BOOT - 1)).await, 0);
    assert_eq!(h.bus.dispatch(mine(".ping").with_timestamp(BOOT)).await, 1);
}

#[tokio::test]
async fn test_access_levels_are_enforced() {
    let h = harness(builtin::default_catalog(&Config::default().plugins));
    h.manager.load_all();

    let stranger = |body: &str| Event::message("group@g.example", "555:7@s.example", body).in_group();

    // Public
    h.bus.dispatch(stranger(".ping")).await;
    assert_eq!(h.outbox.take(), vec!["pong".to_string()]);

    // Privileged: ignored until the sender is a sudo user
    h.bus.dispatch(stranger(".save k v")).await;
    assert!(h.outbox.take().is_empty());
    h.state.add_sudo("555@s.example");
    h.bus.dispatch(stranger(".save k v")).await;
    assert_eq!(h.state.get_note("k"), Some("v".to_string()));
    h.outbox.take();

    // Owner only: sudo is not enough
    h.bus.dispatch(stranger(".setprefix #")).await;
    assert!(h.outbox.take().is_empty());
    assert_eq!(h.state.prefix(), None);

    h.bus.dispatch(Event::message(OWNER, "100:3@s.example", ".setprefix #")).await;
    assert_eq!(h.state.prefix(), Some("#".to_string()));
}

#[tokio::test]
async fn test_prefix_override_applies_to_loaded_commands() {
    let h = harness(catalog_of(vec![Arc::new(PingPlugin)]));
    h.manager.load("ping");

    h.state.set_prefix("#");
    assert_eq!(h.bus.dispatch(mine("#ping")).await, 1);
    assert_eq!(h.bus.dispatch(mine(".ping")).await, 0);
    // Extra prefixes stay accepted
    assert_eq!(h.bus.dispatch(mine("!ping")).await, 1);
}

#[tokio::test]
async fn test_pm_protection_warns_unpermitted_senders() {
    let h = harness(builtin::default_catalog(&Config::default().plugins));
    h.manager.load_all();
    let dm = |body: &str| Event::message("777@s.example", "777@s.example", body);

    h.bus.dispatch(dm("hello")).await;
    assert!(h.outbox.take().is_empty());

    h.state.set_config(builtin::PM_PROTECTION, true);
    h.bus.dispatch(dm("hello")).await;
    h.bus.dispatch(dm("hello?")).await;
    h.bus.dispatch(dm("anyone?")).await;
    let replies = h.outbox.take();
    assert_eq!(replies.len(), 2);
    assert!(replies[0].contains("1/2"));
    assert_eq!(h.state.warnings("777@s.example"), 3);

    h.bus.dispatch(mine(".approve 777@s.example")).await;
    h.outbox.take();
    assert!(h.state.is_permitted("777@s.example"));
    assert_eq!(h.state.warnings("777@s.example"), 0);

    h.bus.dispatch(dm("thanks")).await;
    assert!(h.outbox.take().is_empty());
}

#[tokio::test]
async fn test_reload_command_reports_summary() {
    let h = harness(builtin::default_catalog(&Config::default().plugins));
    let loaded = h.manager.load_all().loaded.len();

    h.bus.dispatch(mine(".reload")).await;
    let replies = h.outbox.take();
    assert_eq!(replies, vec![format!("Loaded {} plugin(s)", loaded)]);
    assert_eq!(h.manager.loaded_modules().len(), loaded);
}

#[tokio::test]
async fn test_afk_auto_reply_and_clear() {
    let h = harness(catalog_of(vec![Arc::new(AfkPlugin)]));
    h.manager.load("afk");

    h.bus.dispatch(mine(".afk")).await;
    h.outbox.take();

    h.bus.dispatch(Event::message("222@s.example", "222@s.example", "are you there?")).await;
    let replies = h.outbox.take();
    assert_eq!(replies.len(), 1);
    assert!(replies[0].contains("I'm busy right now."));

    // Group chatter without a mention is ignored
    h.bus
        .dispatch(Event::message("g@g.example", "222@s.example", "lunch?").in_group())
        .await;
    assert!(h.outbox.take().is_empty());
    h.bus
        .dispatch(Event::message("g@g.example", "222@s.example", "@999 lunch?").in_group())
        .await;
    assert_eq!(h.outbox.take().len(), 1);

    h.bus.dispatch(mine("back now")).await;
    assert!(!h.state.afk().is_afk);
    assert_eq!(h.outbox.take().len(), 1);
}

#[tokio::test]
async fn test_bare_number_grants_apply_to_full_sender_ids() {
    let h = harness(builtin::default_catalog(&Config::default().plugins));
    h.manager.load_all();

    h.bus.dispatch(mine(".addsudo 555")).await;
    assert_eq!(h.outbox.take(), vec!["555 is now a sudo user".to_string()]);

    let sudo = Event::message("g@g.example", "555:4@s.example", ".save k v").in_group();
    h.bus.dispatch(sudo).await;
    assert_eq!(h.state.get_note("k"), Some("v".to_string()));
    h.outbox.take();

    // Approving a bare number silences PM protection for that sender
    h.state.set_config(builtin::PM_PROTECTION, true);
    h.bus.dispatch(mine(".approve 777")).await;
    h.outbox.take();
    h.bus.dispatch(Event::message("777@s.example", "777@s.example", "hi")).await;
    assert!(h.outbox.take().is_empty());
    assert_eq!(h.state.warnings("777@s.example"), 0);
}
