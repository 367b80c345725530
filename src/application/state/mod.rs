//! Runtime state - an in-memory cache over the durable state store
//!
//! Reads are plain cache lookups. A write updates the cache under the lock, then hands
//! the new value to a single background writer task that persists operations in the
//! order they were issued. The caller never waits for the store. Remote mirroring runs
//! on a second ordered task so a slow remote never holds back local persistence.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::application::errors::{StorageError, StorageResult};
use crate::domain::entities::{sender_user, unix_now, StateRecord};
use crate::infrastructure::database::StateStore;

/// Keys managed by the state cache
pub mod keys {
    pub const AFK: &str = "afk";
    pub const PM_PERMITS: &str = "pm_permits";
    pub const SUDO_USERS: &str = "sudo_users";
    pub const NOTES: &str = "notes";
    pub const PM_WARNINGS: &str = "pm_warnings";
    pub const GROUP_CONFIGS: &str = "group_configs";
    pub const PREFIX: &str = "prefix";
    pub const FULL_DEV: &str = "FULL_DEV";
    pub const I_DEV: &str = "I_DEV";
    pub const CONFIGS: &str = "configs";

    pub const MANAGED: [&str; 10] = [
        AFK,
        PM_PERMITS,
        SUDO_USERS,
        NOTES,
        PM_WARNINGS,
        GROUP_CONFIGS,
        PREFIX,
        FULL_DEV,
        I_DEV,
        CONFIGS,
    ];
}

/// Away-from-keyboard status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AfkStatus {
    pub is_afk: bool,
    pub reason: String,
    pub since: i64,
}

/// Per-group settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    pub muted: bool,
    pub welcome: Option<String>,
}

enum PersistOp {
    Put(StateRecord),
    Delete(String),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

enum MirrorOp {
    Put(StateRecord),
    Delete(String),
}

fn default_value(key: &str) -> Value {
    match key {
        keys::AFK => json!({"is_afk": false, "reason": "", "since": 0}),
        keys::PM_PERMITS | keys::SUDO_USERS => json!([]),
        keys::NOTES | keys::PM_WARNINGS | keys::GROUP_CONFIGS | keys::CONFIGS => json!({}),
        keys::FULL_DEV => json!(true),
        keys::I_DEV => json!(false),
        _ => Value::Null,
    }
}

fn as_array_mut(value: &mut Value) -> &mut Vec<Value> {
    if !value.is_array() {
        *value = Value::Array(Vec::new());
    }
    match value {
        Value::Array(list) => list,
        _ => unreachable!("value coerced to an array above"),
    }
}

fn as_object_mut(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value coerced to an object above"),
    }
}

/// Cached runtime state shared by every plugin
pub struct StateManager {
    store: Arc<StateStore>,
    cache: RwLock<HashMap<String, Value>>,
    writer: mpsc::UnboundedSender<PersistOp>,
    worker: Mutex<Option<JoinHandle<()>>>,
    mirror: Mutex<Option<JoinHandle<()>>>,
    /// Keys written before `initialize()` finished; the load keeps their cached value
    early_writes: Mutex<HashSet<String>>,
    initialized: AtomicBool,
    init_lock: tokio::sync::Mutex<()>,
}

impl StateManager {
    /// Create the manager and spawn its writer task; must run inside a tokio runtime
    pub fn new(store: Arc<StateStore>) -> Self {
        let cache = keys::MANAGED
            .iter()
            .map(|key| (key.to_string(), default_value(key)))
            .collect();

        let (mirror_tx, mirror) = match store.remote() {
            Some(_) => {
                let (tx, rx) = mpsc::unbounded_channel();
                (Some(tx), Some(tokio::spawn(run_mirror(Arc::clone(&store), rx))))
            }
            None => (None, None),
        };

        let (writer, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_writer(Arc::clone(&store), rx, mirror_tx));

        Self {
            store,
            cache: RwLock::new(cache),
            writer,
            worker: Mutex::new(Some(worker)),
            mirror: Mutex::new(mirror),
            early_writes: Mutex::new(HashSet::new()),
            initialized: AtomicBool::new(false),
            init_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Reconcile the stores once, then load every managed key into the cache
    pub async fn initialize(&self) -> StorageResult<()> {
        let _guard = self.init_lock.lock().await;
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.store.reconcile().await?;

        let mut loaded = Vec::new();
        for key in keys::MANAGED {
            if let Some(value) = self.store.get(key).await? {
                loaded.push((key, value));
            }
        }

        {
            let mut cache = self.write_cache();
            let mut early = self.early_writes.lock().unwrap_or_else(PoisonError::into_inner);
            for (key, value) in loaded {
                if early.contains(key) {
                    tracing::debug!("Keeping '{}' written before initialization", key);
                    continue;
                }
                let value = if key == keys::CONFIGS && !value.is_object() {
                    tracing::warn!("Discarding malformed dynamic configuration");
                    json!({})
                } else {
                    value
                };
                cache.insert(key.to_string(), value);
            }
            early.clear();
            // Set while the cache lock is held so no write slips in unrecorded
            self.initialized.store(true, Ordering::SeqCst);
        }

        tracing::info!("State manager synchronized with persistent store");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    // --- Generic access ---

    /// Pure cache read
    pub fn get_domain_value(&self, name: &str) -> Option<Value> {
        self.read_cache().get(name).cloned()
    }

    pub fn set_domain_value(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        let mut cache = self.write_cache();
        cache.insert(name.to_string(), value.clone());
        self.note_write(name);
        self.enqueue(PersistOp::Put(StateRecord::now(name, value)));
    }

    /// Drop a key from the cache (managed keys fall back to their default)
    pub fn delete_domain_value(&self, name: &str) {
        let mut cache = self.write_cache();
        if keys::MANAGED.contains(&name) {
            cache.insert(name.to_string(), default_value(name));
        } else {
            cache.remove(name);
        }
        self.note_write(name);
        self.enqueue(PersistOp::Delete(name.to_string()));
    }

    /// Re-persist every cached key
    pub fn save(&self) {
        let cache = self.read_cache();
        let now = unix_now();
        for (key, value) in cache.iter() {
            self.enqueue(PersistOp::Put(StateRecord::new(key.clone(), value.clone(), now)));
        }
    }

    /// Wait until everything queued so far has been handed to the store
    pub async fn flush(&self) -> StorageResult<()> {
        let (tx, rx) = oneshot::channel();
        if !self.enqueue(PersistOp::Flush(tx)) {
            return Err(StorageError::Closed);
        }
        rx.await.map_err(|_| StorageError::Closed)
    }

    /// Drain pending writes and stop the writer; later writes stay in memory only
    pub async fn shutdown(&self) -> StorageResult<()> {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(handle) = handle else {
            return Ok(());
        };

        self.enqueue(PersistOp::Shutdown);
        handle.await.map_err(|e| StorageError::Join(e.to_string()))?;
        tracing::info!("State writer drained");

        let mirror = self.mirror.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(mirror) = mirror {
            self.drain_mirror(mirror, self.store.remote_timeout()).await?;
        }
        Ok(())
    }

    /// Give queued remote writes up to `limit` to finish, then drop the rest
    async fn drain_mirror(&self, mut mirror: JoinHandle<()>, limit: Duration) -> StorageResult<()> {
        match tokio::time::timeout(limit, &mut mirror).await {
            Ok(joined) => joined.map_err(|e| StorageError::Join(e.to_string())),
            Err(_) => {
                mirror.abort();
                tracing::warn!("Remote mirror did not drain within {:?}; pending remote writes dropped", limit);
                Ok(())
            }
        }
    }

    // --- AFK ---

    pub fn afk(&self) -> AfkStatus {
        self.typed(keys::AFK)
    }

    pub fn set_afk(&self, is_afk: bool, reason: &str) {
        let status = AfkStatus {
            is_afk,
            reason: reason.to_string(),
            since: if is_afk { unix_now() } else { 0 },
        };
        self.update(keys::AFK, |value| *value = json!(status));
    }

    // --- Direct message permits ---

    pub fn is_permitted(&self, user_id: &str) -> bool {
        self.list_contains(keys::PM_PERMITS, user_id)
    }

    pub fn permit_user(&self, user_id: &str) -> bool {
        self.list_insert(keys::PM_PERMITS, user_id)
    }

    pub fn deny_user(&self, user_id: &str) -> bool {
        self.list_remove(keys::PM_PERMITS, user_id)
    }

    pub fn permitted_users(&self) -> Vec<String> {
        self.typed(keys::PM_PERMITS)
    }

    // --- Privileged users ---

    pub fn is_sudo(&self, user_id: &str) -> bool {
        self.list_contains(keys::SUDO_USERS, user_id)
    }

    pub fn add_sudo(&self, user_id: &str) -> bool {
        self.list_insert(keys::SUDO_USERS, user_id)
    }

    pub fn remove_sudo(&self, user_id: &str) -> bool {
        self.list_remove(keys::SUDO_USERS, user_id)
    }

    pub fn sudo_users(&self) -> Vec<String> {
        self.typed(keys::SUDO_USERS)
    }

    // --- Notes ---

    pub fn set_note(&self, keyword: &str, content: &str) {
        let keyword = keyword.to_lowercase();
        self.update(keys::NOTES, |value| {
            as_object_mut(value).insert(keyword, json!(content));
        });
    }

    pub fn get_note(&self, keyword: &str) -> Option<String> {
        self.read_cache()
            .get(keys::NOTES)
            .and_then(|notes| notes.get(keyword.to_lowercase()))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn delete_note(&self, keyword: &str) -> bool {
        let keyword = keyword.to_lowercase();
        self.update(keys::NOTES, |value| as_object_mut(value).remove(&keyword).is_some())
    }

    pub fn notes(&self) -> BTreeMap<String, String> {
        self.typed(keys::NOTES)
    }

    // --- Warning counters ---

    /// Increment and return the sender's warning count
    pub fn add_warning(&self, sender_id: &str) -> u64 {
        self.update(keys::PM_WARNINGS, |value| {
            let warnings = as_object_mut(value);
            let count = warnings.get(sender_id).and_then(Value::as_u64).unwrap_or(0) + 1;
            warnings.insert(sender_id.to_string(), json!(count));
            count
        })
    }

    pub fn warnings(&self, sender_id: &str) -> u64 {
        self.read_cache()
            .get(keys::PM_WARNINGS)
            .and_then(|w| w.get(sender_id))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    pub fn reset_warnings(&self, sender_id: &str) -> bool {
        self.update(keys::PM_WARNINGS, |value| as_object_mut(value).remove(sender_id).is_some())
    }

    // --- Group configuration ---

    pub fn group_config(&self, chat_id: &str) -> GroupConfig {
        self.read_cache()
            .get(keys::GROUP_CONFIGS)
            .and_then(|groups| groups.get(chat_id))
            .and_then(|cfg| serde_json::from_value(cfg.clone()).ok())
            .unwrap_or_default()
    }

    pub fn set_group_muted(&self, chat_id: &str, muted: bool) {
        self.update_group(chat_id, |cfg| cfg.muted = muted);
    }

    pub fn set_group_welcome(&self, chat_id: &str, welcome: Option<String>) {
        self.update_group(chat_id, |cfg| cfg.welcome = welcome);
    }

    fn update_group(&self, chat_id: &str, f: impl FnOnce(&mut GroupConfig)) {
        self.update(keys::GROUP_CONFIGS, |value| {
            let groups = as_object_mut(value);
            let mut cfg: GroupConfig = groups
                .get(chat_id)
                .and_then(|cfg| serde_json::from_value(cfg.clone()).ok())
                .unwrap_or_default();
            f(&mut cfg);
            groups.insert(chat_id.to_string(), json!(cfg));
        });
    }

    // --- Command prefix ---

    /// Runtime override, if any
    pub fn prefix(&self) -> Option<String> {
        self.read_cache()
            .get(keys::PREFIX)
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
    }

    pub fn prefix_or(&self, fallback: &str) -> String {
        self.prefix().unwrap_or_else(|| fallback.to_string())
    }

    pub fn set_prefix(&self, prefix: &str) {
        self.update(keys::PREFIX, |value| *value = json!(prefix));
    }

    pub fn clear_prefix(&self) {
        self.update(keys::PREFIX, |value| *value = Value::Null);
    }

    // --- Developer mode ---

    pub fn is_dev(&self) -> bool {
        let cache = self.read_cache();
        let flag = |key: &str| cache.get(key).and_then(Value::as_bool).unwrap_or(false);
        flag(keys::FULL_DEV) && flag(keys::I_DEV)
    }

    pub fn set_dev_mode(&self, enabled: bool) {
        self.update(keys::I_DEV, |value| *value = json!(enabled));
    }

    // --- Dynamic configuration ---

    pub fn get_config(&self, key: &str, default: impl Into<Value>) -> Value {
        self.config_value(key).unwrap_or_else(|| default.into())
    }

    pub fn config_value(&self, key: &str) -> Option<Value> {
        self.read_cache()
            .get(keys::CONFIGS)
            .and_then(|configs| configs.get(key))
            .cloned()
    }

    /// Truthiness of a dynamic flag, falling back to `default` when unset
    pub fn config_flag(&self, key: &str, default: bool) -> bool {
        match self.config_value(key) {
            Some(Value::Bool(b)) => b,
            Some(Value::Number(n)) => n.as_f64().map(|n| n != 0.0).unwrap_or(default),
            Some(Value::String(s)) => !matches!(s.to_lowercase().as_str(), "false" | "off" | "0" | "no" | ""),
            Some(Value::Null) | None => default,
            Some(_) => true,
        }
    }

    pub fn set_config(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        self.update(keys::CONFIGS, |configs| {
            as_object_mut(configs).insert(key.to_string(), value);
        });
    }

    pub fn delete_config(&self, key: &str) -> bool {
        self.update(keys::CONFIGS, |configs| as_object_mut(configs).remove(key).is_some())
    }

    pub fn get_all_configs(&self) -> Map<String, Value> {
        match self.read_cache().get(keys::CONFIGS) {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }

    // --- Internals ---

    fn read_cache(&self) -> RwLockReadGuard<'_, HashMap<String, Value>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, HashMap<String, Value>> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn typed<T: serde::de::DeserializeOwned + Default>(&self, key: &str) -> T {
        self.read_cache()
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }

    /// Read-modify-write under the cache lock; persists only if the value changed.
    /// The persistence op is queued before the lock is released so queue order
    /// matches mutation order.
    fn update<T>(&self, key: &str, f: impl FnOnce(&mut Value) -> T) -> T {
        let mut cache = self.write_cache();
        let slot = cache.entry(key.to_string()).or_insert_with(|| default_value(key));
        let before = slot.clone();
        let out = f(slot);
        if *slot != before {
            self.note_write(key);
            self.enqueue(PersistOp::Put(StateRecord::now(key, slot.clone())));
        }
        out
    }

    fn list_contains(&self, key: &str, item: &str) -> bool {
        self.read_cache()
            .get(key)
            .and_then(Value::as_array)
            .map(|list| list.iter().any(|v| same_user(v, item)))
            .unwrap_or(false)
    }

    fn list_insert(&self, key: &str, item: &str) -> bool {
        self.update(key, |value| {
            let list = as_array_mut(value);
            if list.iter().any(|v| same_user(v, item)) {
                return false;
            }
            list.push(json!(item));
            true
        })
    }

    fn list_remove(&self, key: &str, item: &str) -> bool {
        self.update(key, |value| {
            let list = as_array_mut(value);
            let before = list.len();
            list.retain(|v| !same_user(v, item));
            list.len() != before
        })
    }

    /// Caller holds the cache write lock
    fn note_write(&self, key: &str) {
        if !self.initialized.load(Ordering::SeqCst) {
            self.early_writes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key.to_string());
        }
    }

    fn enqueue(&self, op: PersistOp) -> bool {
        if self.writer.send(op).is_err() {
            tracing::warn!("State writer is stopped; change kept in memory only");
            return false;
        }
        true
    }
}

/// Ids match on their user part, so `555` and `555@host` are the same user
fn same_user(entry: &Value, id: &str) -> bool {
    entry
        .as_str()
        .map(|e| e == id || sender_user(e) == sender_user(id))
        .unwrap_or(false)
}

async fn run_writer(
    store: Arc<StateStore>,
    mut rx: mpsc::UnboundedReceiver<PersistOp>,
    mirror: Option<mpsc::UnboundedSender<MirrorOp>>,
) {
    let forward = |op: MirrorOp| {
        if let Some(mirror) = &mirror {
            if mirror.send(op).is_err() {
                tracing::warn!("Remote mirror is stopped; change kept locally only");
            }
        }
    };

    while let Some(op) = rx.recv().await {
        match op {
            PersistOp::Put(record) => match store.put_local(&record).await {
                Ok(()) => forward(MirrorOp::Put(record)),
                Err(e) => tracing::error!("Failed to persist '{}': {}", record.key, e),
            },
            PersistOp::Delete(key) => match store.delete_local(&key).await {
                Ok(()) => forward(MirrorOp::Delete(key)),
                Err(e) => tracing::error!("Failed to delete '{}': {}", key, e),
            },
            PersistOp::Flush(done) => {
                let _ = done.send(());
            }
            PersistOp::Shutdown => break,
        }
    }
    tracing::debug!("State writer stopped");
}

/// Applies remote writes in the order the local writer issued them
async fn run_mirror(store: Arc<StateStore>, mut rx: mpsc::UnboundedReceiver<MirrorOp>) {
    while let Some(op) = rx.recv().await {
        match op {
            MirrorOp::Put(record) => store.mirror_put(&record).await,
            MirrorOp::Delete(key) => store.mirror_delete(&key).await,
        }
    }
    tracing::debug!("Remote mirror stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::errors::StorageResult;
    use crate::domain::traits::StateBackend;
    use crate::infrastructure::database::MemoryBackend;
    use async_trait::async_trait;
    use std::time::Instant;

    /// Remote that accepts writes only after a long stall
    struct Stalled;

    #[async_trait]
    impl StateBackend for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn get(&self, _key: &str) -> StorageResult<Option<StateRecord>> {
            Ok(None)
        }

        async fn put(&self, _record: &StateRecord) -> StorageResult<()> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }

        async fn delete(&self, _key: &str) -> StorageResult<()> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }

        async fn records(&self) -> StorageResult<Vec<StateRecord>> {
            Ok(Vec::new())
        }
    }

    fn manager() -> (StateManager, Arc<MemoryBackend>) {
        let local = Arc::new(MemoryBackend::new("local"));
        let store = Arc::new(StateStore::new(local.clone()));
        (StateManager::new(store), local)
    }

    #[tokio::test]
    async fn read_after_write_needs_no_await() {
        let (state, _) = manager();
        state.set_domain_value("custom", json!({"x": 1}));
        assert_eq!(state.get_domain_value("custom"), Some(json!({"x": 1})));

        state.set_config("FAST_MEDIA", true);
        assert_eq!(state.get_config("FAST_MEDIA", false), json!(true));
    }

    #[tokio::test]
    async fn writes_reach_the_store_in_order() {
        let (state, local) = manager();
        state.set_prefix("!");
        state.set_prefix("?");
        state.set_prefix("#");
        state.flush().await.unwrap();

        let record = local.get(keys::PREFIX).await.unwrap().unwrap();
        assert_eq!(record.value, json!("#"));
    }

    #[tokio::test]
    async fn defaults_before_initialize() {
        let (state, _) = manager();
        assert_eq!(state.afk(), AfkStatus::default());
        assert!(state.sudo_users().is_empty());
        assert_eq!(state.prefix(), None);
        assert_eq!(state.prefix_or("."), ".");
        assert!(!state.is_dev());
        assert!(state.get_all_configs().is_empty());
    }

    #[tokio::test]
    async fn initialize_loads_managed_keys_and_is_idempotent() {
        let local = Arc::new(MemoryBackend::new("local").with_records([
            StateRecord::new(keys::SUDO_USERS, json!(["1@x"]), 1),
            StateRecord::new(keys::CONFIGS, json!("garbage"), 1),
        ]));
        let state = StateManager::new(Arc::new(StateStore::new(local.clone())));

        state.initialize().await.unwrap();
        assert!(state.is_sudo("1@x"));
        assert!(state.get_all_configs().is_empty());

        state.add_sudo("2@x");
        state.initialize().await.unwrap();
        assert!(state.is_sudo("2@x"));
    }

    #[tokio::test]
    async fn list_mutators_report_changes() {
        let (state, _) = manager();
        assert!(state.permit_user("a@x"));
        assert!(!state.permit_user("a@x"));
        assert!(state.is_permitted("a@x"));
        assert!(state.deny_user("a@x"));
        assert!(!state.deny_user("a@x"));
        assert!(!state.is_permitted("a@x"));

        assert!(state.add_sudo("b@x"));
        assert!(state.remove_sudo("b@x"));
        assert!(!state.is_sudo("b@x"));
    }

    #[tokio::test]
    async fn notes_are_case_insensitive() {
        let (state, _) = manager();
        state.set_note("Greet", "hello");
        assert_eq!(state.get_note("GREET").as_deref(), Some("hello"));
        assert_eq!(state.notes().len(), 1);
        assert!(state.delete_note("greet"));
        assert_eq!(state.get_note("greet"), None);
    }

    #[tokio::test]
    async fn warnings_count_up_and_reset() {
        let (state, _) = manager();
        assert_eq!(state.add_warning("s@x"), 1);
        assert_eq!(state.add_warning("s@x"), 2);
        assert_eq!(state.warnings("s@x"), 2);
        assert!(state.reset_warnings("s@x"));
        assert_eq!(state.warnings("s@x"), 0);
    }

    #[tokio::test]
    async fn group_config_merges_fields() {
        let (state, _) = manager();
        state.set_group_muted("g1", true);
        state.set_group_welcome("g1", Some("hi".to_string()));
        assert_eq!(
            state.group_config("g1"),
            GroupConfig { muted: true, welcome: Some("hi".to_string()) }
        );
        assert_eq!(state.group_config("g2"), GroupConfig::default());
    }

    #[tokio::test]
    async fn afk_and_dev_mode() {
        let (state, _) = manager();
        state.set_afk(true, "dinner");
        let afk = state.afk();
        assert!(afk.is_afk);
        assert_eq!(afk.reason, "dinner");
        assert!(afk.since > 0);

        state.set_afk(false, "");
        assert_eq!(state.afk().since, 0);

        state.set_dev_mode(true);
        assert!(state.is_dev());
    }

    #[tokio::test]
    async fn config_flags_parse_common_spellings() {
        let (state, _) = manager();
        state.set_config("A", "off");
        state.set_config("B", "yes");
        state.set_config("C", 0);
        assert!(!state.config_flag("A", true));
        assert!(state.config_flag("B", false));
        assert!(!state.config_flag("C", true));
        assert!(state.config_flag("MISSING", true));
        assert!(state.delete_config("A"));
        assert!(!state.delete_config("A"));
    }

    #[tokio::test]
    async fn shutdown_drains_pending_writes() {
        let (state, local) = manager();
        state.set_note("k", "v");
        state.shutdown().await.unwrap();

        assert!(local.get(keys::NOTES).await.unwrap().is_some());
        assert!(state.flush().await.is_err());
        state.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn delete_resets_managed_keys() {
        let (state, local) = manager();
        state.set_prefix("!");
        state.delete_domain_value(keys::PREFIX);
        state.flush().await.unwrap();

        assert_eq!(state.get_domain_value(keys::PREFIX), Some(Value::Null));
        assert!(local.get(keys::PREFIX).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stalled_remote_does_not_hold_back_local_writes() {
        let local = Arc::new(MemoryBackend::new("local"));
        let store = StateStore::new(local.clone())
            .with_remote(Arc::new(Stalled))
            .with_remote_timeout(Duration::from_millis(300));
        let state = StateManager::new(Arc::new(store));

        state.set_prefix("!");
        state.set_note("k", "v");
        state.set_config("FAST_MEDIA", true);

        tokio::time::timeout(Duration::from_millis(200), state.flush())
            .await
            .expect("local writes should not wait for the remote")
            .unwrap();
        assert_eq!(local.get(keys::PREFIX).await.unwrap().unwrap().value, json!("!"));
        assert!(local.get(keys::NOTES).await.unwrap().is_some());
        assert!(local.get(keys::CONFIGS).await.unwrap().is_some());

        // Three stalled mirror writes, but the drain is bounded by one timeout
        let started = Instant::now();
        state.shutdown().await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(800));
    }

    #[tokio::test]
    async fn save_rewrites_every_cached_key() {
        let local = Arc::new(MemoryBackend::new("local").with_records([StateRecord::new(
            keys::NOTES,
            json!({"old": "note"}),
            1,
        )]));
        let state = StateManager::new(Arc::new(StateStore::new(local.clone())));
        state.initialize().await.unwrap();
        state.set_prefix("!");

        let before = unix_now();
        state.save();
        state.flush().await.unwrap();

        let records = local.records().await.unwrap();
        for key in keys::MANAGED {
            let record = records.iter().find(|r| r.key == key).unwrap();
            assert!(record.updated_at >= before, "{} was not re-saved", key);
        }
        let notes = records.iter().find(|r| r.key == keys::NOTES).unwrap();
        assert_eq!(notes.value, json!({"old": "note"}));
    }

    #[tokio::test]
    async fn writes_before_initialize_survive_the_load() {
        let local = Arc::new(MemoryBackend::new("local").with_records([
            StateRecord::new(keys::PREFIX, json!("#"), 1),
            StateRecord::new(keys::SUDO_USERS, json!(["1@x"]), 1),
        ]));
        let state = StateManager::new(Arc::new(StateStore::new(local)));

        state.set_prefix("!");
        state.initialize().await.unwrap();

        assert_eq!(state.prefix(), Some("!".to_string()));
        assert!(state.is_sudo("1@x"));
    }

    #[tokio::test]
    async fn bare_ids_match_full_sender_ids() {
        let (state, _) = manager();
        assert!(state.add_sudo("555"));
        assert!(state.is_sudo("555@s.example"));
        assert!(!state.add_sudo("555@s.example"));
        assert!(!state.is_sudo("5555@s.example"));

        state.permit_user("777@s.example");
        assert!(state.is_permitted("777"));
        assert!(state.deny_user("777"));
        assert!(!state.is_permitted("777@s.example"));
    }
}
