//! Plugin trait definitions and the registration surface handed to plugins

use std::future::Future;
use std::sync::{Arc, OnceLock, Weak};

use crate::application::errors::{BotError, PluginResult};
use crate::application::messaging::filters::{self, Prefixes};
use crate::application::messaging::{CommandParser, ParsedCommand};
use crate::application::services::{ErrorReporter, RateLimiter};
use crate::application::state::StateManager;
use crate::domain::entities::{unix_now, CommandMetadata, Event, EventKind};
use crate::domain::traits::{Bot, Callback, HandlerFuture, Predicate};
use crate::infrastructure::config::Config;
use super::manager::PluginManager;

/// Core plugin trait that all plugin units implement
pub trait Plugin: Send + Sync {
    /// Unique identifier for the unit
    fn module_id(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str {
        ""
    }

    /// Declare handlers; must not have side effects beyond the scope
    fn register(&self, scope: &mut PluginScope) -> PluginResult<()>;
}

/// Everything a handler can reach at runtime
pub struct PluginContext {
    pub state: Arc<StateManager>,
    pub config: Arc<Config>,
    pub bot: Arc<dyn Bot>,
    pub prefixes: Prefixes,
    pub rate_limiter: Arc<RateLimiter>,
    pub reporter: Arc<ErrorReporter>,
    /// Unix time the process started; older events are never dispatched
    pub boot_time: i64,
    manager: OnceLock<Weak<PluginManager>>,
}

impl PluginContext {
    pub fn new(state: Arc<StateManager>, config: Arc<Config>, bot: Arc<dyn Bot>) -> Self {
        let prefixes = Prefixes::new(state.clone(), config.bot.prefix.clone(), config.bot.prefixes.clone());
        let rate_limiter = Arc::new(RateLimiter::from_config(&config.security.rate_limit));
        let reporter = Arc::new(ErrorReporter::new(bot.clone(), config.bot.owner_id.clone()));
        Self {
            state,
            config,
            bot,
            prefixes,
            rate_limiter,
            reporter,
            boot_time: unix_now(),
            manager: OnceLock::new(),
        }
    }

    pub fn with_boot_time(mut self, boot_time: i64) -> Self {
        self.boot_time = boot_time;
        self
    }

    pub(crate) fn attach(&self, manager: Weak<PluginManager>) {
        if self.manager.set(manager).is_err() {
            tracing::warn!("Plugin context is already attached to a manager");
        }
    }

    /// The lifecycle manager, for plugins that manage other plugins
    pub fn manager(&self) -> Option<Arc<PluginManager>> {
        self.manager.get().and_then(Weak::upgrade)
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.config.bot.owner_id.as_deref()
    }

    /// Parse the event body as a command under the current prefixes
    pub fn command(&self, event: &Event) -> Option<ParsedCommand> {
        CommandParser::parse(&event.body, &self.prefixes.current())
    }

    pub async fn reply(&self, event: &Event, text: &str) -> Result<(), BotError> {
        self.bot.send_message(&event.chat_id, text).await?;
        Ok(())
    }
}

/// One handler declared by a plugin, before filters are composed onto it
pub struct HandlerDescriptor {
    pub kind: EventKind,
    /// The plugin's own match predicate
    pub predicate: Predicate,
    pub callback: Callback,
    /// Present for declared commands, absent for raw listeners
    pub metadata: Option<CommandMetadata>,
}

/// Collects the handlers a plugin declares during registration
pub struct PluginScope {
    module_id: String,
    context: Arc<PluginContext>,
    handlers: Vec<HandlerDescriptor>,
}

impl PluginScope {
    pub fn new(module_id: impl Into<String>, context: Arc<PluginContext>) -> Self {
        Self {
            module_id: module_id.into(),
            context,
            handlers: Vec::new(),
        }
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    pub fn context(&self) -> &Arc<PluginContext> {
        &self.context
    }

    /// Declare a command; attach its callback with [`CommandBuilder::handle`]
    pub fn command(&mut self, spec: CommandMetadata) -> CommandBuilder<'_> {
        CommandBuilder { scope: self, spec }
    }

    /// Declare a raw listener; it gets the boot-time filter but no authorization
    pub fn listen<F, Fut>(&mut self, kind: EventKind, predicate: Predicate, handler: F)
    where
        F: Fn(Arc<PluginContext>, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BotError>> + Send + 'static,
    {
        let callback = self.bind(handler);
        self.handlers.push(HandlerDescriptor {
            kind,
            predicate,
            callback,
            metadata: None,
        });
    }

    pub fn into_descriptors(self) -> Vec<HandlerDescriptor> {
        self.handlers
    }

    /// Inject the context as the handler's first argument
    fn bind<F, Fut>(&self, handler: F) -> Callback
    where
        F: Fn(Arc<PluginContext>, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BotError>> + Send + 'static,
    {
        let context = self.context.clone();
        Arc::new(move |event: Event| -> HandlerFuture { Box::pin(handler(context.clone(), event)) })
    }
}

/// Pending command declaration
pub struct CommandBuilder<'a> {
    scope: &'a mut PluginScope,
    spec: CommandMetadata,
}

impl CommandBuilder<'_> {
    pub fn handle<F, Fut>(self, handler: F)
    where
        F: Fn(Arc<PluginContext>, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BotError>> + Send + 'static,
    {
        let mut spec = self.spec;
        spec.module_id = self.scope.module_id.clone();

        let predicate = filters::command_filter(spec.names(), self.scope.context.prefixes.clone());
        let callback = self.scope.bind(handler);
        self.scope.handlers.push(HandlerDescriptor {
            kind: EventKind::Message,
            predicate,
            callback,
            metadata: Some(spec),
        });
    }
}
