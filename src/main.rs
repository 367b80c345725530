use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use ember_bot::application::messaging::EventBus;
use ember_bot::application::state::StateManager;
use ember_bot::domain::entities::{unix_now, Event};
use ember_bot::domain::traits::Bot;
use ember_bot::infrastructure::adapters::ConsoleAdapter;
use ember_bot::infrastructure::config::Config;
use ember_bot::infrastructure::database::StateStore;
use ember_bot::plugins::{builtin, PluginContext, PluginManager};

#[derive(Parser)]
#[command(name = "ember-bot")]
#[command(about = "Bot runtime with synchronized state and hot-reloadable plugins", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Owner id (overrides config)
    #[arg(short, long)]
    owner: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot on the console
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
    /// Reconcile local and remote state once and print the report
    Sync,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => {
            let config = load_config(&cli.config, cli.owner);
            block_on(run_bot(config));
        }
        Commands::Version => {
            println!("ember-bot v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::InitConfig => {
            init_config();
        }
        Commands::Sync => {
            let config = load_config(&cli.config, cli.owner);
            block_on(sync_once(config));
        }
    }
}

fn load_config(path: &str, owner_override: Option<String>) -> Config {
    let mut config = if Path::new(path).exists() {
        Config::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {}, using defaults", e);
            Config::load_env()
        })
    } else {
        Config::load_env()
    };

    if let Some(owner) = owner_override {
        config.bot.owner_id = Some(owner);
    }
    config
}

fn block_on<F: std::future::Future<Output = ()>>(future: F) {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(future),
        Err(e) => {
            tracing::error!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    }
}

async fn sync_once(config: Config) {
    let store = match StateStore::open(&config.database) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to open state store: {}", e);
            std::process::exit(1);
        }
    };

    match store.reconcile().await {
        Ok(report) => {
            println!(
                "pushed: {}, pulled: {}, unchanged: {}, migrated: {}, failed: {}{}",
                report.pushed,
                report.pulled,
                report.unchanged,
                report.migrated,
                report.failed,
                if report.degraded { " (remote unreachable)" } else { "" }
            );
        }
        Err(e) => {
            tracing::error!("Reconciliation failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_bot(config: Config) {
    // Anything older than this is backlog and never reaches a handler
    let boot_time = unix_now();
    tracing::info!("Starting ember-bot: {}", config.bot.name);
    let config = Arc::new(config);

    let store = match StateStore::open(&config.database) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Failed to open state store: {}", e);
            return;
        }
    };

    let state = Arc::new(StateManager::new(store));
    if let Err(e) = state.initialize().await {
        tracing::error!("Failed to initialize state: {}", e);
        return;
    }

    let mut console = ConsoleAdapter::new(config.bot.name.clone());
    if let Some(owner) = &config.bot.owner_id {
        console = console.with_user(owner.clone());
    }
    let console = Arc::new(console);
    let bot: Arc<dyn Bot> = console.clone();

    let bus = Arc::new(EventBus::new());
    let context = Arc::new(PluginContext::new(state.clone(), config.clone(), bot).with_boot_time(boot_time));
    let catalog = Arc::new(builtin::default_catalog(&config.plugins));
    let manager = PluginManager::new(bus.clone(), catalog, context);

    if config.plugins.auto_load {
        let summary = manager.load_all();
        tracing::info!("{}", summary.render());
    }
    tracing::info!(
        "Plugin system initialized with {} plugins, {} commands",
        manager.loaded_modules().len(),
        manager.commands().len()
    );

    bus.dispatch(Event::ready()).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let input = console.clone();
    tokio::spawn(async move {
        if let Err(e) = input.listen(tx).await {
            tracing::error!("Console input failed: {}", e);
        }
    });

    println!("ember-bot ready. Type commands (prefix '{}'), Ctrl-D to quit.", config.bot.prefix);
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => {
                    bus.dispatch(event).await;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    if let Err(e) = state.shutdown().await {
        tracing::error!("Failed to drain state writer: {}", e);
    }
    tracing::info!("ember-bot stopped");
}

fn init_config() {
    match Config::default().to_yaml() {
        Ok(yaml) => {
            println!("{}", yaml);
            println!("\nSave this to config.yaml and adjust as needed.");
        }
        Err(e) => tracing::error!("Failed to render config: {}", e),
    }
}
