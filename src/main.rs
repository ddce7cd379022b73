use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use modbay::application::host::HostContext;
use modbay::application::services::management::{self, Reply};
use modbay::infrastructure::adapters::console::ConsoleAdapter;
use modbay::infrastructure::config::Config;
use modbay::infrastructure::plugins::NativeLoader;
use modbay::infrastructure::storage::JsonStore;
use modbay::plugins::{BatchReport, PluginManager, ScanReport};

#[derive(Parser)]
#[command(name = "modbay")]
#[command(about = "A plugin host with dependency-ordered module lifecycle", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Plugin directory (overrides config)
    #[arg(short, long)]
    plugins: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the host and its operator console
    Run,
    /// Inspect the plugin directory without enabling anything
    Plugins {
        #[command(subcommand)]
        action: PluginsAction,
    },
    /// Show version
    Version,
    /// Generate default config
    InitConfig {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum PluginsAction {
    /// List discovered modules
    List,
    /// Check that every module resolves; exits non-zero otherwise
    Check,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (mut config, config_error) = load_config(&cli.config);
    if let Some(dir) = cli.plugins {
        config.plugins.directory = dir;
    }

    // Initialize logging; RUST_LOG takes precedence over the config filter
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .init();

    if let Some(e) = config_error {
        tracing::warn!("Failed to load config: {}, using defaults", e);
    }

    match cli.command {
        Commands::Run => run_host(config),
        Commands::Plugins { action } => inspect_plugins(&config, action),
        Commands::Version => {
            println!("modbay v{}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Commands::InitConfig { output, force } => init_config(output.as_deref(), force),
    }
}

fn load_config(path: &str) -> (Config, Option<String>) {
    if !Path::new(path).exists() {
        return (Config::load_env(), None);
    }

    match Config::load(path) {
        Ok(mut config) => {
            config.apply_env();
            (config, None)
        }
        Err(e) => (Config::load_env(), Some(e.to_string())),
    }
}

fn run_host(config: Config) -> ExitCode {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(serve(config))
}

async fn serve(config: Config) -> ExitCode {
    tracing::info!("Starting {}", config.host.name);

    let store = Arc::new(JsonStore::new(&config.storage.path));
    if let Err(e) = store.init().await {
        tracing::error!("Failed to open store {}: {}", config.storage.path.display(), e);
        return ExitCode::FAILURE;
    }

    let directory = config.plugins.directory.clone();
    let auto_enable = config.plugins.auto_enable;
    let host = HostContext::new(config, store.clone());
    let mut manager = PluginManager::new(host).with_loader(NativeLoader::new());

    log_scan(&manager.scan(&directory));

    match manager.load_all() {
        Ok(report) => log_batch("load", &report),
        Err(e) => {
            tracing::error!("Cannot start: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if auto_enable {
        log_batch("enable", &manager.enable_all());
    } else {
        tracing::info!("Auto-enable is off; use 'enable <id>' in the console");
    }

    console_loop(&mut manager).await;

    log_batch("shutdown", &manager.shutdown());
    if let Err(e) = store.flush().await {
        tracing::warn!("Failed to flush store: {}", e);
    }

    tracing::info!("Stopped");
    ExitCode::SUCCESS
}

async fn console_loop(manager: &mut PluginManager) {
    let mut console = ConsoleAdapter::stdin("> ");
    console.send("Type 'help' for commands, 'stop' to shut down.");

    loop {
        tokio::select! {
            line = console.read_line(), if console.is_open() => {
                let Some(line) = line else {
                    tracing::info!("Console input closed; press Ctrl-C to stop");
                    continue;
                };
                match management::dispatch(manager, &line) {
                    Reply::Text(text) => console.send(&text),
                    Reply::Stop => break,
                    Reply::Nothing => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }
}

fn inspect_plugins(config: &Config, action: PluginsAction) -> ExitCode {
    let mut manager = PluginManager::new(HostContext::with_config(config.clone()));
    let scan = manager.scan(&config.plugins.directory);

    for error in &scan.errors {
        println!("! {}", error);
    }

    let order = manager.resolve();

    match action {
        PluginsAction::List => {
            let listed = match &order {
                Ok(order) => order.clone(),
                Err(_) => {
                    let mut ids: Vec<String> = manager.list().iter().map(|c| c.id().to_string()).collect();
                    ids.sort();
                    ids
                }
            };
            for id in &listed {
                let Some(container) = manager.get(id) else {
                    continue;
                };
                let desc = container.descriptor();
                let deps: Vec<&str> = desc.dependency_ids().collect();
                if deps.is_empty() {
                    println!("{} v{} - {}", desc.id, desc.version, desc.display_name);
                } else {
                    println!("{} v{} - {} (depends on {})", desc.id, desc.version, desc.display_name, deps.join(", "));
                }
            }
            if let Err(e) = &order {
                println!("! {}", e);
            }
            ExitCode::SUCCESS
        }
        PluginsAction::Check => match order {
            Ok(order) => {
                println!(
                    "OK: {} module(s), {} artifact error(s)",
                    order.len(),
                    scan.errors.len()
                );
                if !order.is_empty() {
                    println!("Load order: {}", order.join(" -> "));
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                println!("FAILED: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}

fn init_config(output: Option<&Path>, force: bool) -> ExitCode {
    let yaml = match Config::default().to_yaml() {
        Ok(yaml) => yaml,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let Some(path) = output else {
        println!("{}", yaml);
        println!("\nSave this to config.yaml and adjust as needed.");
        return ExitCode::SUCCESS;
    };

    if path.exists() && !force {
        tracing::error!("{} already exists (use --force to overwrite)", path.display());
        return ExitCode::FAILURE;
    }

    match std::fs::write(path, yaml) {
        Ok(()) => {
            println!("Wrote {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Failed to write {}: {}", path.display(), e);
            ExitCode::FAILURE
        }
    }
}

fn log_scan(report: &ScanReport) {
    tracing::info!(
        "Discovered {} module(s), {} artifact error(s)",
        report.discovered.len(),
        report.errors.len()
    );
}

fn log_batch(step: &str, report: &BatchReport) {
    for error in &report.failed {
        tracing::warn!("{} failed: {}", step, error);
    }
    for skipped in &report.skipped {
        tracing::warn!("{} skipped {}: {}", step, skipped.id, skipped.reason);
    }
}
