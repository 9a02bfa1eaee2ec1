mod cli;

use reelwatch::{
    arr, config,
    engine::Engine,
    library::{JellyfinClient, LibraryClient},
    server::{self, AppContext},
    state::StateStore,
};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::sync::Arc;

/// Documents `reelwatch state` knows how to print.
const DOCUMENTS: [&str; 5] = [
    "pending-movies",
    "pending-series",
    "season-progress",
    "suppression",
    "notified",
];

async fn start(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting reelwatch");
    tracing::info!("State directory: {}", config.state.dir.display());

    let engine = Engine::from_config(&config);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let workers = engine.spawn_workers(shutdown_rx);

    let ctx = AppContext {
        config: Arc::new(config),
        signals: engine.signals.clone(),
    };
    let server_result = server::start_server(ctx, server::shutdown_signal()).await;

    // Cleanup
    tracing::info!("Shutting down...");
    let _ = shutdown_tx.send(true);
    for handle in workers {
        let _ = handle.await;
    }

    server_result
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "reelwatch=trace,reelwatch_common=debug,tower_http=debug".to_string()
        } else {
            "reelwatch=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start(host, port, cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::State { document } => print_document(&document, cli.config.as_deref()),
        Commands::CheckConnections => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(check_connections(cli.config.as_deref()))
        }
        Commands::Version => {
            println!("reelwatch {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Library: {}", config.library.url);
            println!("  Trackers: {}", config.trackers.len());
            println!(
                "    Enabled: {}",
                config.trackers.iter().filter(|t| t.enabled).count()
            );
            println!("  Telegram enabled: {}", config.telegram.enabled);
            println!("  State directory: {}", config.state.dir.display());
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}

fn print_document(name: &str, config_path: Option<&std::path::Path>) -> Result<()> {
    if !DOCUMENTS.contains(&name) {
        anyhow::bail!(
            "Unknown document '{}'. Known documents: {}",
            name,
            DOCUMENTS.join(", ")
        );
    }

    let config = config::load_config_or_default(config_path)?;
    let store = StateStore::new(config.state.dir.clone());
    let document: serde_json::Value = store.load(name);
    let document = if document.is_null() {
        serde_json::json!({})
    } else {
        document
    };

    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

async fn check_connections(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let mut all_ok = true;

    let library = JellyfinClient::new(&config.library);
    all_ok &= report("library", &config.library.url, library.test_connection().await);

    for tracker in config.trackers.iter().filter(|t| t.enabled) {
        let client = arr::create_client(tracker);
        all_ok &= report(&tracker.name, &tracker.url, client.test_connection().await);
    }

    println!();
    if all_ok {
        println!("All connections OK");
        Ok(())
    } else {
        anyhow::bail!("Some connections failed")
    }
}

fn report<E: std::fmt::Display>(name: &str, url: &str, result: Result<bool, E>) -> bool {
    match result {
        Ok(true) => {
            println!("✓ {} ({})", name, url);
            true
        }
        Ok(false) => {
            println!("✗ {} ({}): unexpected response", name, url);
            false
        }
        Err(e) => {
            println!("✗ {} ({}): {}", name, url, e);
            false
        }
    }
}
