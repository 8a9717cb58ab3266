//! autosuggest-rs server entry point

use anyhow::{bail, Result};
use autosuggest_rs::{
    config::{self, Settings, StorageBackend},
    storage::{load_seed_file, MemoryStore, SqliteStore, SuggestStore},
    web::{create_router, AppState},
    SuggestService,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = match parse_args()? {
        Some(settings) => settings,
        None => return Ok(()),
    };

    // Initialize logging; RUST_LOG wins over the debug flag
    let default_level = if settings.general.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    info!("Starting autosuggest-rs v{}", autosuggest_rs::VERSION);
    info!("Instance {}, engine {}", settings.general.instance_name, settings.suggest.engine);

    let store = open_store(&settings).await?;
    if let Some(seed) = &settings.storage.seed_file {
        load_seed_file(store.as_ref(), seed).await?;
    }
    info!("Store {} holds {} names", store.name(), store.count().await?);

    let service = SuggestService::from_settings(store, &settings);
    if settings.cache.prewarm.enabled {
        service.prewarm(&settings.cache.prewarm).await;
    }

    let addr = SocketAddr::new(settings.server.bind_address.parse()?, settings.server.port);
    let state = AppState::new(settings, service);
    let app = create_router(state);

    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn open_store(settings: &Settings) -> Result<Arc<dyn SuggestStore>> {
    let store: Arc<dyn SuggestStore> = match settings.storage.backend {
        StorageBackend::Sqlite => Arc::new(SqliteStore::connect(&settings.storage).await?),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}

/// Parse command line arguments; `None` means the process should exit
fn parse_args() -> Result<Option<Settings>> {
    let mut args = std::env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                return Ok(None);
            }
            "-V" | "--version" => {
                println!("autosuggest-rs {}", autosuggest_rs::VERSION);
                return Ok(None);
            }
            "-c" | "--config" => match args.next() {
                Some(path) => config_path = Some(PathBuf::from(path)),
                None => bail!("{} requires a file argument", arg),
            },
            other => bail!("Unknown argument: {}", other),
        }
    }

    let settings = match config_path {
        Some(path) => {
            let mut settings = Settings::from_file(&path)?;
            settings.merge_env();
            settings
        }
        None => config::load()?,
    };
    Ok(Some(settings))
}

/// Print usage information
fn print_usage() {
    println!(
        r#"
autosuggest-rs v{}
Type-ahead suggestions over pattern, full-text and commercial text backends

USAGE:
    autosuggest-rs [OPTIONS]

OPTIONS:
    -c, --config <FILE>    Path to configuration file
    -h, --help             Print help information
    -V, --version          Print version information

ENVIRONMENT VARIABLES:
    AUTOSUGGEST_SETTINGS_PATH      Path to settings.yml
    AUTOSUGGEST_DEBUG              Enable debug logging (true/false)
    AUTOSUGGEST_PORT               Server port
    AUTOSUGGEST_BIND_ADDRESS       Bind address
    AUTOSUGGEST_ENGINE             pattern-match, inverted-index or commercial-text
    AUTOSUGGEST_CACHE_ENABLED      Enable the suggestion cache (true/false)
    AUTOSUGGEST_DEFAULTS_ENABLED   Serve popular names for short queries (true/false)
    AUTOSUGGEST_RATELIMIT_ENABLED  Enable per-client rate limiting (true/false)
    AUTOSUGGEST_DB_PATH            SQLite database file
"#,
        autosuggest_rs::VERSION
    );
}
