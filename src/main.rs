//! Process entry point: parses CLI args, loads config, initializes
//! logging, opens the state store, constructs the `AppContext`, and
//! hands off to the (externally supplied) event loop driver (§9
//! initialization order: config → log sink → state store → cache →
//! panes → dialog stack).

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tfm::cache::MetadataCache;
use tfm::config::{default_config_path, CliArgs, Config};
use tfm::path::registry::BackendRegistry;
use tfm::state::StateStore;
use tfm::AppContext;

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("tfm={default_level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn state_db_path() -> std::path::PathBuf {
    dirs::home_dir().unwrap_or_else(|| std::path::PathBuf::from(".")).join(".tfm").join("state.db")
}

fn main() -> std::io::Result<()> {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let config = Config::load(&config_path).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "falling back to default config");
        Config::default()
    });

    let instance_id = uuid::Uuid::new_v4().to_string();
    let state = StateStore::open(&state_db_path(), instance_id).map_err(std::io::Error::other)?;
    let hostname = hostname::get().map(|h| h.to_string_lossy().into_owned()).unwrap_or_else(|_| "unknown".to_string());
    if let Err(e) = state.register_session(std::process::id(), &hostname) {
        tracing::warn!(error = %e, "could not register session");
    }

    let cache = Arc::new(MetadataCache::new(config.cache.max_entries, Duration::from_secs(config.cache.default_ttl_secs)));
    let registry = Arc::new(BackendRegistry::new());

    let _ctx = AppContext::new(config, state, cache, registry);

    tracing::info!("tfm core initialized; event loop is provided by the terminal frontend");
    Ok(())
}
