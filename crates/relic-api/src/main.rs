//! `relic-api` binary entrypoint.
//!
//! Loads configuration from environment variables, opens the on-disk index,
//! and starts the HTTP server.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::sync::Arc;

use anyhow::Result;

use relic_api::config::Config;
use relic_api::server::ServerBuilder;
use relic_core::observability::{LogFormat, init_logging};
use relic_index::IndexStore;

fn choose_log_format(config: &Config) -> LogFormat {
    if config.debug {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    init_logging(choose_log_format(&config));

    let store = if let Some(path) = config.index_path.as_deref() {
        tracing::info!(path = %path.display(), "Opening discovery index");
        Arc::new(IndexStore::open(path)?)
    } else {
        if !config.debug {
            anyhow::bail!("RELIC_INDEX_PATH is required when RELIC_DEBUG=false");
        }
        let dir = tempfile::tempdir()?.into_path();
        tracing::warn!(
            path = %dir.display(),
            "RELIC_INDEX_PATH not set; using a temporary index (debug only)"
        );
        Arc::new(IndexStore::open(dir)?)
    };

    let server = ServerBuilder::new().config(config).store(store).build()?;
    server.serve().await?;
    Ok(())
}
