pub mod api;
pub mod auth;
mod cli;
pub mod db;
pub mod health;
mod settings;
mod utils;

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;

use api::ApiClient;
use auth::{AuthManager, FileTokenStorage, Session};
use cli::Cli;
use db::Database;
use settings::SettingsStore;

pub(crate) struct AppState {
    pub(crate) db: Database,
    pub(crate) settings: SettingsStore,
    pub(crate) auth: AuthManager,
}

impl AppState {
    /// Open the store, settings and saved session under `data_dir`.
    pub(crate) fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let db = Database::new(data_dir.join("aggregator.sqlite3"))?;
        let settings = SettingsStore::new(data_dir.join("settings.json"))?;

        let storage = FileTokenStorage::new(data_dir.join("session.json"));
        let session = Session::restore(Arc::new(storage))?;

        let api = ApiClient::builder()
            .base_url(settings.effective().api_base_url)
            .build()?;
        let auth = AuthManager::new(api, db.clone(), Arc::new(session));

        Ok(Self { db, settings, auth })
    }
}

pub fn run() -> Result<()> {
    // RUST_LOG wins when set
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    log::debug!("aggregator starting with data dir {}", cli.data_dir.display());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async move {
        let state = AppState::open(&cli.data_dir)?;
        cli::execute(&state, cli.command).await
    })
}
