pub mod blob;
pub mod database;
#[cfg(feature = "desktop")]
pub mod desktop;
pub mod download;
pub mod error;
pub mod forge;
pub mod gallery;
pub mod history;
pub mod leonardo;
pub mod lightbox;
pub mod loader;
pub mod poll;
pub mod prompt;
pub mod settings;
pub mod utils;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::blob::ObjectUrlRegistry;
use crate::database::{create_pool, SqliteStore};
use crate::forge::Forge;
use crate::history::HistoryStore;
use crate::leonardo::LeonardoClient;
use crate::loader::{HttpImageSource, ImageLoader};
use crate::settings::{load_settings_from_dir, Settings};
use crate::utils::{db_path, default_download_dir, ensure_data_dir, logs_dir};

pub use crate::error::ForgeError;
pub use crate::prompt::{build_prompt, MonsterForm};

static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

#[derive(Clone)]
pub struct AppState {
    pub forge: Arc<Forge>,
    pub data_dir: PathBuf,
    pub settings: Settings,
}

impl AppState {
    pub fn download_dir(&self) -> PathBuf {
        self.settings
            .download_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| default_download_dir(&self.data_dir))
    }
}

/// Logs to stderr and to a daily file under `<data_dir>/logs`.
///
/// `RUST_LOG` overrides the default `info` filter. Safe to call twice; only the
/// first call installs anything.
pub fn init_tracing(data_dir: &Path) -> Result<()> {
    if LOG_GUARD.get().is_some() {
        return Ok(());
    }
    let appender = tracing_appender::rolling::daily(logs_dir(data_dir), "monster-forge.log");
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()
        .context("install tracing subscriber")?;

    let _ = LOG_GUARD.set(guard);
    Ok(())
}

/// Wires the real ports (Leonardo, HTTP image source, SQLite history) together.
pub async fn build_state(data_dir: PathBuf) -> Result<AppState> {
    let settings = load_settings_from_dir(&data_dir);
    let pool = create_pool(&db_path(&data_dir))
        .await
        .context("open history database")?;

    let source = Arc::new(HttpImageSource::new());
    let loader = ImageLoader::new(source.clone(), source, ObjectUrlRegistry::new());
    let forge = Forge::new(
        Arc::new(LeonardoClient::from_settings(&settings)),
        settings.poll_policy(),
        loader,
        HistoryStore::new(Arc::new(SqliteStore::new(pool))),
    );
    forge.refresh_gallery().await;

    Ok(AppState {
        forge: Arc::new(forge),
        data_dir,
        settings,
    })
}

pub async fn startup() -> Result<AppState> {
    let data_dir = ensure_data_dir()?;
    init_tracing(&data_dir)?;
    build_state(data_dir).await
}
