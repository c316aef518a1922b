use anyhow::{anyhow, Context, Result};
use directories::{ProjectDirs, UserDirs};
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

pub fn app_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("app", "monster-forge", "monster-forge")
        .ok_or_else(|| anyhow!("cannot resolve project dirs"))
}

pub fn ensure_data_dir() -> Result<PathBuf> {
    let dirs = app_dirs()?;
    let data_dir = dirs.data_dir().to_path_buf();
    fs::create_dir_all(&data_dir).context("create data dir")?;
    Ok(data_dir)
}

pub fn db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("app.sqlite")
}

pub fn logs_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

/// The user's download folder, or `<data_dir>/downloads` when there is none.
pub fn default_download_dir(data_dir: &Path) -> PathBuf {
    UserDirs::new()
        .and_then(|u| u.download_dir().map(Path::to_path_buf))
        .unwrap_or_else(|| data_dir.join("downloads"))
}

pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
