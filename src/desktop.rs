//! Tauri shell around the forge. Built with `--features desktop`.

use serde::Serialize;

use crate::blob::is_object_url;
use crate::forge::ForgeState;
use crate::gallery::GalleryView;
use crate::lightbox::{CloseTrigger, Lightbox};
use crate::settings::{load_settings_from_dir, save_settings_to_dir, Settings};
use crate::{startup, AppState, MonsterForm};

#[derive(Debug, Serialize)]
struct SubmitReply {
    ok: bool,
    state: ForgeState,
}

/// Object references only exist in this process, so the webview gets them inlined.
fn for_webview(forge: &crate::forge::Forge, mut state: ForgeState) -> ForgeState {
    let inlined = state
        .preview
        .src
        .as_deref()
        .filter(|s| is_object_url(s))
        .map(|src| forge.loader().registry().data_uri(src));
    if let Some(uri) = inlined {
        state.preview.src = uri;
    }
    state
}

// ===== Tauri Commands =====

#[tauri::command]
async fn submit(
    state: tauri::State<'_, AppState>,
    base_type: String,
    features: Vec<String>,
) -> Result<SubmitReply, String> {
    let form = MonsterForm::new(base_type, features);
    let ok = state.forge.submit(&form).await.is_ok();
    Ok(SubmitReply {
        ok,
        state: for_webview(&state.forge, state.forge.snapshot()),
    })
}

#[tauri::command]
async fn history(state: tauri::State<'_, AppState>) -> Result<GalleryView, String> {
    Ok(state.forge.refresh_gallery().await)
}

#[tauri::command]
fn open_lightbox(state: tauri::State<'_, AppState>, index: usize) -> Result<Lightbox, String> {
    state
        .forge
        .open_thumbnail(index)
        .ok_or_else(|| format!("no history entry {index}"))
}

#[tauri::command]
fn close_lightbox(state: tauri::State<'_, AppState>, trigger: CloseTrigger) -> bool {
    state.forge.close_lightbox(trigger)
}

#[tauri::command]
async fn download(state: tauri::State<'_, AppState>) -> Result<String, String> {
    state
        .forge
        .download(&state.download_dir())
        .await
        .map(|p| p.display().to_string())
        .map_err(|e| e.status_message().to_string())
}

#[tauri::command]
async fn get_settings(state: tauri::State<'_, AppState>) -> Result<Settings, String> {
    Ok(load_settings_from_dir(&state.data_dir))
}

#[tauri::command]
async fn update_settings(
    state: tauri::State<'_, AppState>,
    settings: Settings,
) -> Result<Settings, String> {
    save_settings_to_dir(&state.data_dir, &settings).map_err(|e| e.to_string())?;
    Ok(settings)
}

// ===== Startup =====

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let state = tauri::async_runtime::block_on(startup()).expect("startup failed");

    tauri::Builder::default()
        .manage(state)
        .plugin(tauri_plugin_opener::init())
        .invoke_handler(tauri::generate_handler![
            submit,
            history,
            open_lightbox,
            close_lightbox,
            download,
            get_settings,
            update_settings
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
