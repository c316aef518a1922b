use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info, instrument, warn};

use crate::download::download_image;
use crate::error::ForgeError;
use crate::gallery::{render, GalleryView};
use crate::history::HistoryStore;
use crate::leonardo::{generate, GenerationBackend, GenerationJob};
use crate::lightbox::{CloseTrigger, Lightbox};
use crate::loader::{ImageLoader, LoadedVia, PreviewSurface};
use crate::poll::PollPolicy;
use crate::prompt::MonsterForm;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum SubmissionStage {
    #[default]
    Idle,
    Generating,
    Loading,
    Saving,
    Done,
    Failed { error: String },
}

/// Everything the presentation layer draws.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ForgeState {
    pub stage: SubmissionStage,
    pub status: String,
    pub preview: PreviewSurface,
    /// Set while the download control should be offered.
    pub download_url: Option<String>,
    pub gallery: GalleryView,
    pub lightbox: Lightbox,
}

/// Outcome of one submission that got as far as an image URL.
#[derive(Debug)]
pub struct Submission {
    pub prompt: String,
    pub job: GenerationJob,
    pub preview: Result<LoadedVia, ForgeError>,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Forge {
    backend: Arc<dyn GenerationBackend>,
    policy: PollPolicy,
    loader: ImageLoader,
    history: HistoryStore,
    http: reqwest::Client,
    busy: AtomicBool,
    state: Mutex<ForgeState>,
}

impl Forge {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        policy: PollPolicy,
        loader: ImageLoader,
        history: HistoryStore,
    ) -> Self {
        Self {
            backend,
            policy,
            loader,
            history,
            http: reqwest::Client::new(),
            busy: AtomicBool::new(false),
            state: Mutex::new(ForgeState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ForgeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> ForgeState {
        self.lock().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn loader(&self) -> &ImageLoader {
        &self.loader
    }

    fn fail(&self, err: &ForgeError) {
        let mut state = self.lock();
        state.status = err.status_message().to_string();
        state.preview.hide();
        state.download_url = None;
        state.stage = SubmissionStage::Failed {
            error: err.to_string(),
        };
    }

    /// Rebuilds the gallery from what is persisted right now.
    pub async fn refresh_gallery(&self) -> GalleryView {
        let log = self.history.read_all().await;
        let view = render(&log);
        self.lock().gallery = view.clone();
        view
    }

    /// Form to gallery: prompt, generate, display, persist, re-render.
    ///
    /// Only one submission runs at a time; a second one gets
    /// [`ForgeError::Busy`] and leaves the state alone.
    #[instrument(
        skip(self, form),
        fields(base_type = %form.base_type, features = form.features.len())
    )]
    pub async fn submit(&self, form: &MonsterForm) -> Result<Submission, ForgeError> {
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            warn!("submission rejected, another one is in flight");
            return Err(ForgeError::Busy);
        };

        let prompt = match form.prompt() {
            Ok(prompt) => prompt,
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };
        info!(%prompt, "prompt built");
        self.lock().stage = SubmissionStage::Generating;

        let job = match generate(self.backend.as_ref(), &self.policy, &prompt).await {
            Ok(job) => job,
            Err(e) => {
                error!(error = %e, "generation failed");
                self.fail(&e);
                return Err(e);
            }
        };

        self.lock().stage = SubmissionStage::Loading;
        let mut preview = PreviewSurface::default();
        let loaded = self.loader.display(&mut preview, &job.image_url, &prompt).await;
        {
            let mut state = self.lock();
            state.preview = preview;
            state.status = match &loaded {
                Ok(_) => format!("🧠 Prompt: {}", prompt),
                Err(e) => e.status_message().to_string(),
            };
            state.download_url = Some(job.image_url.clone());
            state.stage = SubmissionStage::Saving;
        }

        if let Err(e) = self.history.append(&prompt, &job.image_url).await {
            error!(error = %e, "could not save generation to history");
        }
        self.refresh_gallery().await;
        self.lock().stage = SubmissionStage::Done;

        Ok(Submission {
            prompt,
            job,
            preview: loaded,
        })
    }

    /// Opens the lightbox on the thumbnail at `index` of the current gallery.
    pub fn open_thumbnail(&self, index: usize) -> Option<Lightbox> {
        let mut state = self.lock();
        let card = state.gallery.card(index)?.clone();
        state.lightbox.open(&card.image_url, &card.prompt);
        Some(state.lightbox.clone())
    }

    pub fn close_lightbox(&self, trigger: CloseTrigger) -> bool {
        self.lock().lightbox.close(trigger)
    }

    /// Saves the image currently offered for download into `dir`.
    pub async fn download(&self, dir: &Path) -> Result<PathBuf, ForgeError> {
        let url = self
            .lock()
            .download_url
            .clone()
            .ok_or_else(|| ForgeError::Download("no image to download".to_string()))?;
        download_image(&self.http, &url, dir).await
    }

    /// Saves the image of history entry `index` into `dir`.
    pub async fn download_entry(&self, index: usize, dir: &Path) -> Result<PathBuf, ForgeError> {
        let entry = self
            .history
            .get(index)
            .await
            .ok_or_else(|| ForgeError::Download(format!("no history entry {index}")))?;
        download_image(&self.http, &entry.image_url, dir).await
    }
}
