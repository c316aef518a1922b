//! Two-strategy image display.
//!
//! 1. Direct: point the preview at the remote URL.
//! 2. Fallback: fetch the bytes, wrap them in a local object reference and
//!    point the preview at that instead.
//!
//! Object references are released [`OBJECT_URL_LIFETIME`] after
//! assignment, whether or not the preview still shows them.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::blob::ObjectUrlRegistry;
use crate::error::ForgeError;

pub const OBJECT_URL_LIFETIME: Duration = Duration::from_secs(60);
pub const PREVIEW_ALT: &str = "Generated monster";

/// The image preview as the presentation layer should draw it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreviewSurface {
    pub src: Option<String>,
    pub alt: Option<String>,
    pub caption: Option<String>,
    pub visible: bool,
}

impl PreviewSurface {
    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn assign(&mut self, src: &str) {
        self.src = Some(src.to_string());
        self.alt = Some(PREVIEW_ALT.to_string());
    }

    fn show(&mut self, caption: &str) {
        self.caption = Some(caption.to_string());
        self.visible = true;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum LoadedVia {
    Direct,
    ObjectUrl { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Load signal for a URL assigned straight to the preview.
#[async_trait]
pub trait DirectLoad: Send + Sync {
    async fn load(&self, url: &str) -> anyhow::Result<()>;
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> anyhow::Result<FetchedImage>;
}

/// reqwest-backed implementation of both strategies.
#[derive(Debug, Clone, Default)]
pub struct HttpImageSource {
    http: reqwest::Client,
}

impl HttpImageSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DirectLoad for HttpImageSource {
    async fn load(&self, url: &str) -> anyhow::Result<()> {
        let resp = self.http.head(url).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("HTTP {}", resp.status());
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png");
        if !content_type.starts_with("image/") {
            anyhow::bail!("not an image: {}", content_type);
        }
        Ok(())
    }
}

#[async_trait]
impl ImageFetcher for HttpImageSource {
    async fn fetch(&self, url: &str) -> anyhow::Result<FetchedImage> {
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("network response not OK: HTTP {}", resp.status());
        }
        let mime_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .to_string();
        let bytes = resp.bytes().await?.to_vec();
        Ok(FetchedImage { bytes, mime_type })
    }
}

#[derive(Clone)]
pub struct ImageLoader {
    direct: Arc<dyn DirectLoad>,
    fetcher: Arc<dyn ImageFetcher>,
    registry: ObjectUrlRegistry,
    release_after: Duration,
}

impl ImageLoader {
    pub fn new(
        direct: Arc<dyn DirectLoad>,
        fetcher: Arc<dyn ImageFetcher>,
        registry: ObjectUrlRegistry,
    ) -> Self {
        Self {
            direct,
            fetcher,
            registry,
            release_after: OBJECT_URL_LIFETIME,
        }
    }

    pub fn registry(&self) -> &ObjectUrlRegistry {
        &self.registry
    }

    /// Shows `url` on `surface` with `caption`, falling back to a local object
    /// reference when the direct load fails.
    pub async fn display(
        &self,
        surface: &mut PreviewSurface,
        url: &str,
        caption: &str,
    ) -> Result<LoadedVia, ForgeError> {
        surface.clear();
        surface.assign(url);

        let direct_err = match self.direct.load(url).await {
            Ok(()) => {
                info!("direct image load succeeded");
                surface.show(caption);
                return Ok(LoadedVia::Direct);
            }
            Err(e) => e,
        };
        warn!(error = %direct_err, "direct image load failed, trying object url fallback");

        match self.fetcher.fetch(url).await {
            Ok(image) => {
                let object_url = self.registry.create(image.bytes, image.mime_type);
                surface.assign(&object_url);
                surface.show(caption);
                // Detached: the timer outlives this call.
                self.registry.revoke_after(object_url.clone(), self.release_after);
                info!(%object_url, "object url fallback succeeded");
                Ok(LoadedVia::ObjectUrl { url: object_url })
            }
            Err(e) => {
                error!(error = %e, "object url fallback also failed");
                surface.hide();
                Err(ForgeError::Load(format!("direct: {direct_err}; fallback: {e}")))
            }
        }
    }
}
