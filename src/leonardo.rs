use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::ForgeError;
use crate::poll::PollPolicy;
use crate::settings::Settings;

pub const DEFAULT_ENDPOINT: &str = "https://cloud.leonardo.ai/api/rest/v1/generations";
pub const DEFAULT_MODEL_ID: &str = "e316348f-7773-490e-adcd-46757c738eb7";

const IMAGE_SIZE: u32 = 512;
const SCHEDULER: &str = "LEONARDO";
const GUIDANCE_SCALE: u32 = 7;

#[derive(Debug, Serialize)]
struct GenerationRequestBody<'a> {
    prompt: &'a str,
    width: u32,
    height: u32,
    num_images: u32,
    #[serde(rename = "modelId")]
    model_id: &'a str,
    scheduler: &'a str,
    guidance_scale: u32,
}

#[derive(Debug, Deserialize)]
struct SdGenerationJob {
    #[serde(rename = "generationId")]
    generation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateGenerationResponse {
    #[serde(rename = "sdGenerationJob")]
    sd_generation_job: Option<SdGenerationJob>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerationByPk {
    generated_images: Option<Vec<GeneratedImage>>,
}

#[derive(Debug, Deserialize)]
struct GenerationStatusResponse {
    generations_by_pk: Option<GenerationByPk>,
}

impl GenerationStatusResponse {
    fn image_url(self) -> Option<String> {
        self.generations_by_pk?
            .generated_images?
            .into_iter()
            .next()?
            .url
            .filter(|u| !u.is_empty())
    }
}

/// A finished generation: the service's job id and the image it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationJob {
    pub generation_id: String,
    pub image_url: String,
}

/// The two calls the generation service offers.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Starts a generation and returns its job id.
    async fn submit(&self, prompt: &str) -> Result<String, ForgeError>;

    /// Looks up a job; `Ok(None)` means no image yet.
    async fn poll(&self, generation_id: &str) -> anyhow::Result<Option<String>>;
}

#[derive(Debug, Clone)]
pub struct LeonardoClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model_id: String,
}

impl LeonardoClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
            model_id: model_id.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.endpoint(), settings.api_key(), settings.model_id())
    }

    fn bearer(&self) -> Result<String, ForgeError> {
        self.api_key
            .as_deref()
            .map(|k| format!("Bearer {}", k))
            .ok_or_else(|| ForgeError::Submission("Leonardo API key not set".to_string()))
    }
}

#[async_trait]
impl GenerationBackend for LeonardoClient {
    async fn submit(&self, prompt: &str) -> Result<String, ForgeError> {
        let body = GenerationRequestBody {
            prompt,
            width: IMAGE_SIZE,
            height: IMAGE_SIZE,
            num_images: 1,
            model_id: &self.model_id,
            scheduler: SCHEDULER,
            guidance_scale: GUIDANCE_SCALE,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .header("authorization", self.bearer()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| ForgeError::Submission(format!("leonardo request failed: {e}")))?;

        let status = resp.status();
        debug!(%status, "generation submit answered");

        // The body is read even on failure so it ends up in the log.
        let text = resp.text().await.unwrap_or_default();
        if status != StatusCode::OK {
            warn!(%status, body = %text, "leonardo rejected generation");
            return Err(ForgeError::Submission(format!("leonardo error: HTTP {}", status)));
        }

        let parsed: CreateGenerationResponse = serde_json::from_str(&text)
            .map_err(|e| ForgeError::Submission(format!("leonardo parse error: {e}")))?;

        parsed
            .sd_generation_job
            .and_then(|job| job.generation_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ForgeError::Submission("leonardo: no generation id in response".to_string())
            })
    }

    async fn poll(&self, generation_id: &str) -> anyhow::Result<Option<String>> {
        let url = format!("{}/{}", self.endpoint, generation_id);
        let bearer = self.bearer()?;

        let resp = self
            .http
            .get(url)
            .header("authorization", bearer)
            .send()
            .await
            .context("leonardo status request failed")?;

        debug!(status = %resp.status(), "generation status answered");

        let value: GenerationStatusResponse = resp
            .json()
            .await
            .context("leonardo status parse error")?;

        Ok(value.image_url())
    }
}

/// Submits `prompt` and polls until the service hands back an image URL.
///
/// A poll that errors counts as "not ready yet"; only running out of attempts
/// ends the loop without a URL.
#[instrument(skip(backend, policy), fields(max_attempts = policy.max_attempts))]
pub async fn generate(
    backend: &dyn GenerationBackend,
    policy: &PollPolicy,
    prompt: &str,
) -> Result<GenerationJob, ForgeError> {
    let generation_id = backend.submit(prompt).await?;
    info!(%generation_id, "generation accepted, polling");

    let found = policy
        .run(|attempt| {
            let id = generation_id.as_str();
            async move {
                match backend.poll(id).await {
                    Ok(url) => url,
                    Err(e) => {
                        warn!(attempt, error = %e, "status poll failed");
                        None
                    }
                }
            }
        })
        .await;

    match found {
        Ok(image_url) => {
            info!(%image_url, "image ready");
            Ok(GenerationJob {
                generation_id,
                image_url,
            })
        }
        Err(exhausted) => Err(ForgeError::Timeout {
            attempts: exhausted.attempts,
        }),
    }
}
