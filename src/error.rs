use thiserror::Error;

pub const VALIDATION_MESSAGE: &str = "⚠️ Please select at least one feature.";
pub const GENERATION_FAILED_MESSAGE: &str = "⚠️ Failed to generate image. Please try again.";
pub const PREVIEW_FAILED_MESSAGE: &str = "⚠️ Failed to load image preview.";
pub const DOWNLOAD_FAILED_MESSAGE: &str = "⚠️ Failed to download image. See console.";
pub const BUSY_MESSAGE: &str = "⏳ A monster is already being generated. Please wait.";

/// Everything that can go wrong between the form and the gallery.
#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("no feature selected")]
    Validation,

    #[error("generation request failed: {0}")]
    Submission(String),

    #[error("image not ready after {attempts} polls")]
    Timeout { attempts: u32 },

    #[error("image load failed: {0}")]
    Load(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("a generation is already in flight")]
    Busy,

    #[error("storage error: {0}")]
    Storage(String),
}

impl ForgeError {
    /// Plain status line shown to the user for this error.
    pub fn status_message(&self) -> &'static str {
        match self {
            ForgeError::Validation => VALIDATION_MESSAGE,
            ForgeError::Submission(_) | ForgeError::Timeout { .. } | ForgeError::Storage(_) => {
                GENERATION_FAILED_MESSAGE
            }
            ForgeError::Load(_) => PREVIEW_FAILED_MESSAGE,
            ForgeError::Download(_) => DOWNLOAD_FAILED_MESSAGE,
            ForgeError::Busy => BUSY_MESSAGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_failures_share_one_status_line() {
        let submission = ForgeError::Submission("HTTP 401".into());
        let timeout = ForgeError::Timeout { attempts: 10 };
        assert_eq!(submission.status_message(), GENERATION_FAILED_MESSAGE);
        assert_eq!(timeout.status_message(), GENERATION_FAILED_MESSAGE);
        assert_eq!(timeout.to_string(), "image not ready after 10 polls");
    }

    #[test]
    fn validation_and_load_have_their_own_lines() {
        assert_eq!(ForgeError::Validation.status_message(), VALIDATION_MESSAGE);
        assert_eq!(
            ForgeError::Load("cors".into()).status_message(),
            PREVIEW_FAILED_MESSAGE
        );
    }

    #[test]
    fn busy_and_storage_map_to_their_lines() {
        assert_eq!(ForgeError::Busy.status_message(), BUSY_MESSAGE);
        let storage = ForgeError::Storage("database is locked".into());
        assert_eq!(storage.status_message(), GENERATION_FAILED_MESSAGE);
        assert_eq!(storage.to_string(), "storage error: database is locked");
    }
}
