use std::path::PathBuf;

pub const ANALYSIS_FAILED_MESSAGE: &str = "Failed to analyze the image. Please try again.";
pub const GENERATION_FAILED_MESSAGE: &str = "Failed to generate images. Please try again.";
pub const MISSING_IMAGE_MESSAGE: &str = "Please upload an image first.";
pub const MISSING_IDEAS_MESSAGE: &str = "Please analyze an image to get shot ideas first.";

#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error("{0}")]
    Precondition(String),
    #[error("Invalid response format from Gemini API: {0}")]
    ResponseFormat(String),
    #[error("Failed to get shot ideas from Gemini API: {0}")]
    Analysis(#[source] anyhow::Error),
    #[error("Failed to generate image for prompt: \"{idea}\"")]
    Generation {
        idea: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Archive export is unavailable: {0}")]
    ExportUnavailable(String),
    #[error("Result from superseded run {epoch} was discarded")]
    Superseded { epoch: u64 },
    #[error("Invalid image data: {0}")]
    Encoding(String),
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StudioError {
    /// The generic message shown to the user for this failure. Detail stays in
    /// the logs.
    pub fn user_message(&self) -> String {
        match self {
            StudioError::Precondition(message) => message.clone(),
            StudioError::ResponseFormat(_) | StudioError::Analysis(_) => {
                ANALYSIS_FAILED_MESSAGE.to_string()
            }
            StudioError::Generation { .. } => GENERATION_FAILED_MESSAGE.to_string(),
            StudioError::ExportUnavailable(_) => {
                "Bulk download is unavailable. Save the shots individually instead.".to_string()
            }
            StudioError::Superseded { .. } => {
                "A newer upload replaced this run; its results were discarded.".to_string()
            }
            StudioError::Encoding(_) => "The image could not be read.".to_string(),
            StudioError::Io { path, .. } => format!("Could not write {}.", path.display()),
        }
    }
}

pub type StudioResult<T> = Result<T, StudioError>;
