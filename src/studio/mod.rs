pub mod analysis;
pub mod backend;
pub mod codec;
pub mod error;
pub mod export;
pub mod filename;
pub mod generation;
pub mod settings;
pub mod workflow;

pub use codec::UploadedImage;
pub use error::StudioError;
pub use settings::{AspectRatio, StylePreset};
pub use workflow::Studio;
