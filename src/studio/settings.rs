use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatio {
    #[default]
    Square,
    Portrait,
    Landscape,
}

impl AspectRatio {
    pub fn ratio(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "3:4",
            AspectRatio::Landscape => "16:9",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AspectRatio::Square => "square",
            AspectRatio::Portrait => "portrait",
            AspectRatio::Landscape => "landscape",
        }
    }

    /// Phrase used in generation prompts, e.g. `portrait (3:4)`.
    pub fn prompt_term(self) -> String {
        format!("{} ({})", self.label(), self.ratio())
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StylePreset {
    #[default]
    Default,
    Vibrant,
    Minimalist,
    Cinematic,
}

impl StylePreset {
    pub fn label(self) -> &'static str {
        match self {
            StylePreset::Default => "default",
            StylePreset::Vibrant => "vibrant",
            StylePreset::Minimalist => "minimalist",
            StylePreset::Cinematic => "cinematic",
        }
    }

    pub fn is_default(self) -> bool {
        self == StylePreset::Default
    }
}

impl fmt::Display for StylePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Applied uniformly to every request of a generation batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RenderSettings {
    pub aspect_ratio: AspectRatio,
    pub style: StylePreset,
}
