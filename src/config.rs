use std::env;
use std::path::PathBuf;

use anyhow::Result;
use once_cell::sync::{Lazy, OnceCell};

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_analysis_model: String,
    pub gemini_image_model: String,
    pub gemini_timeout_secs: u64,
    pub log_level: String,
    pub log_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Fallbacks applied while loading; logged once logging is up.
    pub notices: Vec<String>,
}

static LOADED: OnceCell<Config> = OnceCell::new();

pub static CONFIG: Lazy<&'static Config> =
    Lazy::new(|| Config::init().expect("Failed to load configuration"));

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn normalize_base_url(value: String, notices: &mut Vec<String>) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        notices.push(format!("GEMINI_BASE_URL is empty; using {DEFAULT_GEMINI_BASE_URL}"));
        return DEFAULT_GEMINI_BASE_URL.to_string();
    }
    trimmed.to_string()
}

fn positive_timeout(value: u64, notices: &mut Vec<String>) -> u64 {
    if value == 0 {
        notices.push("GEMINI_TIMEOUT_SECS must be positive; using 120.".to_string());
        return 120;
    }
    value
}

fn resolve_api_key() -> String {
    env::var("GEMINI_API_KEY")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| env::var("API_KEY").ok())
        .unwrap_or_default()
        .trim()
        .to_string()
}

impl Config {
    /// Loads the environment once; later calls return the same instance.
    pub fn init() -> Result<&'static Config> {
        LOADED.get_or_try_init(Config::load)
    }

    fn load() -> Result<Self> {
        let gemini_api_key = resolve_api_key();
        if gemini_api_key.is_empty() {
            return Err(anyhow::anyhow!("GEMINI_API_KEY is required"));
        }

        let mut notices = Vec::new();
        let gemini_timeout_secs =
            positive_timeout(env_u64("GEMINI_TIMEOUT_SECS", 120), &mut notices);
        let gemini_base_url = normalize_base_url(
            env_string("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL),
            &mut notices,
        );

        Ok(Config {
            gemini_api_key,
            gemini_base_url,
            gemini_analysis_model: env_string("GEMINI_ANALYSIS_MODEL", "gemini-2.5-flash"),
            gemini_image_model: env_string("GEMINI_IMAGE_MODEL", "gemini-2.5-flash-image"),
            gemini_timeout_secs,
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            log_dir: PathBuf::from(env_string("LOG_DIR", "logs")),
            output_dir: PathBuf::from(env_string("SHOTS_OUTPUT_DIR", "shots")),
            notices,
        })
    }
}

pub const ANALYSIS_PROMPT: &str = "Analyze this product image. Identify the main product. Generate exactly 10 creative and distinct shot ideas for a professional photoshoot. The ideas should be concise, one-sentence descriptions suitable for a text-to-image prompt. Focus on composition, lighting, and environment.";

pub const IDEAS_SCHEMA_DESCRIPTION: &str = "An array of 10 creative shot ideas.";
