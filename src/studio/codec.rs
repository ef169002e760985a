use std::fs;
use std::path::Path;

use base64::{engine::general_purpose, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::studio::error::{StudioError, StudioResult};

pub const FALLBACK_MIME_TYPE: &str = "image/jpeg";
pub const FALLBACK_EXTENSION: &str = "png";

static DATA_URI_MIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:([A-Za-z]+/[A-Za-z0-9.+-]+);base64,").expect("valid data uri regex")
});

static DATA_URI_IMAGE_SUBTYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:image/([A-Za-z]+);").expect("valid subtype regex"));

const SUPPORTED_UPLOAD_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp"];

/// A product photo as supplied by the user. Replaced wholesale on re-upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    bytes: Vec<u8>,
    mime_type: String,
    data_uri: String,
}

impl UploadedImage {
    pub fn from_bytes(bytes: Vec<u8>, declared_mime: Option<&str>) -> StudioResult<Self> {
        if bytes.is_empty() {
            return Err(StudioError::Encoding("image is empty".to_string()));
        }

        let mime_type = detect_mime_type(&bytes)
            .or_else(|| declared_mime.map(normalize_mime_type))
            .ok_or_else(|| StudioError::Encoding("unrecognized image format".to_string()))?;
        if !SUPPORTED_UPLOAD_TYPES.contains(&mime_type.as_str()) {
            return Err(StudioError::Encoding(format!(
                "unsupported image type {mime_type}; use PNG, JPG or WEBP"
            )));
        }

        let data_uri = encode(&bytes, &mime_type);
        Ok(Self {
            bytes,
            mime_type,
            data_uri,
        })
    }

    pub fn from_path(path: &Path) -> StudioResult<Self> {
        let bytes = fs::read(path)
            .map_err(|err| StudioError::Encoding(format!("{}: {err}", path.display())))?;
        let declared = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(mime_for_extension);
        Self::from_bytes(bytes, declared)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }

    /// The base64 body sent to the model as inline data.
    pub fn payload(&self) -> &str {
        payload_of(self.data_uri())
    }
}

pub fn encode(bytes: &[u8], mime_type: &str) -> String {
    format!(
        "data:{};base64,{}",
        mime_type,
        general_purpose::STANDARD.encode(bytes)
    )
}

pub fn mime_type_of(data_uri: &str) -> String {
    DATA_URI_MIME
        .captures(data_uri)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string())
}

pub fn payload_of(data_uri: &str) -> &str {
    data_uri
        .split_once(',')
        .map(|(_, payload)| payload)
        .unwrap_or("")
}

pub fn decode_payload(data_uri: &str) -> StudioResult<Vec<u8>> {
    let payload = payload_of(data_uri);
    if payload.is_empty() {
        return Err(StudioError::Encoding("data uri has no payload".to_string()));
    }
    general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|err| StudioError::Encoding(err.to_string()))
}

pub fn extension_of(data_uri: &str) -> String {
    DATA_URI_IMAGE_SUBTYPE
        .captures(data_uri)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    infer::get(data).map(|kind| normalize_mime_type(kind.mime_type()))
}

pub fn normalize_mime_type(mime_type: &str) -> String {
    let lowered = mime_type.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        "image/x-png" => "image/png".to_string(),
        _ => lowered,
    }
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
