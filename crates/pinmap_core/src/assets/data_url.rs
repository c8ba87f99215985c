//! `data:` URL parsing and rendering.

use super::AssetError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

static DATA_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^data:([A-Za-z0-9.+/-]*)((?:;[^;,]*)*?);base64,(.*)$")
        .expect("valid data url regex")
});

const DEFAULT_MIME: &str = "application/octet-stream";

/// Decoded data URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Decodes a base64 `data:` URL. Whitespace inside the payload is ignored.
pub fn parse_data_url(value: &str) -> Result<DataUrl, AssetError> {
    let captures = DATA_URL_RE
        .captures(value.trim())
        .ok_or(AssetError::NotDataUrl)?;
    let mime = captures
        .get(1)
        .map(|m| m.as_str().trim())
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_MIME)
        .to_ascii_lowercase();
    let payload: String = captures
        .get(3)
        .map(|m| m.as_str())
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD.decode(payload)?;
    Ok(DataUrl { mime, bytes })
}

/// Renders bytes as a base64 `data:` URL.
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Content-addressed id for stored image bytes.
pub fn asset_id_for(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
