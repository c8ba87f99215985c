//! Inline image handling: data-URL codec and import-time compression.
//!
//! # Invariants
//! - Failures never lose the original image bytes.
//! - Asset ids are lowercase SHA-256 hex digests of the decoded bytes.

pub mod compress;
pub mod data_url;

use std::error::Error;
use std::fmt::{Display, Formatter};

pub use compress::{compress_data_url, compress_note_images, CompressionOptions, CompressionReport};
pub use data_url::{asset_id_for, encode_data_url, parse_data_url, DataUrl};

/// Failure while decoding or re-encoding one image.
#[derive(Debug)]
pub enum AssetError {
    /// Value is not a `data:<mime>;base64,<payload>` URL.
    NotDataUrl,
    Base64(base64::DecodeError),
    Image(image::ImageError),
}

impl Display for AssetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotDataUrl => write!(f, "value is not a base64 data URL"),
            Self::Base64(err) => write!(f, "invalid base64 payload: {err}"),
            Self::Image(err) => write!(f, "image codec failure: {err}"),
        }
    }
}

impl Error for AssetError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotDataUrl => None,
            Self::Base64(err) => Some(err),
            Self::Image(err) => Some(err),
        }
    }
}

impl From<base64::DecodeError> for AssetError {
    fn from(value: base64::DecodeError) -> Self {
        Self::Base64(value)
    }
}

impl From<image::ImageError> for AssetError {
    fn from(value: image::ImageError) -> Self {
        Self::Image(value)
    }
}
