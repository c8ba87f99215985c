//! Image field representation.
//!
//! Image-bearing fields (`images`, `sketch`, `backgroundImage`) travel as
//! plain strings on the wire. Three shapes exist:
//! - `data:<mime>;base64,...` inline payloads (exports, fresh imports)
//! - `asset:<sha256>` references into the local content store
//! - anything else, kept verbatim (remote URLs)

use serde::{Deserialize, Serialize};

/// Prefix for content-store references.
pub const ASSET_REF_PREFIX: &str = "asset:";
const DATA_URL_PREFIX: &str = "data:";

/// Content-addressed identifier of a stored image (lowercase SHA-256 hex).
pub type AssetId = String;

/// One image value as held by a note or project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ImageSource {
    /// Self-contained `data:` URL.
    Inline(String),
    /// Reference into the image asset store.
    Stored(AssetId),
    /// Opaque external location, never fetched by core.
    External(String),
}

impl ImageSource {
    /// Whether the value still carries its bytes inline.
    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline(_))
    }

    /// Returns the asset id for stored references.
    pub fn asset_id(&self) -> Option<&str> {
        match self {
            Self::Stored(id) => Some(id.as_str()),
            _ => None,
        }
    }

    /// Wire form of this value.
    pub fn to_wire(&self) -> String {
        match self {
            Self::Inline(value) | Self::External(value) => value.clone(),
            Self::Stored(id) => format!("{ASSET_REF_PREFIX}{id}"),
        }
    }
}

impl From<String> for ImageSource {
    fn from(value: String) -> Self {
        if let Some(id) = value.strip_prefix(ASSET_REF_PREFIX) {
            return Self::Stored(id.to_string());
        }
        if value.starts_with(DATA_URL_PREFIX) {
            return Self::Inline(value);
        }
        Self::External(value)
    }
}

impl From<&str> for ImageSource {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ImageSource> for String {
    fn from(value: ImageSource) -> Self {
        match value {
            ImageSource::Inline(value) | ImageSource::External(value) => value,
            ImageSource::Stored(id) => format!("{ASSET_REF_PREFIX}{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ImageSource;

    #[test]
    fn classifies_wire_strings() {
        assert!(ImageSource::from("data:image/png;base64,AAAA").is_inline());
        assert_eq!(
            ImageSource::from("asset:abc123").asset_id(),
            Some("abc123")
        );
        assert_eq!(
            ImageSource::from("https://example.com/a.png"),
            ImageSource::External("https://example.com/a.png".to_string())
        );
    }

    #[test]
    fn stored_reference_keeps_prefix_on_the_wire() {
        let json = serde_json::to_string(&ImageSource::Stored("ff00".to_string())).unwrap();
        assert_eq!(json, "\"asset:ff00\"");
    }
}
