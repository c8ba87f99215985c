//! Import-time image compression.
//!
//! # Responsibility
//! - Downscale and re-encode inline images of freshly imported notes.
//!
//! # Invariants
//! - Only `ImageSource::Inline` values are touched.
//! - A result that fails or is not smaller than the input keeps the original.
//! - Every job finishes before `compress_note_images` returns.

use super::data_url::{encode_data_url, parse_data_url};
use super::AssetError;
use crate::model::image::ImageSource;
use crate::model::note::NoteId;
use crate::model::project::Project;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use log::{debug, warn};
use rayon::prelude::*;
use std::collections::HashSet;

pub const DEFAULT_MAX_DIMENSION: u32 = 1600;
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionOptions {
    /// Longest edge after downscaling, in pixels.
    pub max_dimension: u32,
    /// JPEG quality, 1..=100.
    pub jpeg_quality: u8,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Per-image outcome counts of one compression pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressionReport {
    pub compressed: usize,
    /// Already small enough; original kept.
    pub unchanged: usize,
    /// Could not be decoded or encoded; original kept.
    pub failed: usize,
}

enum Outcome {
    Compressed,
    Unchanged,
    Failed,
}

/// Re-encodes one data URL.
///
/// Returns `Ok(None)` when the re-encoded image would not be smaller.
pub fn compress_data_url(
    value: &str,
    options: CompressionOptions,
) -> Result<Option<String>, AssetError> {
    let source = parse_data_url(value)?;
    let decoded = image::load_from_memory(&source.bytes)?;
    let max = options.max_dimension.max(1);
    let resized = if decoded.width() > max || decoded.height() > max {
        decoded.resize(max, max, FilterType::Triangle)
    } else {
        decoded
    };

    let mut encoded = Vec::new();
    let mime = if resized.color().has_alpha() {
        resized.write_with_encoder(PngEncoder::new(&mut encoded))?;
        "image/png"
    } else {
        let quality = options.jpeg_quality.clamp(1, 100);
        resized
            .to_rgb8()
            .write_with_encoder(JpegEncoder::new_with_quality(&mut encoded, quality))?;
        "image/jpeg"
    };

    if encoded.len() >= source.bytes.len() {
        return Ok(None);
    }
    Ok(Some(encode_data_url(mime, &encoded)))
}

/// Compresses inline images and sketches of the listed notes in parallel.
pub fn compress_note_images(
    project: &mut Project,
    note_ids: &[NoteId],
    options: CompressionOptions,
) -> CompressionReport {
    let wanted: HashSet<&str> = note_ids.iter().map(String::as_str).collect();
    let mut targets: Vec<&mut ImageSource> = project
        .notes
        .iter_mut()
        .filter(|note| wanted.contains(note.id.as_str()))
        .flat_map(|note| note.image_fields_mut())
        .filter(|source| source.is_inline())
        .collect();

    let outcomes: Vec<Outcome> = targets
        .par_iter_mut()
        .map(|source| compress_in_place(source, options))
        .collect();

    let mut report = CompressionReport::default();
    for outcome in outcomes {
        match outcome {
            Outcome::Compressed => report.compressed += 1,
            Outcome::Unchanged => report.unchanged += 1,
            Outcome::Failed => report.failed += 1,
        }
    }
    debug!(
        "event=asset_compress module=assets status=ok compressed={} unchanged={} failed={}",
        report.compressed, report.unchanged, report.failed
    );
    report
}

fn compress_in_place(source: &mut ImageSource, options: CompressionOptions) -> Outcome {
    let ImageSource::Inline(url) = source else {
        return Outcome::Unchanged;
    };
    match compress_data_url(url, options) {
        Ok(Some(smaller)) => {
            *url = smaller;
            Outcome::Compressed
        }
        Ok(None) => Outcome::Unchanged,
        Err(err) => {
            warn!("event=asset_compress module=assets status=warn error={err}");
            Outcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{compress_data_url, compress_note_images, CompressionOptions};
    use crate::assets::data_url::{encode_data_url, parse_data_url};
    use crate::model::image::ImageSource;
    use crate::model::note::Note;
    use crate::model::project::{Project, ProjectType};
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn large_png_data_url() -> String {
        let image = RgbImage::from_fn(400, 300, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        encode_data_url("image/png", &bytes)
    }

    #[test]
    fn downscales_opaque_images_to_jpeg() {
        let options = CompressionOptions {
            max_dimension: 100,
            jpeg_quality: 70,
        };
        let compressed = compress_data_url(&large_png_data_url(), options)
            .unwrap()
            .expect("smaller output");
        let parsed = parse_data_url(&compressed).unwrap();
        assert_eq!(parsed.mime, "image/jpeg");
        let decoded = image::load_from_memory(&parsed.bytes).unwrap();
        assert_eq!(decoded.width(), 100);
        assert_eq!(decoded.height(), 75);
    }

    #[test]
    fn undecodable_images_are_kept_and_counted() {
        let mut project = Project::new("board", ProjectType::Image);
        let mut note = Note::board("a", 0.0, 0.0);
        let garbage = encode_data_url("image/png", b"not an image");
        note.images = vec![
            ImageSource::Inline(garbage.clone()),
            ImageSource::External("https://example.com/x.png".to_string()),
        ];
        let note_id = note.id.clone();
        project.notes.push(note);

        let report = compress_note_images(&mut project, &[note_id], CompressionOptions::default());
        assert_eq!(report.failed, 1);
        assert_eq!(report.compressed, 0);
        assert_eq!(project.notes[0].images[0], ImageSource::Inline(garbage));
    }

    #[test]
    fn only_listed_notes_are_touched() {
        let mut project = Project::new("board", ProjectType::Image);
        let mut note = Note::board("a", 0.0, 0.0);
        let original = large_png_data_url();
        note.images = vec![ImageSource::Inline(original.clone())];
        project.notes.push(note);

        let report = compress_note_images(&mut project, &[], CompressionOptions::default());
        assert_eq!(report, Default::default());
        assert_eq!(project.notes[0].images[0], ImageSource::Inline(original));
    }
}
