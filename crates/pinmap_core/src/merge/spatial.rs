//! Spatial reconciliation for board merges.
//!
//! Places an imported block of notes beside existing content instead of on
//! top of it, top-aligned with what is already on the board.

use crate::model::frame::Frame;
use crate::model::note::Note;
use rand::Rng;

/// Horizontal anchor used when the target board has no notes.
pub const EMPTY_BOARD_OFFSET_X: f64 = 100.0;
/// Gap between the right edge of existing content and the imported block.
pub const IMPORT_GUTTER_PX: f64 = 50.0;
/// Upper bound (exclusive) of the `created_at` jitter, in milliseconds.
pub const CREATED_AT_JITTER_MS: i64 = 1000;

/// Translation applied to imported board entities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
}

/// Computes the translation for `incoming` notes merged into `existing`.
///
/// `incoming` must already be remapped but not yet offset. Map notes on
/// either side are ignored.
pub fn compute_offset(existing: &[Note], incoming: &[Note]) -> Offset {
    let mut max_right: Option<f64> = None;
    let mut min_top: Option<f64> = None;
    for note in existing {
        if let Some((x, y)) = note.board_position() {
            let right = x + note.rendered_width();
            max_right = Some(max_right.map_or(right, |current| current.max(right)));
            min_top = Some(min_top.map_or(y, |current| current.min(y)));
        }
    }

    let (Some(max_right), Some(min_top)) = (max_right, min_top) else {
        return Offset {
            x: EMPTY_BOARD_OFFSET_X,
            y: 0.0,
        };
    };

    let imported_min_top = incoming
        .iter()
        .filter_map(|note| note.board_position().map(|(_, y)| y))
        .reduce(f64::min)
        .unwrap_or(0.0);

    Offset {
        x: max_right + IMPORT_GUTTER_PX,
        y: min_top - imported_min_top,
    }
}

/// Translates notes by `offset` and restamps `created_at` with jitter.
///
/// The jitter only gives same-millisecond imports a display order.
pub fn apply_offset<R: Rng>(
    notes: &mut [Note],
    offset: Offset,
    import_time: i64,
    rng: &mut R,
) {
    for note in notes {
        note.translate(offset.x, offset.y);
        note.created_at = import_time + rng.random_range(0..CREATED_AT_JITTER_MS);
    }
}

/// Translates frames by the same offset used for their notes.
pub fn apply_offset_to_frames(frames: &mut [Frame], offset: Offset) {
    for frame in frames {
        frame.translate(offset.x, offset.y);
    }
}

#[cfg(test)]
mod tests {
    use super::{apply_offset, apply_offset_to_frames, compute_offset, Offset, CREATED_AT_JITTER_MS};
    use crate::model::frame::Frame;
    use crate::model::note::{Note, NoteVariant};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn empty_board_anchors_near_origin() {
        let incoming = vec![Note::board("a", 500.0, 500.0)];
        assert_eq!(compute_offset(&[], &incoming), Offset { x: 100.0, y: 0.0 });
    }

    #[test]
    fn places_block_right_of_content_and_top_aligned() {
        let existing = vec![Note::board("e", 100.0, 50.0)];
        let mut incoming = vec![Note::board("i", 0.0, 30.0)];
        let offset = compute_offset(&existing, &incoming);
        assert_eq!(offset, Offset { x: 406.0, y: 20.0 });

        let mut rng = StdRng::seed_from_u64(7);
        apply_offset(&mut incoming, offset, 1_000, &mut rng);
        assert_eq!(incoming[0].board_position(), Some((406.0, 50.0)));
        assert!((1_000..1_000 + CREATED_AT_JITTER_MS).contains(&incoming[0].created_at));
    }

    #[test]
    fn compact_notes_use_narrow_width() {
        let mut compact = Note::board("c", 0.0, 0.0);
        compact.variant = NoteVariant::Compact;
        let offset = compute_offset(&[compact], &[]);
        assert_eq!(offset, Offset { x: 230.0, y: 0.0 });
    }

    #[test]
    fn frames_follow_the_same_offset() {
        let mut frames = vec![Frame::new("F", 10.0, 10.0)];
        apply_offset_to_frames(&mut frames, Offset { x: 5.0, y: -5.0 });
        assert_eq!((frames[0].x, frames[0].y), (15.0, 5.0));
    }
}
