//! CSV note listing.
//!
//! # Invariants
//! - Output starts with a UTF-8 BOM and quotes every field.
//! - Compact notes are not listed.
//! - Rows follow `created_at` order.

use super::ExportError;
use crate::model::note::{NoteVariant, Placement};
use crate::model::project::{Project, ProjectType};
use crate::repo::ProjectStore;
use ::csv::{QuoteStyle, WriterBuilder};
use log::info;

const UTF8_BOM: &str = "\u{feff}";
const TAG_COLUMNS: usize = 3;
const GROUP_COLUMNS: usize = 3;

/// Renders the note listing of a project.
pub fn render_csv(project: &Project) -> Result<String, ExportError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(Vec::new());

    let position_header = match project.kind {
        ProjectType::Map => "Latitude, Longitude",
        ProjectType::Image => "X, Y",
    };
    writer.write_record([
        position_header,
        "Text",
        "Tag 1",
        "Tag 2",
        "Tag 3",
        "Group 1",
        "Group 2",
        "Group 3",
    ])?;

    for note in project
        .notes_in_display_order()
        .into_iter()
        .filter(|note| note.variant != NoteVariant::Compact)
    {
        let position = match note.placement {
            Placement::Map { lat, lng } => format!("{lat}, {lng}"),
            Placement::Board { x, y } => format!("{}, {}", x.round(), y.round()),
        };
        let mut record = Vec::with_capacity(2 + TAG_COLUMNS + GROUP_COLUMNS);
        record.push(position);
        record.push(note.text.clone());
        record.extend(padded(
            note.tags.iter().map(|tag| tag.label.clone()),
            TAG_COLUMNS,
        ));
        record.extend(padded(project.group_labels(note).into_iter(), GROUP_COLUMNS));
        writer.write_record(&record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Csv(err.into_error().into()))?;
    let mut output = String::with_capacity(UTF8_BOM.len() + bytes.len());
    output.push_str(UTF8_BOM);
    output.push_str(&String::from_utf8_lossy(&bytes));
    Ok(output)
}

/// Loads a project and renders its note listing.
pub fn export_csv<S: ProjectStore>(store: &S, project_id: &str) -> Result<String, ExportError> {
    let project = store
        .load_project(project_id, false)?
        .ok_or_else(|| ExportError::ProjectNotFound(project_id.to_string()))?;
    let csv = render_csv(&project)?;
    info!(
        "event=export_csv module=export status=ok project_id={} bytes={}",
        project_id,
        csv.len()
    );
    Ok(csv)
}

fn padded(values: impl Iterator<Item = String>, width: usize) -> impl Iterator<Item = String> {
    values.chain(std::iter::repeat(String::new())).take(width)
}
