//! Content-addressed image asset storage.
//!
//! # Responsibility
//! - Store decoded image bytes once per SHA-256 digest.
//! - Swap inline data URLs for `asset:<hash>` references and back.
//!
//! # Invariants
//! - Storing the same bytes twice is a no-op returning the same id.
//! - Hydration leaves a reference untouched when its asset row is missing.

use crate::assets::{asset_id_for, encode_data_url, parse_data_url, DataUrl};
use crate::model::image::{AssetId, ImageSource};
use crate::model::project::Project;
use crate::repo::{ensure_table, RepoResult};
use log::warn;
use rusqlite::{params, Connection, OptionalExtension};

pub(crate) fn ensure_asset_table(conn: &Connection) -> RepoResult<()> {
    ensure_table(conn, "image_assets", &["id", "mime", "bytes", "byte_len"])
}

/// Stores decoded image bytes and returns their asset id.
pub fn store_asset(conn: &Connection, mime: &str, bytes: &[u8]) -> RepoResult<AssetId> {
    let asset_id = asset_id_for(bytes);
    conn.execute(
        "INSERT OR IGNORE INTO image_assets (id, mime, bytes, byte_len)
         VALUES (?1, ?2, ?3, ?4);",
        params![asset_id, mime, bytes, bytes.len() as i64],
    )?;
    Ok(asset_id)
}

/// Loads one stored asset.
pub fn load_asset(conn: &Connection, asset_id: &str) -> RepoResult<Option<DataUrl>> {
    let asset = conn
        .query_row(
            "SELECT mime, bytes FROM image_assets WHERE id = ?1;",
            [asset_id],
            |row| {
                Ok(DataUrl {
                    mime: row.get(0)?,
                    bytes: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(asset)
}

/// Number of stored assets.
pub fn count_assets(conn: &Connection) -> RepoResult<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM image_assets;", [], |row| row.get(0))?;
    Ok(count as usize)
}

/// Replaces every decodable inline image with a stored reference.
///
/// Values that look inline but do not decode are kept as they are.
/// Returns how many fields were externalized.
pub fn externalize_images(conn: &Connection, project: &mut Project) -> RepoResult<usize> {
    let mut externalized = 0;
    for field in project.image_fields_mut() {
        let ImageSource::Inline(url) = field else {
            continue;
        };
        match parse_data_url(url) {
            Ok(data) => {
                let asset_id = store_asset(conn, &data.mime, &data.bytes)?;
                *field = ImageSource::Stored(asset_id);
                externalized += 1;
            }
            Err(err) => {
                warn!("event=asset_externalize module=repo status=warn error={err}");
            }
        }
    }
    Ok(externalized)
}

/// Turns stored references back into data URLs.
///
/// Returns how many references could not be resolved.
pub fn hydrate_images(conn: &Connection, project: &mut Project) -> RepoResult<usize> {
    let mut missing = 0;
    for field in project.image_fields_mut() {
        let Some(asset_id) = field.asset_id().map(str::to_string) else {
            continue;
        };
        match load_asset(conn, &asset_id)? {
            Some(asset) => *field = ImageSource::Inline(encode_data_url(&asset.mime, &asset.bytes)),
            None => missing += 1,
        }
    }
    if missing > 0 {
        warn!(
            "event=asset_hydrate module=repo status=warn project_id={} missing={}",
            project.id, missing
        );
    }
    Ok(missing)
}

#[cfg(test)]
mod tests {
    use super::{count_assets, externalize_images, hydrate_images, store_asset};
    use crate::assets::encode_data_url;
    use crate::db::open_db_in_memory;
    use crate::model::image::ImageSource;
    use crate::model::note::Note;
    use crate::model::project::{Project, ProjectType};

    #[test]
    fn storing_same_bytes_twice_keeps_one_row() {
        let conn = open_db_in_memory().unwrap();
        let first = store_asset(&conn, "image/png", b"same").unwrap();
        let second = store_asset(&conn, "image/png", b"same").unwrap();
        assert_eq!(first, second);
        assert_eq!(count_assets(&conn).unwrap(), 1);
    }

    #[test]
    fn externalize_then_hydrate_restores_data_urls() {
        let conn = open_db_in_memory().unwrap();
        let url = encode_data_url("image/jpeg", b"jpeg bytes");
        let mut project = Project::new("p", ProjectType::Map);
        let mut note = Note::map("n", 1.0, 2.0);
        note.images = vec![ImageSource::Inline(url.clone())];
        note.sketch = Some(ImageSource::Inline(url.clone()));
        project.notes.push(note);

        assert_eq!(externalize_images(&conn, &mut project).unwrap(), 2);
        assert!(project.notes[0].images[0].asset_id().is_some());
        assert_eq!(count_assets(&conn).unwrap(), 1);

        assert_eq!(hydrate_images(&conn, &mut project).unwrap(), 0);
        assert_eq!(project.notes[0].images[0], ImageSource::Inline(url));
    }
}
