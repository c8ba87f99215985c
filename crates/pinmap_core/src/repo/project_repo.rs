//! Project storage synchronization layer.
//!
//! # Responsibility
//! - Persist a whole project (notes, frames, connections) as one unit.
//! - Load projects back with image references optionally hydrated.
//!
//! # Invariants
//! - One `save_project` call is one IMMEDIATE transaction; a failure leaves
//!   the previously stored project untouched.
//! - Saved projects pass `Project::integrity_violations()` after pruning.
//! - A stored project's type never changes.
//! - Child rows keep the in-memory order through `sort_order`.

use crate::model::connection::Connection as NoteConnection;
use crate::model::frame::Frame;
use crate::model::image::ImageSource;
use crate::model::note::{Note, NoteTag, NoteVariant, Placement};
use crate::model::now_epoch_ms;
use crate::model::project::{Project, ProjectId, ProjectType};
use crate::repo::asset_repo::{ensure_asset_table, externalize_images, hydrate_images};
use crate::repo::{ensure_table, RepoError, RepoResult};
use log::{debug, error, info};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::Serialize;
use std::time::Instant;

/// Lightweight listing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectListItem {
    pub id: ProjectId,
    pub name: String,
    pub kind: ProjectType,
    pub created_at: i64,
    pub note_count: usize,
}

/// Storage contract used by services and the import driver.
pub trait ProjectStore {
    /// Saves the whole project, replacing any previous version.
    fn save_project(&mut self, project: &Project) -> RepoResult<()>;
    /// Loads one project; `hydrate` turns stored image references into data URLs.
    fn load_project(&self, project_id: &str, hydrate: bool) -> RepoResult<Option<Project>>;
    /// Loads every project ordered by creation time.
    fn load_all_projects(&self, hydrate: bool) -> RepoResult<Vec<Project>>;
    fn list_projects(&self) -> RepoResult<Vec<ProjectListItem>>;
    /// Deletes a project and, through cascades, all of its children.
    fn delete_project(&mut self, project_id: &str) -> RepoResult<()>;
}

/// SQLite-backed project store.
pub struct SqliteProjectStore<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteProjectStore<'conn> {
    /// Constructs a store from a migrated connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_table(conn, "projects", &["id", "name", "type", "background_image"])?;
        ensure_table(conn, "notes", &["project_id", "id", "images_json", "sort_order"])?;
        ensure_table(conn, "frames", &["project_id", "id", "sort_order"])?;
        ensure_table(conn, "connections", &["project_id", "from_note_id", "to_note_id"])?;
        ensure_asset_table(conn)?;
        Ok(Self { conn })
    }

    /// Underlying connection, for read-only helpers.
    pub fn connection(&self) -> &Connection {
        self.conn
    }
}

impl ProjectStore for SqliteProjectStore<'_> {
    fn save_project(&mut self, project: &Project) -> RepoResult<()> {
        let started_at = Instant::now();
        let result = save_in_transaction(self.conn, project);
        match &result {
            Ok(()) => info!(
                "event=project_save module=repo status=ok project_id={} notes={} frames={} connections={} duration_ms={}",
                project.id,
                project.notes.len(),
                project.frames.len(),
                project.connections.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=project_save module=repo status=error project_id={} duration_ms={} error={}",
                project.id,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn load_project(&self, project_id: &str, hydrate: bool) -> RepoResult<Option<Project>> {
        let Some(mut project) = load_project_row(self.conn, project_id)? else {
            return Ok(None);
        };
        project.frames = load_frames(self.conn, project_id)?;
        project.notes = load_notes(self.conn, project_id)?;
        project.connections = load_connections(self.conn, project_id)?;
        if hydrate {
            hydrate_images(self.conn, &mut project)?;
        }
        debug!(
            "event=project_load module=repo status=ok project_id={} hydrate={}",
            project_id, hydrate
        );
        Ok(Some(project))
    }

    fn load_all_projects(&self, hydrate: bool) -> RepoResult<Vec<Project>> {
        let ids = project_ids(self.conn)?;
        let mut projects = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(project) = self.load_project(&id, hydrate)? {
                projects.push(project);
            }
        }
        Ok(projects)
    }

    fn list_projects(&self) -> RepoResult<Vec<ProjectListItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.name, p.type, p.created_at,
                    (SELECT COUNT(*) FROM notes n WHERE n.project_id = p.id)
             FROM projects p
             ORDER BY p.created_at ASC, p.id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let kind: String = row.get(2)?;
            let note_count: i64 = row.get(4)?;
            items.push(ProjectListItem {
                id: row.get(0)?,
                name: row.get(1)?,
                kind: parse_project_type(&kind)?,
                created_at: row.get(3)?,
                note_count: note_count as usize,
            });
        }
        Ok(items)
    }

    fn delete_project(&mut self, project_id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1;", [project_id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(project_id.to_string()));
        }
        info!("event=project_delete module=repo status=ok project_id={project_id}");
        Ok(())
    }
}

fn save_in_transaction(conn: &mut Connection, project: &Project) -> RepoResult<()> {
    let mut project = project.clone();
    let pruned = project.prune_dangling_references();
    if !pruned.is_empty() {
        debug!(
            "event=project_prune module=repo status=ok project_id={} cleared_groups={} dropped_connections={}",
            project.id, pruned.cleared_group_ids, pruned.dropped_connections
        );
    }
    if let Some(violation) = project.integrity_violations().into_iter().next() {
        return Err(violation.into());
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    externalize_images(&tx, &mut project)?;
    upsert_project_row(&tx, &project)?;

    for table in ["connections", "notes", "frames"] {
        tx.execute(
            &format!("DELETE FROM {table} WHERE project_id = ?1;"),
            [&project.id],
        )?;
    }
    insert_frames(&tx, &project)?;
    insert_notes(&tx, &project)?;
    insert_connections(&tx, &project)?;
    tx.commit()?;
    Ok(())
}

fn upsert_project_row(tx: &Transaction<'_>, project: &Project) -> RepoResult<()> {
    let stored: Option<String> = tx
        .query_row(
            "SELECT type FROM projects WHERE id = ?1;",
            [&project.id],
            |row| row.get(0),
        )
        .optional()?;
    let background = project.background_image.as_ref().map(ImageSource::to_wire);

    match stored {
        Some(stored) => {
            let stored = parse_project_type(&stored)?;
            if stored != project.kind {
                return Err(RepoError::ImmutableProjectType {
                    project_id: project.id.clone(),
                    stored,
                    requested: project.kind,
                });
            }
            tx.execute(
                "UPDATE projects
                 SET name = ?2, background_image = ?3, updated_at = ?4
                 WHERE id = ?1;",
                params![project.id, project.name, background, now_epoch_ms()],
            )?;
        }
        None => {
            tx.execute(
                "INSERT INTO projects (id, name, type, background_image, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    project.id,
                    project.name,
                    project.kind.as_str(),
                    background,
                    project.created_at,
                    now_epoch_ms()
                ],
            )?;
        }
    }
    Ok(())
}

fn insert_frames(tx: &Transaction<'_>, project: &Project) -> RepoResult<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO frames (project_id, id, title, x, y, width, height, sort_order)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
    )?;
    for (index, frame) in project.frames.iter().enumerate() {
        stmt.execute(params![
            project.id,
            frame.id,
            frame.title,
            frame.x,
            frame.y,
            frame.width,
            frame.height,
            index as i64
        ])?;
    }
    Ok(())
}

fn insert_notes(tx: &Transaction<'_>, project: &Project) -> RepoResult<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO notes (
            project_id, id, text, variant, tags_json, group_id, group_names_json,
            created_at, lat, lng, board_x, board_y, images_json, sketch, sort_order
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15);",
    )?;
    for (index, note) in project.notes.iter().enumerate() {
        let (lat, lng, board_x, board_y) = match note.placement {
            Placement::Map { lat, lng } => (Some(lat), Some(lng), None, None),
            Placement::Board { x, y } => (None, None, Some(x), Some(y)),
        };
        stmt.execute(params![
            project.id,
            note.id,
            note.text,
            note.variant.as_str(),
            to_json(&note.tags)?,
            note.group_id,
            to_json(&note.group_names)?,
            note.created_at,
            lat,
            lng,
            board_x,
            board_y,
            to_json(&note.images)?,
            note.sketch.as_ref().map(ImageSource::to_wire),
            index as i64
        ])?;
    }
    Ok(())
}

fn insert_connections(tx: &Transaction<'_>, project: &Project) -> RepoResult<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO connections (project_id, id, from_note_id, to_note_id, sort_order)
         VALUES (?1, ?2, ?3, ?4, ?5);",
    )?;
    for (index, connection) in project.connections.iter().enumerate() {
        stmt.execute(params![
            project.id,
            connection.id,
            connection.from_note_id,
            connection.to_note_id,
            index as i64
        ])?;
    }
    Ok(())
}

fn project_ids(conn: &Connection) -> RepoResult<Vec<ProjectId>> {
    let mut stmt = conn.prepare("SELECT id FROM projects ORDER BY created_at ASC, id ASC;")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn load_project_row(conn: &Connection, project_id: &str) -> RepoResult<Option<Project>> {
    let row = conn
        .query_row(
            "SELECT id, name, type, background_image, created_at
             FROM projects
             WHERE id = ?1;",
            [project_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            },
        )
        .optional()?;

    let Some((id, name, kind, background, created_at)) = row else {
        return Ok(None);
    };
    let mut project = Project::with_id(id, name, parse_project_type(&kind)?);
    project.background_image = background.map(ImageSource::from);
    project.created_at = created_at;
    Ok(Some(project))
}

fn load_frames(conn: &Connection, project_id: &str) -> RepoResult<Vec<Frame>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, x, y, width, height
         FROM frames
         WHERE project_id = ?1
         ORDER BY sort_order ASC;",
    )?;
    let frames = stmt
        .query_map([project_id], |row| {
            Ok(Frame {
                id: row.get(0)?,
                title: row.get(1)?,
                x: row.get(2)?,
                y: row.get(3)?,
                width: row.get(4)?,
                height: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(frames)
}

fn load_notes(conn: &Connection, project_id: &str) -> RepoResult<Vec<Note>> {
    let mut stmt = conn.prepare(
        "SELECT id, text, variant, tags_json, group_id, group_names_json, created_at,
                lat, lng, board_x, board_y, images_json, sketch
         FROM notes
         WHERE project_id = ?1
         ORDER BY sort_order ASC;",
    )?;
    let mut rows = stmt.query([project_id])?;
    let mut notes = Vec::new();
    while let Some(row) = rows.next()? {
        notes.push(parse_note_row(row)?);
    }
    Ok(notes)
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let id: String = row.get(0)?;
    let variant: String = row.get(2)?;
    let placement = match (
        row.get::<_, Option<f64>>(7)?,
        row.get::<_, Option<f64>>(8)?,
        row.get::<_, Option<f64>>(9)?,
        row.get::<_, Option<f64>>(10)?,
    ) {
        (Some(lat), Some(lng), None, None) => Placement::Map { lat, lng },
        (None, None, Some(x), Some(y)) => Placement::Board { x, y },
        _ => {
            return Err(RepoError::InvalidData(format!(
                "note {id} has no single placement"
            )))
        }
    };
    let tags: Vec<NoteTag> = from_json(&row.get::<_, String>(3)?, "notes.tags_json")?;
    let group_names: Vec<String> =
        from_json(&row.get::<_, String>(5)?, "notes.group_names_json")?;
    let images: Vec<ImageSource> = from_json(&row.get::<_, String>(11)?, "notes.images_json")?;

    Ok(Note {
        variant: NoteVariant::parse(&variant).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid variant `{variant}` in notes.variant"))
        })?,
        text: row.get(1)?,
        tags,
        group_id: row.get(4)?,
        group_names,
        created_at: row.get(6)?,
        placement,
        images,
        sketch: row.get::<_, Option<String>>(12)?.map(ImageSource::from),
        id,
    })
}

fn load_connections(conn: &Connection, project_id: &str) -> RepoResult<Vec<NoteConnection>> {
    let mut stmt = conn.prepare(
        "SELECT id, from_note_id, to_note_id
         FROM connections
         WHERE project_id = ?1
         ORDER BY sort_order ASC;",
    )?;
    let connections = stmt
        .query_map([project_id], |row| {
            Ok(NoteConnection {
                id: row.get(0)?,
                from_note_id: row.get(1)?,
                to_note_id: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(connections)
}

fn parse_project_type(value: &str) -> RepoResult<ProjectType> {
    ProjectType::parse(value)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid type `{value}` in projects.type")))
}

fn to_json<T: Serialize>(value: &T) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode note field: {err}")))
}

fn from_json<T: serde::de::DeserializeOwned>(value: &str, column: &str) -> RepoResult<T> {
    serde_json::from_str(value)
        .map_err(|err| RepoError::InvalidData(format!("invalid JSON in {column}: {err}")))
}
