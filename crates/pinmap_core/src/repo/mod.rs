//! Persistence contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define the storage synchronization contract used by services.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `Integrity`) in
//!   addition to DB transport errors.
//! - Persisted rows that cannot be turned back into model values are
//!   reported as `InvalidData`, never masked.

pub mod asset_repo;
pub mod project_repo;

use crate::assets::AssetError;
use crate::db::DbError;
use crate::model::project::{IntegrityViolation, ProjectId, ProjectType};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use project_repo::{ProjectListItem, ProjectStore, SqliteProjectStore};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for project persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(ProjectId),
    InvalidData(String),
    Integrity(IntegrityViolation),
    Asset(AssetError),
    ImmutableProjectType {
        project_id: ProjectId,
        stored: ProjectType,
        requested: ProjectType,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "project not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted project data: {message}"),
            Self::Integrity(violation) => write!(f, "project integrity violation: {violation}"),
            Self::Asset(err) => write!(f, "image asset error: {err}"),
            Self::ImmutableProjectType {
                project_id,
                stored,
                requested,
            } => write!(
                f,
                "project {project_id} is a {} project and cannot become {}",
                stored.as_str(),
                requested.as_str()
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table missing: {table}"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column missing: {table}.{column}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Integrity(violation) => Some(violation),
            Self::Asset(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<IntegrityViolation> for RepoError {
    fn from(value: IntegrityViolation) -> Self {
        Self::Integrity(value)
    }
}

impl From<AssetError> for RepoError {
    fn from(value: AssetError) -> Self {
        Self::Asset(value)
    }
}

/// Checks that `table` exists and carries every column in `columns`.
pub(crate) fn ensure_table(
    conn: &Connection,
    table: &'static str,
    columns: &[&'static str],
) -> RepoResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    if exists != 1 {
        return Err(RepoError::MissingRequiredTable(table));
    }

    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let present = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    for &column in columns {
        if !present.iter().any(|name| name == column) {
            return Err(RepoError::MissingRequiredColumn { table, column });
        }
    }
    Ok(())
}
