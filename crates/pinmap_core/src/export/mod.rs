//! Project exporters: full JSON bundle and CSV note listing.

pub mod csv;
pub mod json;

use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use self::csv::{export_csv, render_csv};
pub use self::json::{export_json, render_json};

#[derive(Debug)]
pub enum ExportError {
    ProjectNotFound(String),
    Repo(RepoError),
    Json(serde_json::Error),
    Csv(::csv::Error),
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "cannot render JSON export: {err}"),
            Self::Csv(err) => write!(f, "cannot render CSV export: {err}"),
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ProjectNotFound(_) => None,
            Self::Repo(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Csv(err) => Some(err),
        }
    }
}

impl From<RepoError> for ExportError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::ProjectNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<::csv::Error> for ExportError {
    fn from(value: ::csv::Error) -> Self {
        Self::Csv(value)
    }
}
