//! Project editing use-cases.
//!
//! # Responsibility
//! - Apply single edits (projects, notes, frames, connections) to a loaded
//!   project and persist the result with one save.
//!
//! # Invariants
//! - Edits never change a project's type.
//! - Note placement always matches the project type.
//! - Removing a note removes its connections; removing a frame clears the
//!   `group_id` of its members.

use crate::model::connection::{Connection, ConnectionId};
use crate::model::frame::{Frame, FrameId};
use crate::model::image::ImageSource;
use crate::model::note::{Note, NoteId};
use crate::model::project::{Project, ProjectId, ProjectType};
use crate::repo::{ProjectListItem, ProjectStore, RepoError};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for project editing use-cases.
#[derive(Debug)]
pub enum ProjectServiceError {
    ProjectNotFound(ProjectId),
    NoteNotFound(NoteId),
    FrameNotFound(FrameId),
    ConnectionNotFound(ConnectionId),
    /// Caller input failed validation.
    InvalidInput(&'static str),
    /// Note placement does not match the project type.
    PlacementMismatch { expected: ProjectType },
    /// Frames and connections exist only on board projects.
    NotBoardProject(ProjectId),
    DuplicateNoteId(NoteId),
    SelfConnection(NoteId),
    DuplicateConnection { from: NoteId, to: NoteId },
    Repo(RepoError),
}

impl Display for ProjectServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::FrameNotFound(id) => write!(f, "frame not found: {id}"),
            Self::ConnectionNotFound(id) => write!(f, "connection not found: {id}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::PlacementMismatch { expected } => {
                write!(f, "note placement must match a {} project", expected.as_str())
            }
            Self::NotBoardProject(id) => write!(f, "project {id} is not a board project"),
            Self::DuplicateNoteId(id) => write!(f, "note id already exists: {id}"),
            Self::SelfConnection(id) => write!(f, "note {id} cannot be connected to itself"),
            Self::DuplicateConnection { from, to } => {
                write!(f, "notes {from} and {to} are already connected")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ProjectServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ProjectServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(project_id) => Self::ProjectNotFound(project_id),
            other => Self::Repo(other),
        }
    }
}

pub type ProjectServiceResult<T> = Result<T, ProjectServiceError>;

/// Project editing facade over a store implementation.
pub struct ProjectService<S: ProjectStore> {
    store: S,
}

impl<S: ProjectStore> ProjectService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Creates and saves an empty project.
    pub fn create_project(
        &mut self,
        name: &str,
        kind: ProjectType,
        background_image: Option<ImageSource>,
    ) -> ProjectServiceResult<Project> {
        let name = normalize_name(name)?;
        let mut project = Project::new(name, kind);
        project.background_image = background_image;
        self.store.save_project(&project)?;
        info!(
            "event=project_create module=service status=ok project_id={} type={}",
            project.id,
            kind.as_str()
        );
        Ok(project)
    }

    pub fn rename_project(
        &mut self,
        project_id: &str,
        name: &str,
    ) -> ProjectServiceResult<Project> {
        let name = normalize_name(name)?;
        self.edit(project_id, |project| {
            project.name = name;
            Ok(())
        })
    }

    pub fn delete_project(&mut self, project_id: &str) -> ProjectServiceResult<()> {
        self.store.delete_project(project_id)?;
        Ok(())
    }

    pub fn list_projects(&self) -> ProjectServiceResult<Vec<ProjectListItem>> {
        Ok(self.store.list_projects()?)
    }

    pub fn get_project(&self, project_id: &str, hydrate: bool) -> ProjectServiceResult<Project> {
        self.store
            .load_project(project_id, hydrate)?
            .ok_or_else(|| ProjectServiceError::ProjectNotFound(project_id.to_string()))
    }

    pub fn add_note(&mut self, project_id: &str, note: Note) -> ProjectServiceResult<Project> {
        self.edit(project_id, |project| {
            ensure_placement(project, &note)?;
            if project.note(&note.id).is_some() {
                return Err(ProjectServiceError::DuplicateNoteId(note.id.clone()));
            }
            project.notes.push(note);
            Ok(())
        })
    }

    /// Replaces the note with the same id.
    pub fn update_note(&mut self, project_id: &str, note: Note) -> ProjectServiceResult<Project> {
        self.edit(project_id, |project| {
            ensure_placement(project, &note)?;
            let slot = project
                .note_mut(&note.id)
                .ok_or_else(|| ProjectServiceError::NoteNotFound(note.id.clone()))?;
            *slot = note;
            Ok(())
        })
    }

    pub fn remove_note(
        &mut self,
        project_id: &str,
        note_id: &str,
    ) -> ProjectServiceResult<Project> {
        self.edit(project_id, |project| {
            let before = project.notes.len();
            project.notes.retain(|note| note.id != note_id);
            if project.notes.len() == before {
                return Err(ProjectServiceError::NoteNotFound(note_id.to_string()));
            }
            project.connections.retain(|connection| {
                connection.from_note_id != note_id && connection.to_note_id != note_id
            });
            Ok(())
        })
    }

    pub fn add_frame(&mut self, project_id: &str, frame: Frame) -> ProjectServiceResult<Project> {
        self.edit(project_id, |project| {
            ensure_board(project)?;
            if project.frame(&frame.id).is_some() {
                return Err(ProjectServiceError::InvalidInput("frame id already exists"));
            }
            project.frames.push(frame);
            Ok(())
        })
    }

    pub fn remove_frame(
        &mut self,
        project_id: &str,
        frame_id: &str,
    ) -> ProjectServiceResult<Project> {
        self.edit(project_id, |project| {
            let before = project.frames.len();
            project.frames.retain(|frame| frame.id != frame_id);
            if project.frames.len() == before {
                return Err(ProjectServiceError::FrameNotFound(frame_id.to_string()));
            }
            for note in &mut project.notes {
                if note.group_id.as_deref() == Some(frame_id) {
                    note.group_id = None;
                }
            }
            Ok(())
        })
    }

    /// Moves a note into a frame, or out of any frame with `None`.
    ///
    /// The frame title is cached first in the note's group names.
    pub fn assign_note_to_frame(
        &mut self,
        project_id: &str,
        note_id: &str,
        frame_id: Option<&str>,
    ) -> ProjectServiceResult<Project> {
        self.edit(project_id, |project| {
            let title = match frame_id {
                Some(frame_id) => Some(
                    project
                        .frame(frame_id)
                        .map(|frame| frame.title.trim().to_string())
                        .ok_or_else(|| ProjectServiceError::FrameNotFound(frame_id.to_string()))?,
                ),
                None => None,
            };
            let note = project
                .note_mut(note_id)
                .ok_or_else(|| ProjectServiceError::NoteNotFound(note_id.to_string()))?;
            note.group_id = frame_id.map(str::to_string);
            if let Some(title) = title.filter(|title| !title.is_empty()) {
                note.group_names.retain(|name| name != &title);
                note.group_names.insert(0, title);
            }
            Ok(())
        })
    }

    pub fn connect_notes(
        &mut self,
        project_id: &str,
        from_note_id: &str,
        to_note_id: &str,
    ) -> ProjectServiceResult<Project> {
        self.edit(project_id, |project| {
            ensure_board(project)?;
            if from_note_id == to_note_id {
                return Err(ProjectServiceError::SelfConnection(from_note_id.to_string()));
            }
            for note_id in [from_note_id, to_note_id] {
                if project.note(note_id).is_none() {
                    return Err(ProjectServiceError::NoteNotFound(note_id.to_string()));
                }
            }
            let exists = project.connections.iter().any(|connection| {
                connection.from_note_id == from_note_id && connection.to_note_id == to_note_id
            });
            if exists {
                return Err(ProjectServiceError::DuplicateConnection {
                    from: from_note_id.to_string(),
                    to: to_note_id.to_string(),
                });
            }
            project
                .connections
                .push(Connection::new(from_note_id, to_note_id));
            Ok(())
        })
    }

    pub fn remove_connection(
        &mut self,
        project_id: &str,
        connection_id: &str,
    ) -> ProjectServiceResult<Project> {
        self.edit(project_id, |project| {
            let before = project.connections.len();
            project
                .connections
                .retain(|connection| connection.id != connection_id);
            if project.connections.len() == before {
                return Err(ProjectServiceError::ConnectionNotFound(
                    connection_id.to_string(),
                ));
            }
            Ok(())
        })
    }

    /// Loads, applies `change` to a copy, saves, and returns the saved copy.
    fn edit(
        &mut self,
        project_id: &str,
        change: impl FnOnce(&mut Project) -> ProjectServiceResult<()>,
    ) -> ProjectServiceResult<Project> {
        let mut project = self
            .store
            .load_project(project_id, false)?
            .ok_or_else(|| ProjectServiceError::ProjectNotFound(project_id.to_string()))?;
        change(&mut project)?;
        self.store.save_project(&project)?;
        Ok(project)
    }
}

fn normalize_name(name: &str) -> ProjectServiceResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ProjectServiceError::InvalidInput("project name cannot be empty"));
    }
    Ok(trimmed.to_string())
}

fn ensure_placement(project: &Project, note: &Note) -> ProjectServiceResult<()> {
    if note.placement.project_type() != project.kind {
        return Err(ProjectServiceError::PlacementMismatch {
            expected: project.kind,
        });
    }
    Ok(())
}

fn ensure_board(project: &Project) -> ProjectServiceResult<()> {
    if project.kind.is_board() {
        Ok(())
    } else {
        Err(ProjectServiceError::NotBoardProject(project.id.clone()))
    }
}
