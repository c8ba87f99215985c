//! Core domain logic for pinned-note projects.
//!
//! Owns the entity model, the import/merge engine, SQLite storage and the
//! exporters. Outer surfaces (FFI, CLI) only translate inputs and errors.

pub mod assets;
pub mod bundle;
pub mod config;
pub mod db;
pub mod export;
pub mod logging;
pub mod merge;
pub mod model;
pub mod repo;
pub mod service;

pub use bundle::{parse_bundle, BundleError, ExportBundle, ImportBundle, BUNDLE_VERSION};
pub use config::{ConfigError, CoreConfig};
pub use export::{export_csv, export_json, render_csv, render_json, ExportError};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use merge::{
    DuplicateCandidate, ImportError, ImportMode, ImportSession, ImportStage, ImportSummary,
    ReloadStrategy, Resolution, ResolutionAction, ResolutionPolicy,
};
pub use model::connection::Connection;
pub use model::frame::Frame;
pub use model::image::ImageSource;
pub use model::note::{Note, NoteTag, NoteVariant, Placement};
pub use model::project::{Project, ProjectType};
pub use repo::{ProjectListItem, ProjectStore, RepoError, RepoResult, SqliteProjectStore};
pub use service::{
    ImportLocks, ImportOutcome, ImportPreview, ImportService, ProjectService, ProjectServiceError,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
