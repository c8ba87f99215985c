//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into use-case level APIs.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod import_service;
pub mod project_service;

pub use import_service::{ImportLockGuard, ImportLocks, ImportOutcome, ImportPreview, ImportService};
pub use project_service::{ProjectService, ProjectServiceError, ProjectServiceResult};
