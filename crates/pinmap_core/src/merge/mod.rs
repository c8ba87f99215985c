//! Import/merge engine.
//!
//! # Responsibility
//! - Detect duplicates, remap identities and reposition imported content.
//! - Drive one import operation through an explicit stage machine.
//!
//! # Invariants
//! - Everything here is pure with respect to storage; persistence is
//!   requested through `ImportEffect` values.
//!
//! # See also
//! - service::import_service

pub mod duplicate;
pub mod orchestrator;
pub mod remap;
pub mod spatial;

pub use duplicate::{find_duplicate, find_duplicate_frame, is_duplicate, PayloadClass};
pub use orchestrator::{
    DuplicateCandidate, ImportEffect, ImportError, ImportMode, ImportSession, ImportStage,
    ImportSummary, ReloadStrategy, Resolution, ResolutionAction, ResolutionPolicy,
};
pub use remap::{remap, RemappedEntities};
pub use spatial::{apply_offset, apply_offset_to_frames, compute_offset, Offset};
