//! Import driver: executes the effects requested by `ImportSession`.
//!
//! # Responsibility
//! - Hold the per-project import lock for the whole operation.
//! - Run compression, save and reload against a `ProjectStore`.
//!
//! # Invariants
//! - At most one import runs per target project at a time.
//! - A failed save leaves the stored project exactly as before.
//! - Reload always produces a project: by id, then by scanning all projects,
//!   then the locally merged value with a consistency warning.

use crate::assets::{compress_note_images, CompressionOptions};
use crate::merge::orchestrator::{
    DuplicateCandidate, ImportEffect, ImportError, ImportMode, ImportSession, ImportStage,
    ImportSummary, ReloadStrategy, ResolutionPolicy,
};
use crate::model::project::{Project, ProjectId, ProjectType};
use crate::repo::{ProjectStore, RepoError};
use log::{info, warn};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

static GLOBAL_IMPORT_LOCKS: Lazy<Arc<ImportLocks>> = Lazy::new(|| Arc::new(ImportLocks::new()));

/// Set of project ids with an import in flight.
#[derive(Debug, Default)]
pub struct ImportLocks {
    active: Mutex<HashSet<ProjectId>>,
}

impl ImportLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide lock set shared by every service instance.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL_IMPORT_LOCKS)
    }

    /// Claims `project_id`; fails with `ImportInProgress` when already held.
    pub fn try_acquire(self: &Arc<Self>, project_id: &str) -> Result<ImportLockGuard, ImportError> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(project_id.to_string()) {
            return Err(ImportError::ImportInProgress(project_id.to_string()));
        }
        Ok(ImportLockGuard {
            locks: Arc::clone(self),
            project_id: project_id.to_string(),
        })
    }

    pub fn is_locked(&self, project_id: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(project_id)
    }
}

/// Releases the project lock on drop.
#[derive(Debug)]
pub struct ImportLockGuard {
    locks: Arc<ImportLocks>,
    project_id: ProjectId,
}

impl ImportLockGuard {
    pub fn project_id(&self) -> &str {
        &self.project_id
    }
}

impl Drop for ImportLockGuard {
    fn drop(&mut self) {
        self.locks
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.project_id);
    }
}

/// Result of a completed import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    /// Canonical post-import project as stored, images as references.
    pub project: Project,
    pub summary: ImportSummary,
    pub reload_strategy: ReloadStrategy,
    /// User-facing summary sentence.
    pub message: String,
}

/// Dry-run result used to ask the user about duplicates.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportPreview {
    pub bundle_type: ProjectType,
    pub candidates: Vec<DuplicateCandidate>,
    pub invalid_entries: usize,
}

/// Import use-case service over a project store.
pub struct ImportService<S: ProjectStore> {
    store: S,
    locks: Arc<ImportLocks>,
    compression: Option<CompressionOptions>,
}

impl<S: ProjectStore> ImportService<S> {
    /// Creates a service using the process-wide lock set and default compression.
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: ImportLocks::global(),
            compression: Some(CompressionOptions::default()),
        }
    }

    pub fn with_locks(mut self, locks: Arc<ImportLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// `None` disables import-time compression.
    pub fn with_compression(mut self, compression: Option<CompressionOptions>) -> Self {
        self.compression = compression;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Parses and detects without touching storage.
    pub fn preview(
        &self,
        bytes: &[u8],
        mode: ImportMode,
        target_project_id: Option<&str>,
    ) -> Result<ImportPreview, ImportError> {
        let mut session = ImportSession::new(mode);
        session.parse(bytes)?;
        let bundle_type = session.bundle_type().unwrap_or_default();
        let active = self.load_target(mode, target_project_id)?;
        session.detect(active.as_ref(), ResolutionPolicy::Interactive)?;
        Ok(ImportPreview {
            bundle_type,
            candidates: session.candidates().to_vec(),
            invalid_entries: session.summary().invalid_entries,
        })
    }

    /// Runs one import end to end.
    ///
    /// # Errors
    /// - `ResolutionRequired` when `policy` is interactive and duplicates exist;
    ///   call `preview` first and pass an explicit policy instead.
    /// - `ImportInProgress` when another import holds the target project.
    /// - `PersistenceFailure` when storage rejects the save.
    pub fn import(
        &mut self,
        bytes: &[u8],
        mode: ImportMode,
        target_project_id: Option<&str>,
        policy: ResolutionPolicy,
    ) -> Result<ImportOutcome, ImportError> {
        let started_at = Instant::now();
        info!(
            "event=import_start module=service status=start mode={:?} bytes={}",
            mode,
            bytes.len()
        );
        let result = self.run_import(bytes, mode, target_project_id, policy);
        match &result {
            Ok(outcome) => info!(
                "event=import_finish module=service status=ok project_id={} reload={:?} duration_ms={}",
                outcome.project.id,
                outcome.reload_strategy,
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=import_finish module=service status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn run_import(
        &mut self,
        bytes: &[u8],
        mode: ImportMode,
        target_project_id: Option<&str>,
        policy: ResolutionPolicy,
    ) -> Result<ImportOutcome, ImportError> {
        let mut session = ImportSession::new(mode);
        session.parse(bytes)?;

        let mut guard = match (mode, target_project_id) {
            (ImportMode::MergeIntoCurrent, Some(project_id)) => {
                Some(self.locks.try_acquire(project_id)?)
            }
            _ => None,
        };
        let active = match self.load_target(mode, target_project_id) {
            Ok(active) => active,
            Err(err) => {
                let _ = session.cancel();
                return Err(err);
            }
        };

        if session.detect(active.as_ref(), policy)? == ImportStage::AwaitingResolution {
            let candidates = session.candidates().len();
            let _ = session.cancel();
            return Err(ImportError::ResolutionRequired { candidates });
        }
        drop(active);

        let effects = session.merge()?;
        if guard.is_none() {
            if let Some(project) = session.merged() {
                guard = Some(self.locks.try_acquire(&project.id)?);
            }
        }

        let mut message = String::new();
        for effect in effects {
            match effect {
                ImportEffect::CompressAssets { note_ids } => self.compress(&mut session, &note_ids),
                ImportEffect::SaveProject { .. } => {
                    let saved = {
                        let project = session.begin_persist()?;
                        self.store.save_project(project)
                    };
                    match saved {
                        Ok(()) => session.persisted()?,
                        Err(err) => return Err(session.persist_failed(err)),
                    }
                }
                ImportEffect::ReloadProject { project_id } => {
                    let merged = session.merged().cloned();
                    let (canonical, strategy) = self.reload(&project_id, merged)?;
                    for follow_up in session.finish(canonical, strategy)? {
                        if let ImportEffect::Notify { message: text } = follow_up {
                            message = text;
                        }
                    }
                }
                ImportEffect::Notify { message: text } => message = text,
            }
        }
        drop(guard);

        let strategy = session
            .reload_strategy()
            .unwrap_or(ReloadStrategy::LocalMerged);
        let stage = session.stage();
        let (project, summary) = session.into_outcome().ok_or(ImportError::InvalidTransition {
            stage,
            action: "collect outcome",
        })?;
        Ok(ImportOutcome {
            project,
            summary,
            reload_strategy: strategy,
            message,
        })
    }

    fn load_target(
        &self,
        mode: ImportMode,
        target_project_id: Option<&str>,
    ) -> Result<Option<Project>, ImportError> {
        match (mode, target_project_id) {
            (ImportMode::MergeIntoCurrent, Some(project_id)) => self
                .store
                .load_project(project_id, false)
                .map_err(ImportError::PersistenceFailure)?
                .map(Some)
                .ok_or(ImportError::NoActiveProject),
            _ => Ok(None),
        }
    }

    fn compress(&self, session: &mut ImportSession, note_ids: &[String]) {
        let Some(options) = self.compression else {
            return;
        };
        if let Some(project) = session.merged_mut() {
            let report = compress_note_images(project, note_ids, options);
            session.record_asset_compression(report.compressed, report.failed);
        }
    }

    fn reload(
        &self,
        project_id: &str,
        merged: Option<Project>,
    ) -> Result<(Project, ReloadStrategy), ImportError> {
        match self.store.load_project(project_id, false) {
            Ok(Some(project)) => return Ok((project, ReloadStrategy::ReloadById)),
            Ok(None) => warn!(
                "event=import_reload module=service status=warn strategy=reload_by_id project_id={project_id} reason=not_found"
            ),
            Err(err) => warn!(
                "event=import_reload module=service status=warn strategy=reload_by_id project_id={project_id} error={err}"
            ),
        }

        match self.store.load_all_projects(false) {
            Ok(projects) => {
                if let Some(project) = projects.into_iter().find(|project| project.id == project_id)
                {
                    return Ok((project, ReloadStrategy::ScanAllProjects));
                }
                warn!(
                    "event=import_reload module=service status=warn strategy=scan_all project_id={project_id} reason=not_found"
                );
            }
            Err(err) => warn!(
                "event=import_reload module=service status=warn strategy=scan_all project_id={project_id} error={err}"
            ),
        }

        warn!(
            "event=import_reload module=service status=warn strategy=local_merged project_id={project_id} consistency=unverified"
        );
        merged
            .map(|project| (project, ReloadStrategy::LocalMerged))
            .ok_or_else(|| {
                ImportError::PersistenceFailure(RepoError::NotFound(project_id.to_string()))
            })
    }
}
