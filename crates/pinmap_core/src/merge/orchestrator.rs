//! Import/merge state machine.
//!
//! # Responsibility
//! - Sequence parsing, detection, resolution, remapping, repositioning and
//!   merging for one import operation.
//! - Describe persistence work as `ImportEffect` values instead of doing it.
//!
//! # Invariants
//! - Stages only move forward: `Idle -> Parsing -> Detecting ->
//!   (AwaitingResolution) -> Merging -> Persisting -> Reloading -> Done`;
//!   `Failed` is reachable from every non-terminal stage.
//! - The caller's project is never mutated; merging works on an owned copy.
//! - Every failure is returned as an `ImportError`; nothing panics.
//!
//! # See also
//! - service::import_service for the driver that executes effects.

use crate::bundle::{parse_bundle, BundleError, ImportBundle};
use crate::merge::duplicate::{find_duplicate, find_duplicate_frame, PayloadClass};
use crate::merge::remap::{fresh_id, remap, RemappedEntities};
use crate::merge::spatial::{apply_offset, apply_offset_to_frames, compute_offset};
use crate::model::frame::FrameId;
use crate::model::note::NoteId;
use crate::model::now_epoch_ms;
use crate::model::project::{Project, ProjectId, ProjectType};
use crate::repo::RepoError;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Suffix appended to the name of a project created from an import.
pub const IMPORTED_NAME_SUFFIX: &str = " (Imported)";

/// How the bundle is integrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Bundle becomes a brand-new project; no duplicate detection.
    CreateNew,
    /// Bundle is merged into the active project of the same type.
    MergeIntoCurrent,
}

/// Stage of one import operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStage {
    Idle,
    Parsing,
    Detecting,
    AwaitingResolution,
    Merging,
    Persisting,
    Reloading,
    Done,
    Failed,
}

impl ImportStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Parsing => "parsing",
            Self::Detecting => "detecting",
            Self::AwaitingResolution => "awaiting_resolution",
            Self::Merging => "merging",
            Self::Persisting => "persisting",
            Self::Reloading => "reloading",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// What to do with one incoming duplicate note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionAction {
    /// Drop the incoming note.
    Skip,
    /// Overwrite the existing note's payloads named by the candidate class.
    Replace,
    /// Insert the incoming note alongside the existing one.
    KeepBoth,
}

/// Incoming note that duplicates an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCandidate {
    /// Position of the note in the bundle's parsed note list.
    pub import_index: usize,
    pub incoming_note_id: NoteId,
    pub existing_note_id: NoteId,
    pub class: PayloadClass,
}

/// User decision for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub import_index: usize,
    pub action: ResolutionAction,
}

/// Source of duplicate decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResolutionPolicy {
    /// Skip every duplicate.
    #[default]
    Automatic,
    /// Pause in `AwaitingResolution` whenever duplicates exist.
    Interactive,
    /// Decisions supplied up front; unlisted candidates are skipped.
    Explicit(Vec<Resolution>),
}

/// Where the canonical post-import project came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadStrategy {
    ReloadById,
    ScanAllProjects,
    LocalMerged,
}

/// Side effect requested by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportEffect {
    /// Compress inline images of these notes before saving.
    CompressAssets { note_ids: Vec<NoteId> },
    SaveProject { project_id: ProjectId },
    ReloadProject { project_id: ProjectId },
    /// Show this summary to the user.
    Notify { message: String },
}

/// Counts reported to the caller once an import finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub project_name: String,
    pub created_project: bool,
    pub notes_merged: usize,
    pub notes_skipped: usize,
    pub notes_replaced: usize,
    pub frames_merged: usize,
    pub frames_skipped: usize,
    pub connections_merged: usize,
    pub connections_dropped: usize,
    /// Frames in a map bundle, which map projects cannot hold.
    pub frames_unsupported: usize,
    /// Connections in a map bundle.
    pub connections_unsupported: usize,
    pub invalid_entries: usize,
    pub assets_compressed: usize,
    pub assets_uncompressed: usize,
}

impl ImportSummary {
    /// Human-readable summary line.
    pub fn message(&self) -> String {
        let merged = join_list(&[
            count(self.notes_merged, "note", "notes"),
            count(self.frames_merged, "frame", "frames"),
            count(self.connections_merged, "connection", "connections"),
        ]);
        let mut message = if self.created_project {
            format!("Imported \"{}\" with {merged}.", self.project_name)
        } else {
            format!("Merged {merged} into \"{}\".", self.project_name)
        };

        let mut skipped = Vec::new();
        if self.notes_skipped > 0 {
            skipped.push(count(self.notes_skipped, "duplicate note", "duplicate notes"));
        }
        if self.frames_skipped > 0 {
            skipped.push(count(self.frames_skipped, "duplicate frame", "duplicate frames"));
        }
        if !skipped.is_empty() {
            message.push_str(&format!(" Skipped {}.", join_list(&skipped)));
        }
        if self.notes_replaced > 0 {
            message.push_str(&format!(
                " Updated {}.",
                count(self.notes_replaced, "existing note", "existing notes")
            ));
        }
        if self.connections_dropped > 0 {
            message.push_str(&format!(
                " Dropped {} without both endpoints.",
                count(self.connections_dropped, "connection", "connections")
            ));
        }
        let mut unsupported = Vec::new();
        if self.frames_unsupported > 0 {
            unsupported.push(count(self.frames_unsupported, "frame", "frames"));
        }
        if self.connections_unsupported > 0 {
            unsupported.push(count(self.connections_unsupported, "connection", "connections"));
        }
        if !unsupported.is_empty() {
            message.push_str(&format!(
                " Left out {}; map projects have no board layout.",
                join_list(&unsupported)
            ));
        }
        if self.invalid_entries > 0 {
            message.push_str(&format!(
                " Ignored {}.",
                count(self.invalid_entries, "malformed entry", "malformed entries")
            ));
        }
        if self.assets_uncompressed > 0 {
            message.push_str(&format!(
                " {} could not be compressed and kept original size.",
                count(self.assets_uncompressed, "image", "images")
            ));
        }
        message
    }
}

fn count(value: usize, singular: &str, plural: &str) -> String {
    if value == 1 {
        format!("1 {singular}")
    } else {
        format!("{value} {plural}")
    }
}

fn join_list(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [head @ .., last] => format!("{} and {last}", head.join(", ")),
    }
}

/// Tagged failure of an import operation.
#[derive(Debug)]
pub enum ImportError {
    /// File is malformed or structurally incomplete.
    InvalidFormat(BundleError),
    /// Bundle type differs from the active project type.
    IncompatibleProjectType {
        bundle: ProjectType,
        project: ProjectType,
    },
    /// Merge mode requested without an active project.
    NoActiveProject,
    /// Another import is already running against this project.
    ImportInProgress(ProjectId),
    /// Duplicates need decisions before merging can continue.
    ResolutionRequired { candidates: usize },
    /// Storage save or load failed; the pre-merge state stays authoritative.
    PersistenceFailure(RepoError),
    /// Operation called in a stage that does not allow it.
    InvalidTransition {
        stage: ImportStage,
        action: &'static str,
    },
    /// Discarded by the caller before persisting.
    Cancelled,
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFormat(err) => write!(f, "invalid project file: {err}"),
            Self::IncompatibleProjectType { bundle, project } => write!(
                f,
                "cannot merge a project of type `{}` into a project of type `{}`",
                bundle.as_str(),
                project.as_str()
            ),
            Self::NoActiveProject => write!(f, "no project is open to merge into"),
            Self::ImportInProgress(project_id) => {
                write!(f, "another import into project {project_id} is still running")
            }
            Self::ResolutionRequired { candidates } => {
                write!(f, "{candidates} duplicate note(s) need a decision")
            }
            Self::PersistenceFailure(err) => write!(f, "could not save project: {err}"),
            Self::InvalidTransition { stage, action } => {
                write!(f, "cannot {action} while import is {}", stage.as_str())
            }
            Self::Cancelled => write!(f, "import cancelled"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidFormat(err) => Some(err),
            Self::PersistenceFailure(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BundleError> for ImportError {
    fn from(value: BundleError) -> Self {
        Self::InvalidFormat(value)
    }
}

struct PendingMerge {
    target: Project,
    remapped: RemappedEntities,
    candidates: Vec<DuplicateCandidate>,
    /// Incoming frame id -> existing duplicate frame id.
    frame_matches: HashMap<FrameId, FrameId>,
    resolutions: HashMap<usize, ResolutionAction>,
}

/// One import operation from raw bytes to canonical project.
pub struct ImportSession {
    mode: ImportMode,
    stage: ImportStage,
    bundle: Option<ImportBundle>,
    pending: Option<PendingMerge>,
    candidates: Vec<DuplicateCandidate>,
    merged: Option<Project>,
    canonical: Option<Project>,
    reload_strategy: Option<ReloadStrategy>,
    summary: ImportSummary,
    failure: Option<String>,
}

impl ImportSession {
    pub fn new(mode: ImportMode) -> Self {
        Self {
            mode,
            stage: ImportStage::Idle,
            bundle: None,
            pending: None,
            candidates: Vec::new(),
            merged: None,
            canonical: None,
            reload_strategy: None,
            summary: ImportSummary::default(),
            failure: None,
        }
    }

    pub fn mode(&self) -> ImportMode {
        self.mode
    }

    pub fn stage(&self) -> ImportStage {
        self.stage
    }

    pub fn summary(&self) -> &ImportSummary {
        &self.summary
    }

    /// Failure message once the session is `Failed`.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Type declared by the parsed bundle.
    pub fn bundle_type(&self) -> Option<ProjectType> {
        self.bundle.as_ref().map(|bundle| bundle.project.kind)
    }

    /// Duplicates found during detection; kept after merging.
    pub fn candidates(&self) -> &[DuplicateCandidate] {
        &self.candidates
    }

    /// Project produced by `merge`, before persistence.
    pub fn merged(&self) -> Option<&Project> {
        self.merged.as_ref()
    }

    /// Mutable access to the merged project while still `Merging`.
    pub fn merged_mut(&mut self) -> Option<&mut Project> {
        if self.stage == ImportStage::Merging {
            self.merged.as_mut()
        } else {
            None
        }
    }

    pub fn reload_strategy(&self) -> Option<ReloadStrategy> {
        self.reload_strategy
    }

    /// Decodes and parses the import file.
    pub fn parse(&mut self, bytes: &[u8]) -> Result<(), ImportError> {
        self.expect_stage(ImportStage::Idle, "parse")?;
        self.transition(ImportStage::Parsing);
        match parse_bundle(bytes) {
            Ok(bundle) => {
                info!(
                    "event=import_parse module=merge status=ok version={} type={} notes={} frames={} connections={} invalid={}",
                    bundle.version,
                    bundle.project.kind.as_str(),
                    bundle.project.notes.len(),
                    bundle.project.frames.len(),
                    bundle.project.connections.len(),
                    bundle.invalid_notes + bundle.invalid_links
                );
                self.summary.invalid_entries = bundle.invalid_notes + bundle.invalid_links;
                self.bundle = Some(bundle);
                Ok(())
            }
            Err(err) => Err(self.fail(ImportError::InvalidFormat(err))),
        }
    }

    /// Remaps identities, repositions board content and finds duplicates.
    ///
    /// `active` is required in merge mode and ignored in create-new mode.
    /// Returns the stage reached: `Detecting` when ready to merge, or
    /// `AwaitingResolution` when an interactive policy found duplicates.
    pub fn detect(
        &mut self,
        active: Option<&Project>,
        policy: ResolutionPolicy,
    ) -> Result<ImportStage, ImportError> {
        self.expect_stage(ImportStage::Parsing, "detect duplicates")?;
        let Some(bundle) = self.bundle.take() else {
            return Err(self.fail(ImportError::InvalidTransition {
                stage: ImportStage::Parsing,
                action: "detect duplicates",
            }));
        };
        self.transition(ImportStage::Detecting);

        let pending = match self.mode {
            ImportMode::CreateNew => self.plan_new_project(bundle),
            ImportMode::MergeIntoCurrent => {
                let target = match active {
                    Some(project) => project,
                    None => return Err(self.fail(ImportError::NoActiveProject)),
                };
                if target.kind != bundle.project.kind {
                    return Err(self.fail(ImportError::IncompatibleProjectType {
                        bundle: bundle.project.kind,
                        project: target.kind,
                    }));
                }
                self.plan_merge(bundle, target)
            }
        };

        let interactive = matches!(policy, ResolutionPolicy::Interactive);
        let mut pending = pending;
        if let ResolutionPolicy::Explicit(resolutions) = policy {
            pending.resolutions = index_resolutions(resolutions);
        }
        let awaiting = interactive && !pending.candidates.is_empty();
        debug!(
            "event=import_detect module=merge status=ok candidates={} frame_matches={}",
            pending.candidates.len(),
            pending.frame_matches.len()
        );
        self.candidates = pending.candidates.clone();
        self.pending = Some(pending);

        if awaiting {
            self.transition(ImportStage::AwaitingResolution);
        }
        Ok(self.stage)
    }

    /// Supplies decisions for candidates; unlisted ones are skipped.
    pub fn resolve(&mut self, resolutions: Vec<Resolution>) -> Result<(), ImportError> {
        self.expect_stage(ImportStage::AwaitingResolution, "resolve duplicates")?;
        if let Some(pending) = self.pending.as_mut() {
            pending.resolutions = index_resolutions(resolutions);
        }
        self.transition(ImportStage::Detecting);
        Ok(())
    }

    /// Builds the merged project and returns the persistence effects to run.
    pub fn merge(&mut self) -> Result<Vec<ImportEffect>, ImportError> {
        self.expect_stage(ImportStage::Detecting, "merge")?;
        let Some(pending) = self.pending.take() else {
            return Err(self.fail(ImportError::InvalidTransition {
                stage: ImportStage::Detecting,
                action: "merge",
            }));
        };
        self.transition(ImportStage::Merging);

        let (project, touched) = self.apply_pending(pending);
        let project_id = project.id.clone();
        self.summary.project_name = project.name.clone();
        self.merged = Some(project);

        let mut effects = Vec::with_capacity(3);
        if !touched.is_empty() {
            effects.push(ImportEffect::CompressAssets { note_ids: touched });
        }
        effects.push(ImportEffect::SaveProject {
            project_id: project_id.clone(),
        });
        effects.push(ImportEffect::ReloadProject { project_id });
        Ok(effects)
    }

    /// Folds per-image compression results into the summary.
    pub fn record_asset_compression(&mut self, compressed: usize, uncompressed: usize) {
        self.summary.assets_compressed += compressed;
        self.summary.assets_uncompressed += uncompressed;
    }

    /// Hands the merged project over for saving.
    pub fn begin_persist(&mut self) -> Result<&Project, ImportError> {
        self.expect_stage(ImportStage::Merging, "persist")?;
        if self.merged.is_none() {
            return Err(self.fail(ImportError::InvalidTransition {
                stage: ImportStage::Merging,
                action: "persist",
            }));
        }
        self.transition(ImportStage::Persisting);
        self.merged.as_ref().ok_or(ImportError::InvalidTransition {
            stage: ImportStage::Persisting,
            action: "persist",
        })
    }

    /// Records a failed save; the session ends in `Failed`.
    ///
    /// Outside `Persisting` the stage is left alone and an
    /// `InvalidTransition` is returned instead.
    pub fn persist_failed(&mut self, err: RepoError) -> ImportError {
        if let Err(invalid) = self.expect_stage(ImportStage::Persisting, "record save failure") {
            return invalid;
        }
        self.fail(ImportError::PersistenceFailure(err))
    }

    /// Records a successful save and moves on to reloading.
    pub fn persisted(&mut self) -> Result<(), ImportError> {
        self.expect_stage(ImportStage::Persisting, "mark persisted")?;
        self.transition(ImportStage::Reloading);
        Ok(())
    }

    /// Accepts the canonical project and completes the import.
    pub fn finish(
        &mut self,
        canonical: Project,
        strategy: ReloadStrategy,
    ) -> Result<Vec<ImportEffect>, ImportError> {
        self.expect_stage(ImportStage::Reloading, "finish")?;
        self.canonical = Some(canonical);
        self.reload_strategy = Some(strategy);
        self.transition(ImportStage::Done);
        let message = self.summary.message();
        info!(
            "event=import_done module=merge status=ok mode={:?} reload={:?} notes_merged={} notes_skipped={} frames_merged={} connections_merged={}",
            self.mode,
            strategy,
            self.summary.notes_merged,
            self.summary.notes_skipped,
            self.summary.frames_merged,
            self.summary.connections_merged
        );
        Ok(vec![ImportEffect::Notify { message }])
    }

    /// Discards in-flight work. Allowed until persistence starts.
    pub fn cancel(&mut self) -> Result<(), ImportError> {
        match self.stage {
            ImportStage::Idle
            | ImportStage::Parsing
            | ImportStage::Detecting
            | ImportStage::AwaitingResolution
            | ImportStage::Merging => {
                self.merged = None;
                let _ = self.fail(ImportError::Cancelled);
                Ok(())
            }
            stage => Err(ImportError::InvalidTransition {
                stage,
                action: "cancel",
            }),
        }
    }

    /// Canonical project and summary of a finished import.
    pub fn into_outcome(self) -> Option<(Project, ImportSummary)> {
        match (self.stage, self.canonical) {
            (ImportStage::Done, Some(project)) => Some((project, self.summary)),
            _ => None,
        }
    }

    fn plan_new_project(&mut self, bundle: ImportBundle) -> PendingMerge {
        let source = bundle.project;
        let mut target = Project::with_id(
            fresh_id(),
            format!("{}{IMPORTED_NAME_SUFFIX}", source.name),
            source.kind,
        );
        target.background_image = source.background_image;
        target.created_at = now_epoch_ms();
        self.summary.created_project = true;

        let mut remapped = remap(source.notes, source.frames, source.connections);
        self.summary.connections_dropped += remapped.dropped_connections;
        if !target.kind.is_board() {
            self.strip_board_entities(&mut remapped);
        }

        PendingMerge {
            target,
            remapped,
            candidates: Vec::new(),
            frame_matches: HashMap::new(),
            resolutions: HashMap::new(),
        }
    }

    fn plan_merge(&mut self, bundle: ImportBundle, active: &Project) -> PendingMerge {
        let source = bundle.project;
        let kind = active.kind;
        let mut remapped = remap(source.notes, source.frames, source.connections);
        self.summary.connections_dropped += remapped.dropped_connections;

        let mut frame_matches = HashMap::new();
        if kind.is_board() {
            let offset = compute_offset(&active.notes, &remapped.notes);
            apply_offset(
                &mut remapped.notes,
                offset,
                now_epoch_ms(),
                &mut rand::rng(),
            );
            apply_offset_to_frames(&mut remapped.frames, offset);
            debug!(
                "event=import_offset module=merge status=ok offset_x={} offset_y={}",
                offset.x, offset.y
            );

            for frame in &remapped.frames {
                if let Some(existing) = find_duplicate_frame(frame, &active.frames) {
                    frame_matches.insert(frame.id.clone(), existing.id.clone());
                }
            }
        } else {
            self.strip_board_entities(&mut remapped);
        }

        let candidates = remapped
            .notes
            .iter()
            .enumerate()
            .filter_map(|(import_index, note)| {
                find_duplicate(note, &active.notes, kind).map(|existing| DuplicateCandidate {
                    import_index,
                    incoming_note_id: note.id.clone(),
                    existing_note_id: existing.id.clone(),
                    class: PayloadClass::of(note),
                })
            })
            .collect();

        PendingMerge {
            target: active.clone(),
            remapped,
            candidates,
            frame_matches,
            resolutions: HashMap::new(),
        }
    }

    /// Map projects carry no frames or connections.
    fn strip_board_entities(&mut self, remapped: &mut RemappedEntities) {
        self.summary.frames_unsupported += remapped.frames.len();
        self.summary.connections_unsupported += remapped.connections.len();
        remapped.frames.clear();
        remapped.connections.clear();
        for note in &mut remapped.notes {
            note.group_id = None;
        }
    }

    fn apply_pending(&mut self, pending: PendingMerge) -> (Project, Vec<NoteId>) {
        let PendingMerge {
            mut target,
            remapped,
            candidates,
            frame_matches,
            resolutions,
        } = pending;
        let candidates: HashMap<usize, &DuplicateCandidate> = candidates
            .iter()
            .map(|candidate| (candidate.import_index, candidate))
            .collect();

        // Incoming fresh note id -> id the note ends up under.
        let mut resolved_ids: HashMap<NoteId, NoteId> = HashMap::new();
        let mut touched: Vec<NoteId> = Vec::new();

        for (index, mut note) in remapped.notes.into_iter().enumerate() {
            if let Some(group_id) = note.group_id.take() {
                let group_id = frame_matches.get(&group_id).cloned().unwrap_or(group_id);
                note.group_id = Some(group_id);
            }

            let action = match candidates.get(&index) {
                None => ResolutionAction::KeepBoth,
                Some(_) => resolutions
                    .get(&index)
                    .copied()
                    .unwrap_or(ResolutionAction::Skip),
            };

            match (action, candidates.get(&index)) {
                (ResolutionAction::Replace, Some(candidate)) => {
                    match target.note_mut(&candidate.existing_note_id) {
                        Some(existing) => {
                            if candidate.class.includes_images() {
                                existing.images = note.images;
                            }
                            if candidate.class.includes_sketch() {
                                existing.sketch = note.sketch;
                            }
                            resolved_ids.insert(note.id, existing.id.clone());
                            touched.push(existing.id.clone());
                            self.summary.notes_replaced += 1;
                        }
                        None => self.summary.notes_skipped += 1,
                    }
                }
                (ResolutionAction::Skip, Some(_)) => self.summary.notes_skipped += 1,
                _ => {
                    resolved_ids.insert(note.id.clone(), note.id.clone());
                    touched.push(note.id.clone());
                    target.notes.push(note);
                    self.summary.notes_merged += 1;
                }
            }
        }

        for frame in remapped.frames {
            if frame_matches.contains_key(&frame.id) {
                self.summary.frames_skipped += 1;
            } else {
                target.frames.push(frame);
                self.summary.frames_merged += 1;
            }
        }

        let mut links: HashSet<(NoteId, NoteId)> = target
            .connections
            .iter()
            .map(|connection| {
                (
                    connection.from_note_id.clone(),
                    connection.to_note_id.clone(),
                )
            })
            .collect();
        for mut connection in remapped.connections {
            let endpoints = (
                resolved_ids.get(&connection.from_note_id).cloned(),
                resolved_ids.get(&connection.to_note_id).cloned(),
            );
            match endpoints {
                (Some(from), Some(to))
                    if from != to && links.insert((from.clone(), to.clone())) =>
                {
                    connection.from_note_id = from;
                    connection.to_note_id = to;
                    target.connections.push(connection);
                    self.summary.connections_merged += 1;
                }
                _ => self.summary.connections_dropped += 1,
            }
        }

        let pruned = target.prune_dangling_references();
        self.summary.connections_dropped += pruned.dropped_connections;
        (target, touched)
    }

    fn expect_stage(&self, expected: ImportStage, action: &'static str) -> Result<(), ImportError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(ImportError::InvalidTransition {
                stage: self.stage,
                action,
            })
        }
    }

    fn transition(&mut self, next: ImportStage) {
        debug!(
            "event=import_stage module=merge from={} to={}",
            self.stage.as_str(),
            next.as_str()
        );
        self.stage = next;
    }

    fn fail(&mut self, err: ImportError) -> ImportError {
        self.transition(ImportStage::Failed);
        self.failure = Some(err.to_string());
        self.bundle = None;
        self.pending = None;
        err
    }
}

fn index_resolutions(resolutions: Vec<Resolution>) -> HashMap<usize, ResolutionAction> {
    resolutions
        .into_iter()
        .map(|resolution| (resolution.import_index, resolution.action))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{join_list, ImportError, ImportSummary};
    use crate::model::project::ProjectType;

    #[test]
    fn join_list_reads_naturally() {
        assert_eq!(join_list(&["a".into()]), "a");
        assert_eq!(join_list(&["a".into(), "b".into(), "c".into()]), "a, b and c");
    }

    #[test]
    fn summary_message_mentions_skips_and_compression() {
        let summary = ImportSummary {
            project_name: "Trip".to_string(),
            notes_merged: 2,
            frames_merged: 1,
            connections_merged: 0,
            notes_skipped: 1,
            assets_uncompressed: 1,
            ..ImportSummary::default()
        };
        let message = summary.message();
        assert!(message.starts_with("Merged 2 notes, 1 frame and 0 connections into \"Trip\"."));
        assert!(message.contains("Skipped 1 duplicate note."));
        assert!(message.contains("1 image could not be compressed"));
    }

    #[test]
    fn summary_message_separates_unsupported_board_entities() {
        let summary = ImportSummary {
            project_name: "Trip".to_string(),
            notes_merged: 2,
            frames_unsupported: 1,
            connections_unsupported: 2,
            ..ImportSummary::default()
        };
        let message = summary.message();
        assert!(!message.contains("Skipped"));
        assert!(message.contains("Left out 1 frame and 2 connections;"));
    }

    #[test]
    fn type_mismatch_message_names_both_types() {
        let err = ImportError::IncompatibleProjectType {
            bundle: ProjectType::Map,
            project: ProjectType::Image,
        };
        assert_eq!(
            err.to_string(),
            "cannot merge a project of type `map` into a project of type `image`"
        );
    }
}
