use pinmap_core::db::open_db_in_memory;
use pinmap_core::{
    ImageSource, ImportError, ImportLocks, ImportMode, ImportService, Note, Project,
    ProjectListItem, ProjectStore, ProjectType, ReloadStrategy, RepoError, RepoResult, Resolution,
    ResolutionAction, ResolutionPolicy, SqliteProjectStore,
};
use serde_json::json;
use std::sync::Arc;

/// In-memory store with switchable failures.
#[derive(Default)]
struct MemoryStore {
    projects: Vec<Project>,
    fail_save: bool,
    hide_by_id: bool,
    hide_from_scan: bool,
}

impl ProjectStore for MemoryStore {
    fn save_project(&mut self, project: &Project) -> RepoResult<()> {
        if self.fail_save {
            return Err(RepoError::InvalidData("disk full".to_string()));
        }
        self.projects.retain(|stored| stored.id != project.id);
        self.projects.push(project.clone());
        Ok(())
    }

    fn load_project(&self, project_id: &str, _hydrate: bool) -> RepoResult<Option<Project>> {
        if self.hide_by_id {
            return Ok(None);
        }
        Ok(self.projects.iter().find(|p| p.id == project_id).cloned())
    }

    fn load_all_projects(&self, _hydrate: bool) -> RepoResult<Vec<Project>> {
        if self.hide_from_scan {
            return Err(RepoError::InvalidData("scan failed".to_string()));
        }
        Ok(self.projects.clone())
    }

    fn list_projects(&self) -> RepoResult<Vec<ProjectListItem>> {
        Ok(self
            .projects
            .iter()
            .map(|project| ProjectListItem {
                id: project.id.clone(),
                name: project.name.clone(),
                kind: project.kind,
                created_at: project.created_at,
                note_count: project.notes.len(),
            })
            .collect())
    }

    fn delete_project(&mut self, project_id: &str) -> RepoResult<()> {
        self.projects.retain(|project| project.id != project_id);
        Ok(())
    }
}

fn service<S: ProjectStore>(store: S) -> ImportService<S> {
    ImportService::new(store).with_locks(Arc::new(ImportLocks::new()))
}

fn map_file() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "version": "1.0",
        "project": {"name": "Trip", "type": "map", "notes": [
            {"id": "a", "text": "Cafe", "coords": {"lat": 48.85, "lng": 2.35}},
            {"id": "b", "text": "Museum", "coords": {"lat": 48.86, "lng": 2.33}}
        ]}
    }))
    .unwrap()
}

#[test]
fn create_new_twice_yields_two_independent_projects() {
    let mut conn = open_db_in_memory().unwrap();
    let store = SqliteProjectStore::try_new(&mut conn).unwrap();
    let mut service = service(store);

    let first = service
        .import(&map_file(), ImportMode::CreateNew, None, ResolutionPolicy::Automatic)
        .unwrap();
    let second = service
        .import(&map_file(), ImportMode::CreateNew, None, ResolutionPolicy::Automatic)
        .unwrap();

    assert_ne!(first.project.id, second.project.id);
    assert_eq!(first.project.name, "Trip (Imported)");
    assert_eq!(first.reload_strategy, ReloadStrategy::ReloadById);
    assert!(first.message.starts_with("Imported \"Trip (Imported)\" with 2 notes"));
    let listed = service.store().list_projects().unwrap();
    assert_eq!(listed.len(), 2);
    assert!(first
        .project
        .notes
        .iter()
        .all(|note| second.project.note(&note.id).is_none()));
}

#[test]
fn merging_same_file_again_skips_everything() {
    let mut conn = open_db_in_memory().unwrap();
    let store = SqliteProjectStore::try_new(&mut conn).unwrap();
    let mut service = service(store);
    let created = service
        .import(&map_file(), ImportMode::CreateNew, None, ResolutionPolicy::Automatic)
        .unwrap();

    let merged = service
        .import(
            &map_file(),
            ImportMode::MergeIntoCurrent,
            Some(&created.project.id),
            ResolutionPolicy::Automatic,
        )
        .unwrap();

    assert_eq!(merged.project.id, created.project.id);
    assert_eq!(merged.project.notes.len(), 2);
    assert_eq!(merged.summary.notes_skipped, 2);
    assert_eq!(merged.summary.notes_merged, 0);
}

#[test]
fn preview_then_explicit_resolution_keeps_both() {
    let mut conn = open_db_in_memory().unwrap();
    let store = SqliteProjectStore::try_new(&mut conn).unwrap();
    let mut service = service(store);
    let created = service
        .import(&map_file(), ImportMode::CreateNew, None, ResolutionPolicy::Automatic)
        .unwrap();
    let target = Some(created.project.id.as_str());

    let preview = service
        .preview(&map_file(), ImportMode::MergeIntoCurrent, target)
        .unwrap();
    assert_eq!(preview.bundle_type, ProjectType::Map);
    assert_eq!(preview.candidates.len(), 2);

    assert!(matches!(
        service.import(
            &map_file(),
            ImportMode::MergeIntoCurrent,
            target,
            ResolutionPolicy::Interactive
        ),
        Err(ImportError::ResolutionRequired { candidates: 2 })
    ));

    let resolutions = preview
        .candidates
        .iter()
        .map(|candidate| Resolution {
            import_index: candidate.import_index,
            action: ResolutionAction::KeepBoth,
        })
        .collect();
    let outcome = service
        .import(
            &map_file(),
            ImportMode::MergeIntoCurrent,
            target,
            ResolutionPolicy::Explicit(resolutions),
        )
        .unwrap();
    assert_eq!(outcome.project.notes.len(), 4);
}

#[test]
fn failed_save_leaves_store_untouched() {
    let mut existing = Project::new("Trip", ProjectType::Map);
    existing.notes.push(Note::map("Old", 1.0, 1.0));
    let before = existing.clone();
    let store = MemoryStore {
        projects: vec![existing.clone()],
        fail_save: true,
        ..MemoryStore::default()
    };
    let mut service = service(store);

    let err = service
        .import(
            &map_file(),
            ImportMode::MergeIntoCurrent,
            Some(&existing.id),
            ResolutionPolicy::Automatic,
        )
        .unwrap_err();

    assert!(matches!(err, ImportError::PersistenceFailure(_)));
    let store = service.into_store();
    assert_eq!(store.projects, vec![before]);
}

#[test]
fn reload_falls_back_to_scan_then_local_copy() {
    let store = MemoryStore {
        hide_by_id: true,
        ..MemoryStore::default()
    };
    let mut service = service(store);
    let outcome = service
        .import(&map_file(), ImportMode::CreateNew, None, ResolutionPolicy::Automatic)
        .unwrap();
    assert_eq!(outcome.reload_strategy, ReloadStrategy::ScanAllProjects);

    let store = MemoryStore {
        hide_by_id: true,
        hide_from_scan: true,
        ..MemoryStore::default()
    };
    let mut service = self::service(store);
    let outcome = service
        .import(&map_file(), ImportMode::CreateNew, None, ResolutionPolicy::Automatic)
        .unwrap();
    assert_eq!(outcome.reload_strategy, ReloadStrategy::LocalMerged);
    assert_eq!(outcome.project.notes.len(), 2);
}

#[test]
fn concurrent_import_into_same_project_is_rejected() {
    let existing = Project::new("Trip", ProjectType::Map);
    let locks = Arc::new(ImportLocks::new());
    let store = MemoryStore {
        projects: vec![existing.clone()],
        ..MemoryStore::default()
    };
    let mut service = ImportService::new(store).with_locks(Arc::clone(&locks));

    let held = locks.try_acquire(&existing.id).unwrap();
    assert!(matches!(
        service.import(
            &map_file(),
            ImportMode::MergeIntoCurrent,
            Some(&existing.id),
            ResolutionPolicy::Automatic
        ),
        Err(ImportError::ImportInProgress(_))
    ));
    drop(held);

    let outcome = service
        .import(
            &map_file(),
            ImportMode::MergeIntoCurrent,
            Some(&existing.id),
            ResolutionPolicy::Automatic,
        )
        .unwrap();
    assert_eq!(outcome.project.notes.len(), 2);
    assert!(!locks.is_locked(&existing.id));
}

#[test]
fn type_mismatch_and_missing_target_are_reported() {
    let board = Project::new("Board", ProjectType::Image);
    let store = MemoryStore {
        projects: vec![board.clone()],
        ..MemoryStore::default()
    };
    let mut service = service(store);

    assert!(matches!(
        service.import(
            &map_file(),
            ImportMode::MergeIntoCurrent,
            Some(&board.id),
            ResolutionPolicy::Automatic
        ),
        Err(ImportError::IncompatibleProjectType { .. })
    ));
    assert!(matches!(
        service.import(
            &map_file(),
            ImportMode::MergeIntoCurrent,
            Some("unknown"),
            ResolutionPolicy::Automatic
        ),
        Err(ImportError::NoActiveProject)
    ));
    assert_eq!(service.store().projects, vec![board]);
}

#[test]
fn undecodable_images_do_not_fail_the_import() {
    let file = serde_json::to_vec(&json!({"project": {"name": "Pics", "type": "map", "notes": [
        {"id": "a", "text": "broken", "coords": {"lat": 1, "lng": 1},
         "images": ["data:image/png;base64,aGVsbG8="]}
    ]}}))
    .unwrap();
    let mut service = service(MemoryStore::default());

    let outcome = service
        .import(&file, ImportMode::CreateNew, None, ResolutionPolicy::Automatic)
        .unwrap();

    assert_eq!(outcome.summary.assets_uncompressed, 1);
    assert!(outcome.message.contains("1 image could not be compressed"));
    assert_eq!(
        outcome.project.notes[0].images,
        vec![ImageSource::Inline("data:image/png;base64,aGVsbG8=".to_string())]
    );
}

#[test]
fn canonical_project_carries_stored_image_references() {
    let file = serde_json::to_vec(&json!({"project": {"name": "Pics", "type": "map", "notes": [
        {"id": "a", "text": "photo", "coords": {"lat": 1, "lng": 1},
         "images": ["data:image/png;base64,aGVsbG8="]}
    ]}}))
    .unwrap();
    let mut conn = open_db_in_memory().unwrap();
    let store = SqliteProjectStore::try_new(&mut conn).unwrap();
    let mut service = service(store).with_compression(None);

    let outcome = service
        .import(&file, ImportMode::CreateNew, None, ResolutionPolicy::Automatic)
        .unwrap();

    assert_eq!(outcome.reload_strategy, ReloadStrategy::ReloadById);
    assert!(outcome.project.notes[0].images[0].asset_id().is_some());
    assert_eq!(outcome.summary.assets_uncompressed, 0);
}
