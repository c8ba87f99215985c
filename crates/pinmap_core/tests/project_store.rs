use pinmap_core::assets::encode_data_url;
use pinmap_core::db::open_db_in_memory;
use pinmap_core::repo::asset_repo::count_assets;
use pinmap_core::{
    Connection, Frame, ImageSource, Note, NoteTag, NoteVariant, Project, ProjectStore,
    ProjectType, RepoError, SqliteProjectStore,
};

fn board_project() -> Project {
    let mut project = Project::new("Board", ProjectType::Image);
    let frame = Frame::new("Cluster", 0.0, 0.0);
    let mut first = Note::board("first", 10.0, 20.0);
    first.group_id = Some(frame.id.clone());
    first.group_names = vec!["Cluster".to_string()];
    first.variant = NoteVariant::Compact;
    first.tags = vec![NoteTag {
        id: "t1".to_string(),
        label: "todo".to_string(),
        color: "#ff0".to_string(),
    }];
    let second = Note::board("second", 400.0, 20.0);
    let link = Connection::new(first.id.clone(), second.id.clone());
    project.frames.push(frame);
    project.notes.extend([first, second]);
    project.connections.push(link);
    project
}

#[test]
fn save_then_load_round_trips_whole_project() {
    let mut conn = open_db_in_memory().unwrap();
    let mut store = SqliteProjectStore::try_new(&mut conn).unwrap();
    let project = board_project();

    store.save_project(&project).unwrap();
    let loaded = store.load_project(&project.id, false).unwrap().unwrap();

    assert_eq!(loaded, project);
}

#[test]
fn saving_again_replaces_children() {
    let mut conn = open_db_in_memory().unwrap();
    let mut store = SqliteProjectStore::try_new(&mut conn).unwrap();
    let mut project = board_project();
    store.save_project(&project).unwrap();

    project.name = "Renamed".to_string();
    project.connections.clear();
    project.notes.pop();
    store.save_project(&project).unwrap();

    let loaded = store.load_project(&project.id, false).unwrap().unwrap();
    assert_eq!(loaded.name, "Renamed");
    assert_eq!(loaded.notes.len(), 1);
    assert!(loaded.connections.is_empty());
    assert_eq!(store.list_projects().unwrap()[0].note_count, 1);
}

#[test]
fn inline_images_are_stored_once_and_hydrated_on_demand() {
    let mut conn = open_db_in_memory().unwrap();
    let mut store = SqliteProjectStore::try_new(&mut conn).unwrap();
    let url = encode_data_url("image/png", b"png bytes");
    let mut project = Project::new("Trip", ProjectType::Map);
    let mut note = Note::map("photo", 1.0, 2.0);
    note.images = vec![ImageSource::Inline(url.clone()), ImageSource::Inline(url.clone())];
    project.notes.push(note);

    store.save_project(&project).unwrap();
    store.save_project(&project).unwrap();
    assert_eq!(count_assets(store.connection()).unwrap(), 1);

    let raw = store.load_project(&project.id, false).unwrap().unwrap();
    assert!(raw.notes[0].images[0].asset_id().is_some());

    let hydrated = store.load_project(&project.id, true).unwrap().unwrap();
    assert_eq!(hydrated.notes[0].images, vec![ImageSource::Inline(url.clone()); 2]);
}

#[test]
fn project_type_cannot_change_after_creation() {
    let mut conn = open_db_in_memory().unwrap();
    let mut store = SqliteProjectStore::try_new(&mut conn).unwrap();
    let mut project = Project::new("Trip", ProjectType::Map);
    store.save_project(&project).unwrap();

    project.kind = ProjectType::Image;
    let err = store.save_project(&project).unwrap_err();
    assert!(matches!(
        err,
        RepoError::ImmutableProjectType {
            stored: ProjectType::Map,
            requested: ProjectType::Image,
            ..
        }
    ));
}

#[test]
fn dangling_references_are_pruned_on_save() {
    let mut conn = open_db_in_memory().unwrap();
    let mut store = SqliteProjectStore::try_new(&mut conn).unwrap();
    let mut project = board_project();
    project.notes[1].group_id = Some("gone".to_string());
    project
        .connections
        .push(Connection::new(project.notes[0].id.clone(), "missing"));

    store.save_project(&project).unwrap();
    let loaded = store.load_project(&project.id, false).unwrap().unwrap();

    assert!(loaded.notes[1].group_id.is_none());
    assert_eq!(loaded.connections.len(), 1);
    assert!(loaded.integrity_violations().is_empty());
}

#[test]
fn placement_mismatch_fails_and_keeps_previous_version() {
    let mut conn = open_db_in_memory().unwrap();
    let mut store = SqliteProjectStore::try_new(&mut conn).unwrap();
    let mut project = Project::new("Trip", ProjectType::Map);
    project.notes.push(Note::map("ok", 1.0, 1.0));
    store.save_project(&project).unwrap();

    project.notes.push(Note::board("wrong", 1.0, 1.0));
    let err = store.save_project(&project).unwrap_err();
    assert!(matches!(err, RepoError::Integrity(_)));

    let loaded = store.load_project(&project.id, false).unwrap().unwrap();
    assert_eq!(loaded.notes.len(), 1);
}

#[test]
fn delete_removes_project_and_reports_unknown_ids() {
    let mut conn = open_db_in_memory().unwrap();
    let mut store = SqliteProjectStore::try_new(&mut conn).unwrap();
    let project = board_project();
    store.save_project(&project).unwrap();

    store.delete_project(&project.id).unwrap();
    assert!(store.load_project(&project.id, false).unwrap().is_none());
    assert!(store.list_projects().unwrap().is_empty());
    assert!(matches!(
        store.delete_project(&project.id),
        Err(RepoError::NotFound(_))
    ));
}

#[test]
fn list_and_load_all_follow_creation_order() {
    let mut conn = open_db_in_memory().unwrap();
    let mut store = SqliteProjectStore::try_new(&mut conn).unwrap();
    let mut older = Project::new("older", ProjectType::Map);
    older.created_at = 1_000;
    let mut newer = Project::new("newer", ProjectType::Image);
    newer.created_at = 2_000;
    store.save_project(&newer).unwrap();
    store.save_project(&older).unwrap();

    let names: Vec<String> = store
        .list_projects()
        .unwrap()
        .into_iter()
        .map(|item| item.name)
        .collect();
    assert_eq!(names, vec!["older".to_string(), "newer".to_string()]);
    assert_eq!(store.load_all_projects(false).unwrap().len(), 2);
}

#[test]
fn store_requires_migrated_schema() {
    let mut conn = rusqlite::Connection::open_in_memory().unwrap();
    assert!(matches!(
        SqliteProjectStore::try_new(&mut conn),
        Err(RepoError::MissingRequiredTable("projects"))
    ));
}
