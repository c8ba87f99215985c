use pinmap_core::db::open_db_in_memory;
use pinmap_core::{
    Frame, Note, ProjectService, ProjectServiceError, ProjectStore, ProjectType,
    SqliteProjectStore,
};

#[test]
fn create_rename_list_delete() {
    let mut conn = open_db_in_memory().unwrap();
    let store = SqliteProjectStore::try_new(&mut conn).unwrap();
    let mut service = ProjectService::new(store);

    assert!(matches!(
        service.create_project("   ", ProjectType::Map, None),
        Err(ProjectServiceError::InvalidInput(_))
    ));
    let project = service
        .create_project("  Trip  ", ProjectType::Map, None)
        .unwrap();
    assert_eq!(project.name, "Trip");

    let renamed = service.rename_project(&project.id, "Paris").unwrap();
    assert_eq!(renamed.name, "Paris");
    let listed = service.list_projects().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Paris");
    assert_eq!(listed[0].kind, ProjectType::Map);

    service.delete_project(&project.id).unwrap();
    assert!(matches!(
        service.get_project(&project.id, false),
        Err(ProjectServiceError::ProjectNotFound(_))
    ));
}

#[test]
fn note_edits_respect_project_type() {
    let mut conn = open_db_in_memory().unwrap();
    let store = SqliteProjectStore::try_new(&mut conn).unwrap();
    let mut service = ProjectService::new(store);
    let project = service
        .create_project("Trip", ProjectType::Map, None)
        .unwrap();

    assert!(matches!(
        service.add_note(&project.id, Note::board("wrong", 0.0, 0.0)),
        Err(ProjectServiceError::PlacementMismatch {
            expected: ProjectType::Map
        })
    ));
    assert!(matches!(
        service.add_frame(&project.id, Frame::new("F", 0.0, 0.0)),
        Err(ProjectServiceError::NotBoardProject(_))
    ));

    let mut note = Note::map("Cafe", 1.0, 2.0);
    service.add_note(&project.id, note.clone()).unwrap();
    assert!(matches!(
        service.add_note(&project.id, note.clone()),
        Err(ProjectServiceError::DuplicateNoteId(_))
    ));

    note.text = "Bakery".to_string();
    let updated = service.update_note(&project.id, note.clone()).unwrap();
    assert_eq!(updated.note(&note.id).unwrap().text, "Bakery");

    let removed = service.remove_note(&project.id, &note.id).unwrap();
    assert!(removed.notes.is_empty());
    assert!(matches!(
        service.remove_note(&project.id, &note.id),
        Err(ProjectServiceError::NoteNotFound(_))
    ));
}

#[test]
fn board_frames_and_connections() {
    let mut conn = open_db_in_memory().unwrap();
    let store = SqliteProjectStore::try_new(&mut conn).unwrap();
    let mut service = ProjectService::new(store);
    let project = service
        .create_project("Board", ProjectType::Image, None)
        .unwrap();
    let a = Note::board("a", 0.0, 0.0);
    let b = Note::board("b", 300.0, 0.0);
    let frame = Frame::new(" Ideas ", -20.0, -20.0);
    service.add_note(&project.id, a.clone()).unwrap();
    service.add_note(&project.id, b.clone()).unwrap();
    service.add_frame(&project.id, frame.clone()).unwrap();

    let grouped = service
        .assign_note_to_frame(&project.id, &a.id, Some(&frame.id))
        .unwrap();
    let note = grouped.note(&a.id).unwrap();
    assert_eq!(note.group_id.as_deref(), Some(frame.id.as_str()));
    assert_eq!(note.group_names, vec!["Ideas".to_string()]);

    let linked = service.connect_notes(&project.id, &a.id, &b.id).unwrap();
    assert_eq!(linked.connections.len(), 1);
    assert!(matches!(
        service.connect_notes(&project.id, &a.id, &b.id),
        Err(ProjectServiceError::DuplicateConnection { .. })
    ));
    assert!(matches!(
        service.connect_notes(&project.id, &a.id, &a.id),
        Err(ProjectServiceError::SelfConnection(_))
    ));

    let without_b = service.remove_note(&project.id, &b.id).unwrap();
    assert!(without_b.connections.is_empty());

    let ungrouped = service.remove_frame(&project.id, &frame.id).unwrap();
    assert!(ungrouped.note(&a.id).unwrap().group_id.is_none());
    assert_eq!(
        ungrouped.note(&a.id).unwrap().group_names,
        vec!["Ideas".to_string()]
    );

    let store = service.into_store();
    let stored = store.load_project(&project.id, false).unwrap().unwrap();
    assert!(stored.frames.is_empty());
    assert!(stored.integrity_violations().is_empty());
}

#[test]
fn removing_unknown_connection_fails() {
    let mut conn = open_db_in_memory().unwrap();
    let store = SqliteProjectStore::try_new(&mut conn).unwrap();
    let mut service = ProjectService::new(store);
    let project = service
        .create_project("Board", ProjectType::Image, None)
        .unwrap();
    assert!(matches!(
        service.remove_connection(&project.id, "nope"),
        Err(ProjectServiceError::ConnectionNotFound(_))
    ));
    assert!(matches!(
        service.rename_project("missing", "x"),
        Err(ProjectServiceError::ProjectNotFound(_))
    ));
}
