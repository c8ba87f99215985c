use pinmap_core::assets::encode_data_url;
use pinmap_core::db::open_db_in_memory;
use pinmap_core::{
    export_csv, export_json, parse_bundle, ExportError, Frame, ImageSource, Note, NoteTag,
    Project, ProjectStore, ProjectType, SqliteProjectStore, BUNDLE_VERSION,
};

#[test]
fn json_export_hydrates_images_and_parses_back() {
    let mut conn = open_db_in_memory().unwrap();
    let mut store = SqliteProjectStore::try_new(&mut conn).unwrap();
    let url = encode_data_url("image/png", b"tiny png");
    let mut project = Project::new("Trip", ProjectType::Map);
    let mut note = Note::map("Cafe", 48.85, 2.35);
    note.images = vec![ImageSource::Inline(url.clone())];
    project.notes.push(note);
    store.save_project(&project).unwrap();

    let json = export_json(&store, &project.id).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["version"], BUNDLE_VERSION);
    assert_eq!(value["project"]["type"], "map");
    assert_eq!(value["project"]["notes"][0]["images"][0], url.as_str());
    assert_eq!(value["project"]["notes"][0]["coords"]["lat"], 48.85);

    let bundle = parse_bundle(json.as_bytes()).unwrap();
    assert_eq!(bundle.project.notes, project.notes);
    assert_eq!(bundle.invalid_notes, 0);
}

#[test]
fn csv_export_lists_board_notes_in_display_order_with_groups() {
    let mut conn = open_db_in_memory().unwrap();
    let mut store = SqliteProjectStore::try_new(&mut conn).unwrap();
    let mut project = Project::new("Board", ProjectType::Image);
    let frame = Frame::new("Kitchen", 0.0, 0.0);

    let mut later = Note::board("later", 10.4, 20.6);
    later.created_at = 2_000;
    let mut earlier = Note::board("earlier", 1.0, 2.0);
    earlier.created_at = 1_000;
    earlier.group_id = Some(frame.id.clone());
    earlier.group_names = vec!["Cached".to_string()];
    earlier.tags = ["a", "b", "c", "d"]
        .iter()
        .map(|label| NoteTag {
            id: label.to_string(),
            label: label.to_string(),
            color: String::new(),
        })
        .collect();
    project.frames.push(frame);
    project.notes.extend([later, earlier]);
    store.save_project(&project).unwrap();

    let csv = export_csv(&store, &project.id).unwrap();
    let lines: Vec<&str> = csv.trim_start_matches('\u{feff}').lines().collect();

    assert_eq!(
        lines[0],
        "\"X, Y\",\"Text\",\"Tag 1\",\"Tag 2\",\"Tag 3\",\"Group 1\",\"Group 2\",\"Group 3\""
    );
    assert_eq!(
        lines[1],
        "\"1, 2\",\"earlier\",\"a\",\"b\",\"c\",\"Kitchen\",\"Cached\",\"\""
    );
    assert_eq!(lines[2], "\"10, 21\",\"later\",\"\",\"\",\"\",\"\",\"\",\"\"");
}

#[test]
fn exporting_unknown_project_is_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let store = SqliteProjectStore::try_new(&mut conn).unwrap();
    assert!(matches!(
        export_json(&store, "missing"),
        Err(ExportError::ProjectNotFound(id)) if id == "missing"
    ));
    assert!(matches!(
        export_csv(&store, "missing"),
        Err(ExportError::ProjectNotFound(_))
    ));
}
