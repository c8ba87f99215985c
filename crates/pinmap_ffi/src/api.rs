//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose project import/export and listing as stable use-case functions.
//! - Convert every core error into a response envelope message.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Every envelope carries `ok` and a human-readable `message`.

use log::warn;
use pinmap_core::db::open_db;
use pinmap_core::{
    core_version as core_version_inner, export_csv, export_json,
    init_logging as init_logging_inner, ping as ping_inner, CoreConfig, ImportMode,
    ImportService, ProjectService, ProjectStore, ProjectType, Resolution, ResolutionAction,
    ResolutionPolicy, SqliteProjectStore,
};
use std::path::PathBuf;
use std::sync::OnceLock;

static DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static CONFIG: OnceLock<CoreConfig> = OnceLock::new();

/// Health-check; always returns `pong`.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Returns an empty string on success and the error message otherwise.
/// Repeating the call with the same `level + log_dir` is a no-op.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Loads core settings from a JSON config file; must run before any
/// storage call to take effect. Returns an empty string on success.
#[flutter_rust_bridge::frb(sync)]
pub fn configure(config_path: String) -> String {
    match CoreConfig::load(config_path.trim()) {
        Ok(config) => match CONFIG.set(config) {
            Ok(()) => String::new(),
            Err(_) => "configuration already applied".to_string(),
        },
        Err(err) => err.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectListEntry {
    pub id: String,
    pub name: String,
    /// `map` or `image`.
    pub project_type: String,
    pub note_count: u32,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectListResponse {
    pub ok: bool,
    pub items: Vec<ProjectListEntry>,
    pub message: String,
}

/// Generic action envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectActionResponse {
    pub ok: bool,
    pub project_id: Option<String>,
    pub message: String,
}

impl ProjectActionResponse {
    fn success(message: impl Into<String>, project_id: String) -> Self {
        Self {
            ok: true,
            project_id: Some(project_id),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            project_id: None,
            message: message.into(),
        }
    }
}

/// Decision for one duplicate returned by `preview_import`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportResolutionInput {
    pub import_index: u32,
    /// `skip`, `replace` or `keep_both`.
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateItem {
    pub import_index: u32,
    pub incoming_note_id: String,
    pub existing_note_id: String,
    /// `image`, `sketch`, `both` or `none`.
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPreviewResponse {
    pub ok: bool,
    pub duplicates: Vec<DuplicateItem>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResponse {
    pub ok: bool,
    pub content: String,
    pub message: String,
}

/// Lists stored projects ordered by creation time.
#[flutter_rust_bridge::frb(sync)]
pub fn list_projects() -> ProjectListResponse {
    let listed = with_store(|store| store.list_projects().map_err(|err| err.to_string()));
    match listed {
        Ok(items) => ProjectListResponse {
            ok: true,
            message: format!("{} project(s).", items.len()),
            items: items
                .into_iter()
                .map(|item| ProjectListEntry {
                    id: item.id,
                    name: item.name,
                    project_type: item.kind.as_str().to_string(),
                    note_count: item.note_count as u32,
                    created_at: item.created_at,
                })
                .collect(),
        },
        Err(err) => ProjectListResponse {
            ok: false,
            items: Vec::new(),
            message: format!("list_projects failed: {err}"),
        },
    }
}

/// Creates an empty project of type `map` or `image`.
#[flutter_rust_bridge::frb(sync)]
pub fn create_project(name: String, project_type: String) -> ProjectActionResponse {
    let Some(kind) = ProjectType::parse(&project_type) else {
        return ProjectActionResponse::failure(format!(
            "create_project failed: unknown project type `{project_type}`"
        ));
    };
    let created = with_store(|store| {
        ProjectService::new(store)
            .create_project(&name, kind, None)
            .map_err(|err| err.to_string())
    });
    match created {
        Ok(project) => ProjectActionResponse::success("Project created.", project.id),
        Err(err) => ProjectActionResponse::failure(format!("create_project failed: {err}")),
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn delete_project(project_id: String) -> ProjectActionResponse {
    let deleted = with_store(|store| {
        ProjectService::new(store)
            .delete_project(project_id.trim())
            .map_err(|err| err.to_string())
    });
    match deleted {
        Ok(()) => ProjectActionResponse::success("Project deleted.", project_id),
        Err(err) => ProjectActionResponse::failure(format!("delete_project failed: {err}")),
    }
}

/// Lists duplicates an import would meet, without saving anything.
#[flutter_rust_bridge::frb(sync)]
pub fn preview_import(bytes: Vec<u8>, into_project_id: Option<String>) -> ImportPreviewResponse {
    let (mode, target) = import_target(into_project_id.as_deref());
    let previewed = with_store(|store| {
        ImportService::new(store)
            .preview(&bytes, mode, target)
            .map_err(|err| err.to_string())
    });
    match previewed {
        Ok(preview) => ImportPreviewResponse {
            ok: true,
            message: format!("{} duplicate note(s).", preview.candidates.len()),
            duplicates: preview
                .candidates
                .into_iter()
                .map(|candidate| DuplicateItem {
                    import_index: candidate.import_index as u32,
                    incoming_note_id: candidate.incoming_note_id,
                    existing_note_id: candidate.existing_note_id,
                    payload: format!("{:?}", candidate.class).to_ascii_lowercase(),
                })
                .collect(),
        },
        Err(err) => ImportPreviewResponse {
            ok: false,
            duplicates: Vec::new(),
            message: format!("preview_import failed: {err}"),
        },
    }
}

/// Imports a project file.
///
/// Without `into_project_id` the file becomes a new project; otherwise it is
/// merged into that project. Empty `resolutions` skips every duplicate.
#[flutter_rust_bridge::frb(sync)]
pub fn import_project_file(
    bytes: Vec<u8>,
    into_project_id: Option<String>,
    resolutions: Vec<ImportResolutionInput>,
) -> ProjectActionResponse {
    let policy = match parse_resolutions(resolutions) {
        Ok(policy) => policy,
        Err(err) => return ProjectActionResponse::failure(format!("import failed: {err}")),
    };
    let (mode, target) = import_target(into_project_id.as_deref());
    let compression = config().image_compression.options();
    let imported = with_store(|store| {
        ImportService::new(store)
            .with_compression(compression)
            .import(&bytes, mode, target, policy)
            .map_err(|err| err.to_string())
    });
    match imported {
        Ok(outcome) => ProjectActionResponse::success(outcome.message, outcome.project.id),
        Err(err) => {
            warn!("event=ffi_import module=ffi status=error bytes={}", bytes.len());
            ProjectActionResponse::failure(format!("import failed: {err}"))
        }
    }
}

/// Full JSON export with images hydrated.
#[flutter_rust_bridge::frb(sync)]
pub fn export_project_json(project_id: String) -> ExportResponse {
    export_with(|store| export_json(store, project_id.trim()))
}

/// CSV listing of the project's notes.
#[flutter_rust_bridge::frb(sync)]
pub fn export_project_csv(project_id: String) -> ExportResponse {
    export_with(|store| export_csv(store, project_id.trim()))
}

fn export_with(
    render: impl FnOnce(&SqliteProjectStore<'_>) -> Result<String, pinmap_core::ExportError>,
) -> ExportResponse {
    match with_store(|store| render(&store).map_err(|err| err.to_string())) {
        Ok(content) => ExportResponse {
            ok: true,
            message: format!("Exported {} byte(s).", content.len()),
            content,
        },
        Err(err) => ExportResponse {
            ok: false,
            content: String::new(),
            message: format!("export failed: {err}"),
        },
    }
}

fn import_target(into_project_id: Option<&str>) -> (ImportMode, Option<&str>) {
    match into_project_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => (ImportMode::MergeIntoCurrent, Some(id)),
        None => (ImportMode::CreateNew, None),
    }
}

fn parse_resolutions(inputs: Vec<ImportResolutionInput>) -> Result<ResolutionPolicy, String> {
    if inputs.is_empty() {
        return Ok(ResolutionPolicy::Automatic);
    }
    let resolutions = inputs
        .into_iter()
        .map(|input| {
            let action = match input.action.trim() {
                "skip" => ResolutionAction::Skip,
                "replace" => ResolutionAction::Replace,
                "keep_both" => ResolutionAction::KeepBoth,
                other => return Err(format!("unknown resolution action `{other}`")),
            };
            Ok(Resolution {
                import_index: input.import_index as usize,
                action,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ResolutionPolicy::Explicit(resolutions))
}

fn config() -> &'static CoreConfig {
    CONFIG.get_or_init(CoreConfig::default)
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| config().resolve_db_path(&std::env::temp_dir()))
        .clone()
}

fn with_store<T>(
    f: impl FnOnce(SqliteProjectStore<'_>) -> Result<T, String>,
) -> Result<T, String> {
    let mut conn =
        open_db(resolve_db_path()).map_err(|err| format!("project DB open failed: {err}"))?;
    let store = SqliteProjectStore::try_new(&mut conn)
        .map_err(|err| format!("project store init failed: {err}"))?;
    f(store)
}
