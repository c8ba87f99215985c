use super::ExportError;
use crate::bundle::ExportBundle;
use crate::model::project::Project;
use crate::repo::ProjectStore;
use log::info;

/// Renders a project as a self-contained `{version, project}` document.
pub fn render_json(project: &Project) -> Result<String, ExportError> {
    Ok(ExportBundle::new(project).to_json()?)
}

/// Loads a project with hydrated images and renders it.
pub fn export_json<S: ProjectStore>(store: &S, project_id: &str) -> Result<String, ExportError> {
    let project = store
        .load_project(project_id, true)?
        .ok_or_else(|| ExportError::ProjectNotFound(project_id.to_string()))?;
    let json = render_json(&project)?;
    info!(
        "event=export_json module=export status=ok project_id={} bytes={}",
        project_id,
        json.len()
    );
    Ok(json)
}
