//! Command-line driver for pinmap projects.
//!
//! # Responsibility
//! - List, create, import and export projects against a local database.
//! - Keep all business rules in `pinmap_core`; this binary only maps
//!   arguments to core calls.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use pinmap_core::db::open_db;
use pinmap_core::{
    export_csv, export_json, init_logging_from_config, CoreConfig, ImportMode, ImportService,
    ProjectService, ProjectStore, ProjectType, ResolutionPolicy, SqliteProjectStore,
};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pinmap", version, about = "Manage pinned-note map and board projects")]
struct Cli {
    /// Database file; overrides config and PINMAP_DB_PATH.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// JSON config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List stored projects.
    List,
    /// Create an empty project.
    Create {
        #[arg(long)]
        name: String,
        /// `map` or `image`.
        #[arg(long = "type", default_value = "map")]
        kind: String,
    },
    /// Import a project file as a new project, or merge it into an existing one.
    Import {
        file: PathBuf,
        /// Merge into this project instead of creating a new one.
        #[arg(long)]
        into: Option<String>,
    },
    /// Write the full JSON export of a project.
    ExportJson { project_id: String, out: PathBuf },
    /// Write the CSV note listing of a project.
    ExportCsv { project_id: String, out: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => CoreConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CoreConfig::default(),
    };
    if let Err(err) = init_logging_from_config(&config) {
        bail!("logging setup failed: {err}");
    }

    let db_path = match cli.db {
        Some(path) => path,
        None => config.resolve_db_path(&std::env::current_dir()?),
    };
    let mut conn =
        open_db(&db_path).with_context(|| format!("opening database {}", db_path.display()))?;
    let store = SqliteProjectStore::try_new(&mut conn)?;
    info!("event=cli_start module=cli status=ok db={}", db_path.display());

    match cli.command {
        Command::List => {
            for item in store.list_projects()? {
                println!(
                    "{}\t{}\t{}\t{} note(s)",
                    item.id,
                    item.kind.as_str(),
                    item.name,
                    item.note_count
                );
            }
        }
        Command::Create { name, kind } => {
            let Some(kind) = ProjectType::parse(&kind) else {
                bail!("unknown project type `{kind}`; expected map or image");
            };
            let project = ProjectService::new(store).create_project(&name, kind, None)?;
            println!("{}", project.id);
        }
        Command::Import { file, into } => {
            let bytes = fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let mode = if into.is_some() {
                ImportMode::MergeIntoCurrent
            } else {
                ImportMode::CreateNew
            };
            let outcome = ImportService::new(store)
                .with_compression(config.image_compression.options())
                .import(&bytes, mode, into.as_deref(), ResolutionPolicy::Automatic)?;
            println!("{}", outcome.project.id);
            println!("{}", outcome.message);
        }
        Command::ExportJson { project_id, out } => {
            let json = export_json(&store, &project_id)?;
            fs::write(&out, json).with_context(|| format!("writing {}", out.display()))?;
        }
        Command::ExportCsv { project_id, out } => {
            let csv = export_csv(&store, &project_id)?;
            fs::write(&out, csv).with_context(|| format!("writing {}", out.display()))?;
        }
    }
    Ok(())
}
