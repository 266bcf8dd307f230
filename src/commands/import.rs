// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Import command - loads exported graph dumps into a new project

use super::{Output, Session};
use crate::import::ContentFile;
use anyhow::{Context, Result};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::debug;
use walkdir::WalkDir;

/// Run import command
pub async fn run(session: &Session, paths: &[PathBuf], import_type: Option<&str>, out: Output) -> Result<()> {
    let files = collect(paths)?;
    if files.is_empty() {
        anyhow::bail!("No .json files found to import");
    }
    let import_type = import_type.unwrap_or(&session.config.import_type);

    let id = session.app.import_files(&files, import_type).await?;
    session.settle().await?;

    let state = session.app.state();
    if out.json {
        out.print_json(&json!({
            "id": id,
            "files": files.len(),
            "rootModule": state.root_module_id,
        }))?;
    } else {
        println!("Imported {} file(s) into project {}", files.len(), out.heading(&id));
        if let Some(root) = state.root {
            println!("  root module: {}", root.node.name.as_deref().unwrap_or(root.id()));
        }
    }
    Ok(())
}

/// Read every file named, walking directories for `.json` files
pub fn collect(paths: &[PathBuf]) -> Result<Vec<ContentFile>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
                let is_json = entry.path().extension().is_some_and(|ext| ext == "json");
                if entry.file_type().is_file() && is_json {
                    files.push(read(entry.path())?);
                }
            }
        } else {
            files.push(read(path)?);
        }
    }
    Ok(files)
}

fn read(path: &Path) -> Result<ContentFile> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let metadata = fs::metadata(path).with_context(|| format!("Failed to stat {}", path.display()))?;
    let last_modified = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .and_then(|d| i64::try_from(d.as_millis()).ok())
        .unwrap_or_default();
    debug!("Read {} ({} bytes)", path.display(), metadata.len());

    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    Ok(ContentFile {
        size: metadata.len(),
        last_modified,
        ..ContentFile::new(name, content)
    })
}
