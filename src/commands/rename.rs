// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Rename command - renames a stored project

use super::{Output, Session};
use anyhow::{Context, Result};
use serde_json::json;

/// Run rename command
pub async fn run(session: &Session, id: &str, name: &str, out: Output) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("A project name is required");
    }
    session
        .app
        .restore_project(id)
        .await
        .with_context(|| format!("Failed to restore project {id}"))?;
    session.app.rename_project(name).await?;
    session.settle().await?;

    if out.json {
        out.print_json(&json!({ "id": id, "name": name }))?;
    } else {
        println!("Renamed project {} to {}", out.dim(id), out.heading(name));
    }
    Ok(())
}
