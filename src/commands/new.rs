// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! New command - creates an empty project with a root module

use super::{Output, Session};
use anyhow::Result;
use serde_json::json;

/// Run new command
pub async fn run(session: &Session, name: &str, description: Option<&str>, out: Output) -> Result<()> {
    if name.trim().is_empty() {
        anyhow::bail!("A project name is required");
    }
    let id = session
        .app
        .create_project(name.trim(), description)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Project was not created"))?;
    session.settle().await?;

    if out.json {
        out.print_json(&json!({ "id": id, "name": name.trim() }))?;
    } else {
        println!("Created project {}", out.heading(name.trim()));
        println!("  id: {}", out.dim(&id));
    }
    Ok(())
}
