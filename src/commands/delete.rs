// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Delete command - removes a stored project

use super::{Output, Session};
use anyhow::{Context, Result};
use serde_json::json;

/// Run delete command
pub async fn run(session: &Session, id: &str, out: Output) -> Result<()> {
    session
        .app
        .persistence()
        .delete_project(id)
        .await
        .with_context(|| format!("Failed to delete project {id}"))?;

    if out.json {
        out.print_json(&json!({ "id": id, "deleted": true }))?;
    } else {
        println!("Deleted project {}", out.dim(id));
    }
    Ok(())
}
