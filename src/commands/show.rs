// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Show command - restores a stored project and prints its root module

use super::{Output, Session};
use crate::types::{Node, NodeKind};
use anyhow::{Context, Result};
use serde_json::json;

/// Run show command
pub async fn run(session: &Session, id: &str, out: Output) -> Result<()> {
    session
        .app
        .restore_project(id)
        .await
        .with_context(|| format!("Failed to restore project {id}"))?;
    session.settle().await?;
    let state = session.app.state();

    let names = |nodes: &[Node]| -> Vec<String> { nodes.iter().map(label).collect() };
    let root = state.root.as_ref();
    let modules = root.map(|r| names(r.children(NodeKind::Module))).unwrap_or_default();
    let data_models = root.map(|r| names(r.children(NodeKind::DataModel))).unwrap_or_default();

    if out.json {
        return out.print_json(&json!({
            "id": id,
            "name": state.project_name(),
            "rootModule": root.map(|r| r.id()),
            "modules": modules,
            "dataModels": data_models,
        }));
    }

    println!("{} {}", out.heading(&state.project_name()), out.dim(id));
    match root {
        Some(root) => {
            println!("  {}", label(&root.node));
            for module in &modules {
                println!("    module: {module}");
            }
            for model in &data_models {
                println!("    data model: {model}");
            }
        }
        None => println!("  (no root module)"),
    }
    Ok(())
}

fn label(node: &Node) -> String {
    node.name.clone().unwrap_or_else(|| node.id.clone())
}
