// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Domain import
//!
//! Reads exported `ld+graph` dumps into a fresh project. Records are posted
//! to the store in two phases: modules first, then everything they contain.

use crate::error::{Error, Result};
use crate::store::ModelStore;
use crate::types::{NodeKind, ProjectInfo, GRAPH_CHILD_KEYS};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

/// Import type handled by [`NativeImporter`]
pub const NATIVE_IMPORT_TYPE: &str = "ld+graph";

/// An imported file with its content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFile {
    /// File name
    pub name: String,
    /// File content
    pub content: String,
    /// Media type, if known
    #[serde(default, rename = "type")]
    pub media_type: String,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    /// Last modification time, milliseconds since the epoch
    #[serde(default, rename = "lastModified")]
    pub last_modified: i64,
}

impl ContentFile {
    /// Build a content file from a name and its text
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            size: content.len() as u64,
            content,
            media_type: "application/ld+json".to_string(),
            last_modified: 0,
        }
    }
}

/// Dispatches an import to the importer for its type
pub struct DomainImporter<'a, S> {
    store: &'a S,
}

impl<'a, S: ModelStore> DomainImporter<'a, S> {
    /// Create an importer writing into `store`
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Import `files` of `import_type`. Returns the id of the created project.
    pub async fn process_import(&self, files: &[ContentFile], import_type: &str) -> Result<String> {
        match import_type {
            NATIVE_IMPORT_TYPE => NativeImporter::new(self.store).process(files).await,
            other => Err(Error::UnknownImportFormat(other.to_string())),
        }
    }
}

// =============================================================================
// Native importer
// =============================================================================

/// Import records categorized by phase
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Atoms {
    /// Module records, parents before children
    pub modules: Vec<Value>,
    /// Every other record, containers before their contents
    pub entities: Vec<Value>,
    /// Child id to immediate parent id
    pub ids: HashMap<String, String>,
}

/// Importer for native `ld+graph` dumps
pub struct NativeImporter<'a, S> {
    store: &'a S,
}

impl<'a, S: ModelStore> NativeImporter<'a, S> {
    /// Create an importer writing into `store`
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Replace the store contents with the records in `files`
    ///
    /// Nothing is rolled back when a record fails to post.
    pub async fn process(&self, files: &[ContentFile]) -> Result<String> {
        let Atoms { modules, entities, ids } = compute_atoms(files)?;

        self.store.init_store().await?;
        let project_id = self.store.add_project(ProjectInfo::default()).await?;
        debug!("Importing {} modules and {} records into {}", modules.len(), entities.len(), project_id);

        let module_posts = modules.iter().map(|record| {
            let parent = record_id(record)
                .and_then(|id| ids.get(id))
                .map_or(project_id.as_str(), String::as_str);
            self.store.post(record, parent)
        });
        try_join_all(module_posts).await?;

        let parents = entities
            .iter()
            .map(|record| {
                let id = record_id(record).unwrap_or_default();
                ids.get(id)
                    .map(String::as_str)
                    .ok_or_else(|| Error::MissingParent { id: id.to_string() })
            })
            .collect::<Result<Vec<_>>>()?;
        let entity_posts = entities
            .iter()
            .zip(parents)
            .map(|(record, parent)| self.store.post(record, parent));
        try_join_all(entity_posts).await?;

        info!("Imported {} records into project {}", modules.len() + entities.len(), project_id);
        Ok(project_id)
    }
}

/// Parse and categorize the records of every file
///
/// Each file holds a JSON array of graph documents. A document's `encodes`
/// value (an object, or the first element of an array) replaces it.
pub fn compute_atoms(files: &[ContentFile]) -> Result<Atoms> {
    let mut flat = Vec::new();
    for file in files {
        flat.extend(unwrap(file)?);
    }
    let ids = map_ids(&flat);

    let (mut modules, mut entities): (Vec<Value>, Vec<Value>) = flat
        .into_iter()
        .partition(|record| record_kind(record) == Some(NodeKind::Module));

    // Stable, so records at equal depth keep file order
    modules.sort_by_key(|record| depth(record, &ids));
    entities.sort_by_key(|record| depth(record, &ids));

    Ok(Atoms { modules, entities, ids })
}

/// Map every nested child id to the id of the node listing it
#[must_use]
pub fn map_ids(nodes: &[Value]) -> HashMap<String, String> {
    let mut result = HashMap::new();
    for node in nodes {
        collect_ids(node, &mut result);
    }
    result
}

fn collect_ids(node: &Value, result: &mut HashMap<String, String>) {
    let Some(id) = record_id(node) else {
        return;
    };
    for key in GRAPH_CHILD_KEYS {
        if let Some(Value::Array(children)) = node.get(key) {
            for child in children {
                if let Some(child_id) = record_id(child) {
                    result.insert(child_id.to_string(), id.to_string());
                }
                collect_ids(child, result);
            }
        }
    }
}

/// Top-level records of one file
fn unwrap(file: &ContentFile) -> Result<Vec<Value>> {
    let model: Value = serde_json::from_str(&file.content)
        .map_err(|e| Error::InvalidImport(format!("{}: {e}", file.name)))?;
    let Value::Array(items) = model else {
        return Err(Error::InvalidImport(format!("{}: expected a JSON array", file.name)));
    };
    Ok(items.into_iter().map(encoded).collect())
}

fn encoded(mut item: Value) -> Value {
    match item.get_mut("encodes").map(Value::take) {
        Some(Value::Array(mut encodes)) if !encodes.is_empty() => encodes.swap_remove(0),
        Some(object @ Value::Object(_)) => object,
        _ => item,
    }
}

fn record_id(record: &Value) -> Option<&str> {
    record.get("@id").and_then(Value::as_str)
}

fn record_kind(record: &Value) -> Option<NodeKind> {
    match record.get("@type")? {
        Value::String(marker) => NodeKind::from_type_marker(marker),
        Value::Array(markers) => markers
            .iter()
            .filter_map(Value::as_str)
            .find_map(NodeKind::from_type_marker),
        _ => None,
    }
}

/// Number of mapped ancestors, bounded against cyclic dumps
fn depth(record: &Value, ids: &HashMap<String, String>) -> usize {
    let mut depth = 0;
    let mut current = record_id(record);
    while let Some(parent) = current.and_then(|id| ids.get(id)) {
        depth += 1;
        if depth > ids.len() {
            break;
        }
        current = Some(parent.as_str());
    }
    depth
}
