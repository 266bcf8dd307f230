// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Revisioned local document collection
//!
//! Documents are JSON objects keyed by `_id` and carrying a `_rev`. Every
//! write must name the current revision of the document it replaces. Each
//! collection is its own sled database, either temporary or under a data
//! directory, flushed after every write. Declared indexes live in a separate
//! tree so they never show up as documents.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use sled::IVec;
use std::fs;
use std::path::Path;
use tracing::debug;

const INDEX_TREE: &str = "_indexes";

/// Stored document body with its revision
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredDoc {
    rev: String,
    body: Map<String, Value>,
}

impl StoredDoc {
    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Query options for [`DocumentStore::all_docs`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllDocsOptions {
    /// Return only the document with this id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// First id to return (inclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startkey: Option<String>,
    /// Rows to skip after `startkey`
    #[serde(default)]
    pub skip: usize,
    /// Maximum rows to return
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Attach full documents to rows
    #[serde(default)]
    pub include_docs: bool,
}

impl AllDocsOptions {
    /// Options selecting a single id
    #[must_use]
    pub fn key(id: impl Into<String>) -> Self {
        Self {
            key: Some(id.into()),
            ..Self::default()
        }
    }
}

/// Revision of a row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowValue {
    /// Current revision
    pub rev: String,
}

/// One row of an [`all_docs`](DocumentStore::all_docs) response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Document id
    pub id: String,
    /// Row key (the id)
    pub key: String,
    /// Revision info
    pub value: RowValue,
    /// Full document, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Value>,
}

/// Result of an [`all_docs`](DocumentStore::all_docs) query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllDocsResponse {
    /// Number of documents in the collection
    pub total_rows: usize,
    /// Offset of the first row
    pub offset: usize,
    /// Matching rows ordered by id
    pub rows: Vec<Row>,
}

/// Result of a successful write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutResponse {
    /// Document id
    pub id: String,
    /// New revision
    pub rev: String,
}

/// A named document collection
#[derive(Debug, Clone)]
pub struct DocumentStore {
    name: String,
    db: sled::Db,
}

impl DocumentStore {
    /// Create a collection that is discarded when dropped
    pub fn in_memory(name: impl Into<String>) -> Result<Self> {
        let db = sled::Config::new().temporary(true).flush_every_ms(None).open()?;
        Ok(Self { name: name.into(), db })
    }

    /// Open (or create) the collection stored in `<dir>/<name>`
    pub fn open(dir: &Path, name: &str) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let db = sled::Config::new()
            .path(dir.join(name))
            .flush_every_ms(None)
            .open()?;
        debug!("Opened collection {} ({} documents)", name, db.len());
        Ok(Self { name: name.to_string(), db })
    }

    /// Collection name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of documents
    #[must_use]
    pub fn len(&self) -> usize {
        self.db.len()
    }

    /// Whether the collection holds no documents
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// List documents ordered by id
    pub fn all_docs(&self, options: &AllDocsOptions) -> Result<AllDocsResponse> {
        let entries: Box<dyn Iterator<Item = sled::Result<(IVec, IVec)>>> =
            match (&options.key, &options.startkey) {
                (Some(key), _) => {
                    let found = self.db.get(key.as_bytes())?;
                    let key = IVec::from(key.as_bytes());
                    Box::new(found.map(|value| Ok((key, value))).into_iter())
                }
                (None, Some(start)) => Box::new(self.db.range(start.as_bytes()..)),
                (None, None) => Box::new(self.db.iter()),
            };

        let mut rows = Vec::new();
        for entry in entries.skip(options.skip).take(options.limit.unwrap_or(usize::MAX)) {
            let (key, value) = entry?;
            let id = String::from_utf8_lossy(&key).into_owned();
            let stored = StoredDoc::decode(&value)?;
            rows.push(Row {
                key: id.clone(),
                value: RowValue { rev: stored.rev.clone() },
                doc: options.include_docs.then(|| document(&id, &stored)),
                id,
            });
        }
        Ok(AllDocsResponse {
            total_rows: self.db.len(),
            offset: options.skip,
            rows,
        })
    }

    /// Read a document with its `_id` and `_rev`
    pub fn get(&self, id: &str) -> Result<Value> {
        let bytes = self
            .db
            .get(id.as_bytes())?
            .ok_or_else(|| Error::MissingDocument { id: id.to_string() })?;
        Ok(document(id, &StoredDoc::decode(&bytes)?))
    }

    /// Create or replace a document
    ///
    /// `doc` must carry `_id`. Replacing requires the current `_rev`;
    /// creating requires none. A failed write leaves the stored revision
    /// in place.
    pub fn put(&self, doc: Value) -> Result<PutResponse> {
        let Value::Object(mut body) = doc else {
            return Err(Error::InvalidChange("document must be an object".into()));
        };
        let id = match body.remove("_id") {
            Some(Value::String(id)) if !id.is_empty() => id,
            _ => return Err(Error::InvalidChange("document requires a string _id".into())),
        };
        let rev = body.remove("_rev").and_then(|r| r.as_str().map(String::from));

        let current = self.db.get(id.as_bytes())?;
        let current_rev = current
            .as_deref()
            .map(StoredDoc::decode)
            .transpose()?
            .map(|stored| stored.rev);
        let generation = match (current_rev, rev) {
            (Some(current), Some(rev)) if current == rev => rev_generation(&rev) + 1,
            (None, None) => 1,
            _ => return Err(Error::Conflict { id }),
        };
        let rev = next_rev(generation, &id, &body)?;
        let encoded = serde_json::to_vec(&StoredDoc { rev: rev.clone(), body })?;

        self.db
            .compare_and_swap(id.as_bytes(), current, Some(encoded))?
            .map_err(|_| Error::Conflict { id: id.clone() })?;
        self.db.flush()?;
        Ok(PutResponse { id, rev })
    }

    /// Delete a document at its current revision
    pub fn remove(&self, id: &str, rev: &str) -> Result<()> {
        let current = self
            .db
            .get(id.as_bytes())?
            .ok_or_else(|| Error::MissingDocument { id: id.to_string() })?;
        if StoredDoc::decode(&current)?.rev != rev {
            return Err(Error::Conflict { id: id.to_string() });
        }
        self.db
            .compare_and_swap(id.as_bytes(), Some(current), None::<Vec<u8>>)?
            .map_err(|_| Error::Conflict { id: id.to_string() })?;
        self.db.flush()?;
        Ok(())
    }

    /// Declare a query index over `fields`. Returns `false` when it exists.
    pub fn create_index(&self, fields: &[&str]) -> Result<bool> {
        let tree = self.db.open_tree(INDEX_TREE)?;
        let key = serde_json::to_vec(fields)?;
        let created = tree.insert(key, Vec::new())?.is_none();
        if created {
            tree.flush()?;
        }
        Ok(created)
    }

    /// Declared indexes
    pub fn indexes(&self) -> Result<Vec<Vec<String>>> {
        let tree = self.db.open_tree(INDEX_TREE)?;
        tree.iter()
            .keys()
            .map(|key| Ok(serde_json::from_slice(&key?)?))
            .collect()
    }
}

fn document(id: &str, stored: &StoredDoc) -> Value {
    let mut doc = Map::with_capacity(stored.body.len() + 2);
    doc.insert("_id".into(), Value::String(id.to_string()));
    doc.insert("_rev".into(), Value::String(stored.rev.clone()));
    doc.extend(stored.body.iter().map(|(k, v)| (k.clone(), v.clone())));
    Value::Object(doc)
}

fn rev_generation(rev: &str) -> u64 {
    rev.split_once('-')
        .and_then(|(n, _)| n.parse().ok())
        .unwrap_or(0)
}

fn next_rev(generation: u64, id: &str, body: &Map<String, Value>) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(generation.to_le_bytes());
    hasher.update(id.as_bytes());
    hasher.update(serde_json::to_vec(body)?);
    let hash = hex::encode(hasher.finalize());
    Ok(format!("{generation}-{}", &hash[..32]))
}
