// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Offline persistence mirror
//!
//! Snapshots the domain store into a local document collection whenever a
//! domain event arrives, and keeps a second collection of `{ name, time }`
//! entries used to list recent projects.

pub mod document;

pub use document::{AllDocsOptions, AllDocsResponse, DocumentStore};

use crate::error::{Error, Result};
use crate::events::{BusEvent, EventBus, Listener};
use crate::store::ModelStore;
use crate::types::{Node, NodeKind};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Snapshot collection name
pub const PROJECTS_COLLECTION: &str = "offline-domain-project";
/// Recent-projects index collection name
pub const INDEX_COLLECTION: &str = "offline-domain-project-index";
/// Default page size of [`StorePersistence::recent`]
pub const DEFAULT_RECENT_LIMIT: usize = 25;

/// Paging options for [`StorePersistence::recent`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentQuery {
    /// Page size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Id to continue from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startkey: Option<String>,
    /// Rows to skip after `startkey`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<usize>,
}

/// An entry of the recent-projects index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentProject {
    /// Project id
    #[serde(rename = "_id")]
    pub id: String,
    /// Document revision
    #[serde(rename = "_rev")]
    pub rev: String,
    /// Project name, if it has one
    #[serde(default)]
    pub name: Option<String>,
    /// Last save, milliseconds since the epoch
    pub time: i64,
}

/// A page of recent projects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentPage {
    /// Projects on this page
    pub items: Vec<RecentProject>,
    /// Options that fetch the next page
    pub options: RecentQuery,
}

/// Mirrors the domain store into the local collections
pub struct StorePersistence<S> {
    store: S,
    bus: EventBus,
    listener: Arc<Listener>,
    projects: Arc<Mutex<DocumentStore>>,
    index: Arc<Mutex<DocumentStore>>,
    page_size: usize,
}

impl<S: Clone> Clone for StorePersistence<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            bus: self.bus.clone(),
            listener: Arc::clone(&self.listener),
            projects: Arc::clone(&self.projects),
            index: Arc::clone(&self.index),
            page_size: self.page_size,
        }
    }
}

impl<S: ModelStore> StorePersistence<S> {
    /// Mirror `store` into the given collections
    pub fn new(store: S, bus: EventBus, projects: DocumentStore, index: DocumentStore) -> Self {
        Self {
            store,
            listener: Arc::new(Listener::new(bus.clone())),
            bus,
            projects: Arc::new(Mutex::new(projects)),
            index: Arc::new(Mutex::new(index)),
            page_size: DEFAULT_RECENT_LIMIT,
        }
    }

    /// Mirror `store` into collections kept in memory
    pub fn in_memory(store: S, bus: EventBus) -> Result<Self> {
        let projects = DocumentStore::in_memory(PROJECTS_COLLECTION)?;
        let index = DocumentStore::in_memory(INDEX_COLLECTION)?;
        Ok(Self::new(store, bus, projects, index))
    }

    /// Mirror `store` into collections under `dir`
    pub fn open(store: S, bus: EventBus, dir: &Path) -> Result<Self> {
        let projects = DocumentStore::open(dir, PROJECTS_COLLECTION)?;
        let index = DocumentStore::open(dir, INDEX_COLLECTION)?;
        Ok(Self::new(store, bus, projects, index))
    }

    /// Set the default page size of [`recent`](Self::recent)
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// The mirrored store
    pub fn store(&self) -> &S {
        &self.store
    }

    // =========================================================================
    // Event handling
    // =========================================================================

    /// Start mirroring domain events. Returns `false` when already listening.
    pub async fn listen(&self) -> bool {
        self.listener.listen().await
    }

    /// Stop mirroring domain events
    pub fn unlisten(&self) {
        self.listener.unlisten();
    }

    /// Whether domain events are being mirrored
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.listener.is_listening()
    }

    /// Mirror events until unlistened
    pub async fn run(&self) {
        while let Some(event) = self.listener.next().await {
            self.handle(&event).await;
        }
        debug!("Persistence loop stopped");
    }

    /// Mirror every event already published. Returns how many were seen.
    pub async fn drain(&self) -> usize {
        let mut seen = 0;
        while let Some(event) = self.listener.try_next().await {
            self.handle(&event).await;
            seen += 1;
        }
        seen
    }

    async fn handle(&self, event: &BusEvent) {
        if let BusEvent::Domain(domain) = event {
            debug!("Snapshot after {}", domain.event_type());
            if let Err(e) = self.store_state().await {
                error!("Failed to store project state: {}", e);
                self.bus.report(&e);
            }
        }
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Snapshot the current project into both collections
    pub async fn store_state(&self) -> Result<()> {
        let Some(project) = self.store.current_project().await? else {
            debug!("No project to store");
            return Ok(());
        };
        let data = self.store.retrieve_store().await?;
        let time = Utc::now().timestamp_millis();

        {
            let projects = self.projects.lock().await;
            upsert(&projects, &project.id, json!({ "data": data, "time": time }))?;
        }
        {
            let index = self.index.lock().await;
            index.create_index(&["name", "time"])?;
            upsert(&index, &project.id, json!({ "name": project.name, "time": time }))?;
        }
        info!("Stored project {}", project.id);
        Ok(())
    }

    /// List recently stored projects, one page at a time
    pub async fn recent(&self, query: RecentQuery) -> Result<RecentPage> {
        let mut options = query;
        let limit = *options.limit.get_or_insert(self.page_size);
        let response = self.index.lock().await.all_docs(&AllDocsOptions {
            key: None,
            startkey: options.startkey.clone(),
            skip: options.skip.unwrap_or(0),
            limit: Some(limit),
            include_docs: true,
        })?;

        let mut items = Vec::with_capacity(response.rows.len());
        if let Some(last) = response.rows.last() {
            options.startkey = Some(last.id.clone());
            options.skip = Some(1);
        }
        for row in response.rows {
            if row.key.starts_with("_design") {
                continue;
            }
            if let Some(doc) = row.doc {
                items.push(serde_json::from_value(doc)?);
            }
        }
        Ok(RecentPage { items, options })
    }

    /// Replace the store contents with a stored snapshot
    pub async fn restore(&self, id: &str) -> Result<Node> {
        self.reset_store().await?;
        let doc = self.projects.lock().await.get(id)?;
        let data = doc.get("data").cloned().unwrap_or(Value::Null);
        self.store.load_store(data).await?;
        let project = self
            .store
            .current_project()
            .await?
            .ok_or_else(|| Error::NotFound { kind: NodeKind::Project, id: id.to_string() })?;
        info!("Restored project {}", project.id);
        Ok(project)
    }

    /// Empty the domain store
    pub async fn reset_store(&self) -> Result<()> {
        self.store.init_store().await
    }

    /// Remove a project from both collections
    ///
    /// The snapshot is removed best-effort; a missing index entry is an error.
    pub async fn delete_project(&self, id: &str) -> Result<()> {
        {
            let projects = self.projects.lock().await;
            if let Some(rev) = current_rev(&projects, id) {
                if let Err(e) = projects.remove(id, &rev) {
                    debug!("Snapshot of {} not removed: {}", id, e);
                }
            }
        }
        let index = self.index.lock().await;
        let rev = current_rev(&index, id).ok_or_else(|| Error::MissingDocument { id: id.to_string() })?;
        index.remove(id, &rev)?;
        info!("Deleted project {}", id);
        Ok(())
    }
}

/// Current revision of `id`; a failed read counts as no revision
fn current_rev(collection: &DocumentStore, id: &str) -> Option<String> {
    collection
        .all_docs(&AllDocsOptions::key(id))
        .ok()?
        .rows
        .into_iter()
        .next()
        .map(|row| row.value.rev)
}

/// Write `body` as document `id`, replacing whatever revision is current
fn upsert(collection: &DocumentStore, id: &str, mut body: Value) -> Result<()> {
    if let Value::Object(fields) = &mut body {
        fields.insert("_id".into(), Value::String(id.to_string()));
        if let Some(rev) = current_rev(collection, id) {
            fields.insert("_rev".into(), Value::String(rev));
        }
    }
    collection.put(body)?;
    Ok(())
}
