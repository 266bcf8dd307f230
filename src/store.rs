// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Domain store client contract and the in-memory graph store
//!
//! The store is the single source of change notifications: every successful
//! mutation of a module, data model, entity, attribute or association
//! publishes exactly one [`DomainEvent`] on the bus. Callers never re-emit.

use crate::error::{Error, Result};
use crate::events::{DomainEvent, EventBus};
use crate::types::{Change, ChangeOp, ElementInfo, Node, NodeKind, ProjectInfo, GRAPH_CHILD_KEYS};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Async request/response facade over the domain graph
///
/// Kind-specific operations (`getModule`, `removeEntity`, `patchAttribute`,
/// ...) are the generic operations with a [`NodeKind`] argument.
#[allow(async_fn_in_trait)]
pub trait ModelStore {
    /// Empty the store
    async fn init_store(&self) -> Result<()>;

    /// Create the project. Returns its id.
    async fn add_project(&self, info: ProjectInfo) -> Result<String>;

    /// Create an element of `kind` under `parent`. Returns its id.
    async fn add(&self, kind: NodeKind, parent: &str, info: ElementInfo) -> Result<String>;

    /// Read a record
    async fn read(&self, kind: NodeKind, id: &str) -> Result<Node>;

    /// Remove a record and everything below it
    async fn remove(&self, kind: NodeKind, id: &str) -> Result<()>;

    /// Apply an editor changelog to a record
    async fn patch(&self, kind: NodeKind, changelog: &[Change], id: &str, parent: Option<&str>) -> Result<()>;

    /// Store the view-layout payload of a record
    async fn store_view_model(&self, id: &str, kind: NodeKind, view: Value, parent: Option<&str>) -> Result<()>;

    /// Insert an exported graph record and its nested records under `parent`,
    /// keeping their ids. Returns the record id.
    async fn post(&self, record: &Value, parent: &str) -> Result<String>;

    /// The project currently held by the store
    async fn current_project(&self) -> Result<Option<Node>>;

    /// Opaque snapshot of the whole store
    async fn retrieve_store(&self) -> Result<Value>;

    /// Replace the store contents with a snapshot
    async fn load_store(&self, data: Value) -> Result<()>;

    /// Read a project
    async fn get_project(&self, id: &str) -> Result<Node> {
        self.read(NodeKind::Project, id).await
    }

    /// Read a module
    async fn get_module(&self, id: &str) -> Result<Node> {
        self.read(NodeKind::Module, id).await
    }

    /// Create a module under a project or module
    async fn add_module(&self, parent: &str, info: ElementInfo) -> Result<String> {
        self.add(NodeKind::Module, parent, info).await
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// Serialized store contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Graph {
    /// Current project id
    #[serde(default)]
    project: Option<String>,
    /// All records by id
    #[serde(default)]
    nodes: BTreeMap<String, Node>,
}

impl Graph {
    fn node(&self, kind: NodeKind, id: &str) -> Result<&Node> {
        self.nodes
            .get(id)
            .filter(|n| n.kind == kind)
            .ok_or_else(|| Error::NotFound { kind, id: id.to_string() })
    }

    /// Ids of `id` and everything nested below it, each once
    fn subtree(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(node) = self.nodes.get(&current) {
                stack.extend(node.all_children().cloned());
            }
            out.push(current);
        }
        out
    }

    /// Whether `id` is `node` or one of its enclosing nodes
    fn encloses(&self, id: &str, node: &str) -> bool {
        let mut seen = HashSet::new();
        let mut current = Some(node);
        while let Some(at) = current {
            if at == id {
                return true;
            }
            if !seen.insert(at) {
                return false;
            }
            current = self.nodes.get(at).and_then(|n| n.parent.as_deref());
        }
        false
    }

    /// Link `id` into its parent's child list for `kind`
    fn attach(&mut self, parent: &str, kind: NodeKind, id: &str) -> Result<()> {
        let parent_node = self
            .nodes
            .get_mut(parent)
            .ok_or_else(|| Error::MissingParent { id: id.to_string() })?;
        let parent_kind = parent_node.kind;
        let children = parent_node.children_mut(kind).ok_or_else(|| {
            Error::InvalidChange(format!("a {parent_kind} cannot contain a {kind}"))
        })?;
        if !children.iter().any(|c| c == id) {
            children.push(id.to_string());
        }
        Ok(())
    }

    /// Insert one exported record and, recursively, its nested records
    ///
    /// A nested record without `@type` takes the kind its list implies.
    fn insert_record(
        &mut self,
        record: &Value,
        parent: &str,
        implied: Option<NodeKind>,
    ) -> Result<(NodeKind, String)> {
        let obj = record
            .as_object()
            .ok_or_else(|| Error::InvalidImport("graph record is not an object".into()))?;
        let id = obj
            .get("@id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidImport("graph record without @id".into()))?
            .to_string();
        let kind = record_kind(obj)
            .or(implied)
            .ok_or_else(|| Error::InvalidImport(format!("record {id} has no known @type")))?;

        if self.encloses(&id, parent) {
            return Err(Error::InvalidImport(format!("record {id} is nested inside itself")));
        }
        self.attach(parent, kind, &id)?;

        let mut node = self
            .nodes
            .remove(&id)
            .unwrap_or_else(|| Node::new(id.clone(), kind));
        node.kind = kind;
        node.parent = Some(parent.to_string());
        if let Some(name) = obj.get("name").and_then(literal) {
            node.name = Some(name);
        }
        if let Some(description) = obj.get("description").and_then(literal) {
            node.description = Some(description);
        }
        if let Some(target) = obj.get("target").and_then(link) {
            node.target = Some(target);
        }
        self.nodes.insert(id.clone(), node);

        for key in GRAPH_CHILD_KEYS {
            if let Some(Value::Array(children)) = obj.get(key) {
                for child in children {
                    self.insert_record(child, &id, kind_of_list(key))?;
                }
            }
        }
        Ok((kind, id))
    }
}

/// Kind of the records held in a nested graph list
fn kind_of_list(key: &str) -> Option<NodeKind> {
    match key {
        "modules" => Some(NodeKind::Module),
        "dataModels" => Some(NodeKind::DataModel),
        "entities" => Some(NodeKind::Entity),
        "attributes" => Some(NodeKind::Attribute),
        "associations" => Some(NodeKind::Association),
        _ => None,
    }
}

/// First recognized type marker of an exported record
fn record_kind(obj: &Map<String, Value>) -> Option<NodeKind> {
    match obj.get("@type")? {
        Value::String(marker) => NodeKind::from_type_marker(marker),
        Value::Array(markers) => markers
            .iter()
            .filter_map(Value::as_str)
            .find_map(NodeKind::from_type_marker),
        _ => None,
    }
}

/// Scalar text of a literal: `"x"`, `{"@value": "x"}` or `[{"@value": "x"}]`
fn literal(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(o) => o.get("@value").and_then(literal),
        Value::Array(items) => items.first().and_then(literal),
        _ => None,
    }
}

/// Referenced id of a link: `"id"`, `{"@id": "id"}` or `[{"@id": "id"}]`
fn link(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(o) => o.get("@id").and_then(Value::as_str).map(String::from),
        Value::Array(items) => items.first().and_then(link),
        _ => None,
    }
}

/// Apply one changelog entry to a node
fn apply_change(node: &mut Node, change: &Change) -> Result<()> {
    let field = change.path.trim_start_matches('/');
    if field.is_empty() {
        return Err(Error::InvalidChange(format!("empty path in change for {}", node.id)));
    }
    let value = match change.op {
        ChangeOp::Remove => None,
        ChangeOp::Add | ChangeOp::Replace => Some(
            change
                .value
                .clone()
                .ok_or_else(|| Error::InvalidChange(format!("{} requires a value", change.path)))?,
        ),
    };
    match field {
        "name" | "description" | "target" => {
            let text = match value {
                None => None,
                Some(Value::String(s)) => Some(s),
                Some(_) => {
                    return Err(Error::InvalidChange(format!("{} must be a string", change.path)));
                }
            };
            match field {
                "name" => node.name = text,
                "description" => node.description = text,
                _ => node.target = text,
            }
        }
        other => match value {
            Some(value) => {
                node.properties.insert(other.to_string(), value);
            }
            None => {
                node.properties.remove(other);
            }
        },
    }
    Ok(())
}

/// Graph store kept in memory, publishing change notifications on the bus
///
/// Cloning gives another handle to the same store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    graph: Arc<Mutex<Graph>>,
    bus: EventBus,
    sequence: Arc<AtomicU64>,
}

impl MemoryStore {
    /// Create an empty store publishing on `bus`
    #[must_use]
    pub fn new(bus: EventBus) -> Self {
        Self {
            graph: Arc::new(Mutex::new(Graph::default())),
            bus,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Generate a fresh record id
    fn generate_id(&self, kind: NodeKind, parent: &str) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let mut hasher = Sha256::new();
        hasher.update(kind.type_marker().as_bytes());
        hasher.update(parent.as_bytes());
        hasher.update(Utc::now().to_rfc3339().as_bytes());
        hasher.update(seq.to_le_bytes());
        let hash = hex::encode(hasher.finalize());
        format!("amf://id#{}", &hash[..12])
    }

    /// Number of records held
    pub async fn len(&self) -> usize {
        self.graph.lock().await.nodes.len()
    }

    /// Whether the store holds nothing
    pub async fn is_empty(&self) -> bool {
        self.graph.lock().await.nodes.is_empty()
    }
}

impl ModelStore for MemoryStore {
    async fn init_store(&self) -> Result<()> {
        let mut graph = self.graph.lock().await;
        *graph = Graph::default();
        debug!("Store initialised");
        Ok(())
    }

    async fn add_project(&self, info: ProjectInfo) -> Result<String> {
        let id = self.generate_id(NodeKind::Project, "");
        let mut graph = self.graph.lock().await;
        if let Some(existing) = &graph.project {
            return Err(Error::InvalidChange(format!(
                "store already holds project {existing}; initialise it first"
            )));
        }
        let mut project = Node::new(id.clone(), NodeKind::Project);
        project.name = info.name;
        project.description = info.description;
        graph.nodes.insert(id.clone(), project);
        graph.project = Some(id.clone());
        debug!("Project {} created", id);
        Ok(id)
    }

    async fn add(&self, kind: NodeKind, parent: &str, info: ElementInfo) -> Result<String> {
        if kind == NodeKind::Project {
            return Err(Error::InvalidChange("projects are created with add_project".into()));
        }
        let id = self.generate_id(kind, parent);
        {
            let mut graph = self.graph.lock().await;
            if !graph.nodes.contains_key(parent) {
                return Err(Error::MissingParent { id: parent.to_string() });
            }
            graph.attach(parent, kind, &id)?;
            let mut node = Node::new(id.clone(), kind).with_parent(parent);
            node.name = info.name;
            node.description = info.description;
            node.target = info.target;
            graph.nodes.insert(id.clone(), node);
        }
        self.bus.publish(DomainEvent::created(kind, id.clone(), Some(parent.to_string())));
        Ok(id)
    }

    async fn read(&self, kind: NodeKind, id: &str) -> Result<Node> {
        let graph = self.graph.lock().await;
        graph.node(kind, id).cloned()
    }

    async fn remove(&self, kind: NodeKind, id: &str) -> Result<()> {
        let parent = {
            let mut graph = self.graph.lock().await;
            let parent = graph.node(kind, id)?.parent.clone();
            for removed in graph.subtree(id) {
                graph.nodes.remove(&removed);
            }
            if let Some(parent_node) = parent.as_ref().and_then(|p| graph.nodes.get_mut(p)) {
                if let Some(children) = parent_node.children_mut(kind) {
                    children.retain(|c| c != id);
                }
            }
            if graph.project.as_deref() == Some(id) {
                graph.project = None;
            }
            parent
        };
        if kind != NodeKind::Project {
            self.bus.publish(DomainEvent::deleted(kind, id, parent));
        }
        Ok(())
    }

    async fn patch(&self, kind: NodeKind, changelog: &[Change], id: &str, parent: Option<&str>) -> Result<()> {
        let stored_parent = {
            let mut graph = self.graph.lock().await;
            graph.node(kind, id)?;
            let node = graph
                .nodes
                .get_mut(id)
                .ok_or_else(|| Error::NotFound { kind, id: id.to_string() })?;
            for change in changelog {
                apply_change(node, change)?;
            }
            node.parent.clone()
        };
        if kind != NodeKind::Project {
            let parent = parent.map(String::from).or(stored_parent);
            self.bus.publish(DomainEvent::updated(kind, id, parent));
        }
        Ok(())
    }

    async fn store_view_model(&self, id: &str, kind: NodeKind, view: Value, parent: Option<&str>) -> Result<()> {
        let stored_parent = {
            let mut graph = self.graph.lock().await;
            graph.node(kind, id)?;
            let node = graph
                .nodes
                .get_mut(id)
                .ok_or_else(|| Error::NotFound { kind, id: id.to_string() })?;
            node.view = Some(view);
            node.parent.clone()
        };
        let parent = parent.map(String::from).or(stored_parent);
        self.bus.publish(DomainEvent::updated(kind, id, parent));
        Ok(())
    }

    async fn post(&self, record: &Value, parent: &str) -> Result<String> {
        let (kind, id) = {
            let mut graph = self.graph.lock().await;
            graph.insert_record(record, parent, None)?
        };
        self.bus.publish(DomainEvent::created(kind, id.clone(), Some(parent.to_string())));
        Ok(id)
    }

    async fn current_project(&self) -> Result<Option<Node>> {
        let graph = self.graph.lock().await;
        Ok(graph
            .project
            .as_ref()
            .and_then(|id| graph.nodes.get(id))
            .cloned())
    }

    async fn retrieve_store(&self) -> Result<Value> {
        let graph = self.graph.lock().await;
        Ok(serde_json::to_value(&*graph)?)
    }

    async fn load_store(&self, data: Value) -> Result<()> {
        let loaded: Graph = serde_json::from_value(data)?;
        let mut graph = self.graph.lock().await;
        *graph = loaded;
        Ok(())
    }
}

/// Store wrappers used by unit tests across the crate
#[cfg(test)]
pub(crate) mod test_support {
    use super::{MemoryStore, ModelStore};
    use crate::error::Result;
    use crate::types::{Change, ElementInfo, Node, NodeKind, ProjectInfo};
    use serde_json::Value;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Delegating store that counts reads and can slow some of them down
    #[derive(Clone)]
    pub(crate) struct InstrumentedStore {
        pub(crate) inner: MemoryStore,
        reads: Arc<AtomicUsize>,
        slow: Arc<HashSet<String>>,
        delay: Duration,
    }

    impl InstrumentedStore {
        pub(crate) fn new(inner: MemoryStore) -> Self {
            Self {
                inner,
                reads: Arc::new(AtomicUsize::new(0)),
                slow: Arc::new(HashSet::new()),
                delay: Duration::ZERO,
            }
        }

        pub(crate) fn with_slow_reads(mut self, ids: &[&str], delay: Duration) -> Self {
            self.slow = Arc::new(ids.iter().map(|s| (*s).to_string()).collect());
            self.delay = delay;
            self
        }

        pub(crate) fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl ModelStore for InstrumentedStore {
        async fn init_store(&self) -> Result<()> {
            self.inner.init_store().await
        }
        async fn add_project(&self, info: ProjectInfo) -> Result<String> {
            self.inner.add_project(info).await
        }
        async fn add(&self, kind: NodeKind, parent: &str, info: ElementInfo) -> Result<String> {
            self.inner.add(kind, parent, info).await
        }
        async fn read(&self, kind: NodeKind, id: &str) -> Result<Node> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.slow.contains(id) {
                tokio::time::sleep(self.delay).await;
            }
            self.inner.read(kind, id).await
        }
        async fn remove(&self, kind: NodeKind, id: &str) -> Result<()> {
            self.inner.remove(kind, id).await
        }
        async fn patch(&self, kind: NodeKind, changelog: &[Change], id: &str, parent: Option<&str>) -> Result<()> {
            self.inner.patch(kind, changelog, id, parent).await
        }
        async fn store_view_model(&self, id: &str, kind: NodeKind, view: Value, parent: Option<&str>) -> Result<()> {
            self.inner.store_view_model(id, kind, view, parent).await
        }
        async fn post(&self, record: &Value, parent: &str) -> Result<String> {
            self.inner.post(record, parent).await
        }
        async fn current_project(&self) -> Result<Option<Node>> {
            self.inner.current_project().await
        }
        async fn retrieve_store(&self) -> Result<Value> {
            self.inner.retrieve_store().await
        }
        async fn load_store(&self, data: Value) -> Result<()> {
            self.inner.load_store(data).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BusEvent, ChangeKind};
    use serde_json::json;

    async fn project_with_root(store: &MemoryStore) -> (String, String) {
        let pid = store
            .add_project(ProjectInfo { name: Some("Shop".into()), description: None })
            .await
            .unwrap();
        let root = store.add_module(&pid, ElementInfo::named("root module")).await.unwrap();
        (pid, root)
    }

    #[tokio::test]
    async fn test_add_links_parent_and_publishes() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let store = MemoryStore::new(bus);
        let (pid, root) = project_with_root(&store).await;

        let project = store.get_project(&pid).await.unwrap();
        assert_eq!(project.modules, vec![root.clone()]);

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            BusEvent::Domain(DomainEvent::created(NodeKind::Module, root, Some(pid)))
        );
    }

    #[tokio::test]
    async fn test_add_rejects_wrong_parent_kind() {
        let store = MemoryStore::new(EventBus::new());
        let (pid, _) = project_with_root(&store).await;

        let err = store
            .add(NodeKind::Entity, &pid, ElementInfo::named("Order"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidChange(_)));
    }

    #[tokio::test]
    async fn test_remove_drops_subtree() {
        let store = MemoryStore::new(EventBus::new());
        let (_, root) = project_with_root(&store).await;
        let dm = store.add(NodeKind::DataModel, &root, ElementInfo::named("Sales")).await.unwrap();
        let entity = store.add(NodeKind::Entity, &dm, ElementInfo::named("Order")).await.unwrap();

        store.remove(NodeKind::DataModel, &dm).await.unwrap();

        assert!(store.read(NodeKind::Entity, &entity).await.is_err());
        assert!(store.get_module(&root).await.unwrap().data_models.is_empty());
    }

    #[tokio::test]
    async fn test_patch_applies_changelog() {
        let bus = EventBus::new();
        let store = MemoryStore::new(bus.clone());
        let (_, root) = project_with_root(&store).await;
        let mut rx = bus.subscribe();

        let changes = vec![
            Change::replace("/name", "Core"),
            Change::replace("/customDomainProperties", json!(["x"])),
        ];
        store.patch(NodeKind::Module, &changes, &root, None).await.unwrap();

        let module = store.get_module(&root).await.unwrap();
        assert_eq!(module.name.as_deref(), Some("Core"));
        assert_eq!(module.properties.get("customDomainProperties"), Some(&json!(["x"])));
        match rx.recv().await.unwrap() {
            BusEvent::Domain(e) => assert_eq!(e.change, ChangeKind::Updated),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_post_keeps_ids_and_nests() {
        let store = MemoryStore::new(EventBus::new());
        let pid = store.add_project(ProjectInfo::default()).await.unwrap();
        let record = json!({
            "@id": "m1",
            "@type": ["http://a.ml/vocabularies/modularity#Module"],
            "name": [{"@value": "Imported"}],
            "dataModels": [{
                "@id": "dm1",
                "@type": "DataModel",
                "entities": [{"@id": "e1", "@type": "Entity", "name": "Order"}]
            }]
        });

        let id = store.post(&record, &pid).await.unwrap();

        assert_eq!(id, "m1");
        let module = store.get_module("m1").await.unwrap();
        assert_eq!(module.name.as_deref(), Some("Imported"));
        assert_eq!(module.data_models, vec!["dm1".to_string()]);
        let entity = store.read(NodeKind::Entity, "e1").await.unwrap();
        assert_eq!(entity.parent.as_deref(), Some("dm1"));
    }

    #[tokio::test]
    async fn test_post_rejects_record_nested_in_itself() {
        let store = MemoryStore::new(EventBus::new());
        let pid = store.add_project(ProjectInfo::default()).await.unwrap();
        let record = json!({
            "@id": "top",
            "@type": "Module",
            "modules": [{ "@id": "m1", "modules": [{ "@id": "m1" }] }]
        });
        let err = store.post(&record, &pid).await.unwrap_err();
        assert!(matches!(err, Error::InvalidImport(_)));

        store.post(&json!({ "@id": "a", "@type": "Module", "modules": [{ "@id": "b" }] }), &pid)
            .await
            .unwrap();
        let back_edge = json!({ "@id": "b", "@type": "Module", "modules": [{ "@id": "a" }] });
        assert!(matches!(store.post(&back_edge, "a").await, Err(Error::InvalidImport(_))));
    }

    #[tokio::test]
    async fn test_remove_terminates_on_cyclic_snapshot() {
        let store = MemoryStore::new(EventBus::new());
        let pid = store.add_project(ProjectInfo::default()).await.unwrap();
        store
            .post(&json!({ "@id": "top", "@type": "Module", "modules": [{ "@id": "m1" }] }), &pid)
            .await
            .unwrap();
        let mut snapshot = store.retrieve_store().await.unwrap();
        snapshot["nodes"]["m1"]["modules"] = json!(["m1", "top"]);
        store.load_store(snapshot).await.unwrap();

        store.remove(NodeKind::Module, "top").await.unwrap();
        assert!(store.get_module("top").await.is_err());
        assert!(store.get_module("m1").await.is_err());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let store = MemoryStore::new(EventBus::new());
        let (pid, _) = project_with_root(&store).await;
        let snapshot = store.retrieve_store().await.unwrap();

        store.init_store().await.unwrap();
        assert!(store.current_project().await.unwrap().is_none());

        store.load_store(snapshot).await.unwrap();
        assert_eq!(store.current_project().await.unwrap().map(|p| p.id), Some(pid));
    }

    #[tokio::test]
    async fn test_second_project_requires_init() {
        let store = MemoryStore::new(EventBus::new());
        store.add_project(ProjectInfo::default()).await.unwrap();
        assert!(store.add_project(ProjectInfo::default()).await.is_err());
        store.init_store().await.unwrap();
        assert!(store.add_project(ProjectInfo::default()).await.is_ok());
    }
}
