// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! View state held by the application shell

use crate::types::{display_name, Node, NodeKind, Route};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// Selection and drawers
// =============================================================================

/// Side pane showing an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Pane {
    /// Read-only details view
    Details,
    /// Editor form
    Editor,
}

/// A selected element and the element enclosing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selected {
    /// Element id
    pub id: String,
    /// Enclosing element id
    pub parent: Option<String>,
}

/// At most one selected element per kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection(BTreeMap<NodeKind, Selected>);

impl Selection {
    /// Selected element of `kind`
    #[must_use]
    pub fn get(&self, kind: NodeKind) -> Option<&Selected> {
        self.0.get(&kind)
    }

    /// Selected id of `kind`
    #[must_use]
    pub fn id(&self, kind: NodeKind) -> Option<&str> {
        self.0.get(&kind).map(|s| s.id.as_str())
    }

    /// Whether `id` is the selected element of `kind`
    #[must_use]
    pub fn is_selected(&self, kind: NodeKind, id: &str) -> bool {
        self.id(kind) == Some(id)
    }

    /// Select an element, replacing the previous selection of its kind
    pub fn select(&mut self, kind: NodeKind, id: impl Into<String>, parent: Option<String>) {
        self.0.insert(kind, Selected { id: id.into(), parent });
    }

    /// Clear the selection of `kind`
    pub fn clear(&mut self, kind: NodeKind) -> Option<Selected> {
        self.0.remove(&kind)
    }

    /// Whether nothing is selected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Open side panes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Drawers(BTreeSet<(NodeKind, Pane)>);

impl Drawers {
    /// Open a pane
    pub fn open(&mut self, kind: NodeKind, pane: Pane) {
        self.0.insert((kind, pane));
    }

    /// Close a pane
    pub fn close(&mut self, kind: NodeKind, pane: Pane) {
        self.0.remove(&(kind, pane));
    }

    /// Close both panes of `kind`
    pub fn close_all(&mut self, kind: NodeKind) {
        self.close(kind, Pane::Details);
        self.close(kind, Pane::Editor);
    }

    /// Whether a pane is open
    #[must_use]
    pub fn is_open(&self, kind: NodeKind, pane: Pane) -> bool {
        self.0.contains(&(kind, pane))
    }

    /// Whether any pane of `kind` is open
    #[must_use]
    pub fn any_open(&self, kind: NodeKind) -> bool {
        self.is_open(kind, Pane::Details) || self.is_open(kind, Pane::Editor)
    }
}

// =============================================================================
// Cached root subtree
// =============================================================================

/// Root module of the loaded project with its direct children
///
/// A child list is `None` until it holds something; `None` and empty are
/// the same.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRoot {
    /// The root module record
    pub node: Node,
    /// Child modules
    pub modules: Option<Vec<Node>>,
    /// Child data models
    pub data_models: Option<Vec<Node>>,
}

impl CachedRoot {
    /// Cache a root module without children
    #[must_use]
    pub fn new(node: Node) -> Self {
        Self {
            node,
            modules: None,
            data_models: None,
        }
    }

    /// Cache a root module with loaded children
    #[must_use]
    pub fn with_children(node: Node, modules: Vec<Node>, data_models: Vec<Node>) -> Self {
        Self {
            node,
            modules: (!modules.is_empty()).then_some(modules),
            data_models: (!data_models.is_empty()).then_some(data_models),
        }
    }

    /// Root module id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.node.id
    }

    fn slot(&self, kind: NodeKind) -> Option<&Option<Vec<Node>>> {
        match kind {
            NodeKind::Module => Some(&self.modules),
            NodeKind::DataModel => Some(&self.data_models),
            _ => None,
        }
    }

    fn slot_mut(&mut self, kind: NodeKind) -> Option<&mut Option<Vec<Node>>> {
        match kind {
            NodeKind::Module => Some(&mut self.modules),
            NodeKind::DataModel => Some(&mut self.data_models),
            _ => None,
        }
    }

    /// Cached children of `kind` (empty when none)
    #[must_use]
    pub fn children(&self, kind: NodeKind) -> &[Node] {
        self.slot(kind)
            .and_then(Option::as_deref)
            .unwrap_or_default()
    }

    /// Whether a child of `kind` with `id` is cached
    #[must_use]
    pub fn contains(&self, kind: NodeKind, id: &str) -> bool {
        self.children(kind).iter().any(|n| n.id == id)
    }

    /// Append a child, creating its list
    ///
    /// Returns `false` for kinds not cached and for ids already present.
    pub fn insert(&mut self, kind: NodeKind, node: Node) -> bool {
        let Some(slot) = self.slot_mut(kind) else {
            return false;
        };
        let children = slot.get_or_insert_with(Vec::new);
        if children.iter().any(|n| n.id == node.id) {
            return false;
        }
        children.push(node);
        true
    }

    /// Replace a cached child in place. Returns `false` when absent.
    pub fn replace(&mut self, kind: NodeKind, node: Node) -> bool {
        let Some(Some(children)) = self.slot_mut(kind) else {
            return false;
        };
        match children.iter_mut().find(|n| n.id == node.id) {
            Some(existing) => {
                *existing = node;
                true
            }
            None => false,
        }
    }

    /// Remove a cached child. Returns `false` when absent.
    pub fn remove(&mut self, kind: NodeKind, id: &str) -> bool {
        let Some(Some(children)) = self.slot_mut(kind) else {
            return false;
        };
        match children.iter().position(|n| n.id == id) {
            Some(index) => {
                children.remove(index);
                true
            }
            None => false,
        }
    }
}

// =============================================================================
// Designer canvas
// =============================================================================

/// An association drawn between two entities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Association id
    pub id: String,
    /// Source entity id
    pub source: String,
    /// Target entity id
    pub target: String,
    /// Data model the source belongs to
    pub model: String,
}

/// An entity drawn on the canvas with its outgoing links
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityItem {
    /// Entity id
    pub entity: String,
    /// Outgoing associations with a target
    pub links: Vec<Link>,
}

/// Entities of the data model open in the designer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignerView {
    /// Data model id
    pub data_model_id: String,
    /// Entities in creation order
    pub entities: Vec<EntityItem>,
}

impl DesignerView {
    /// Empty canvas for a data model
    #[must_use]
    pub fn new(data_model_id: impl Into<String>) -> Self {
        Self {
            data_model_id: data_model_id.into(),
            entities: Vec::new(),
        }
    }

    /// Whether `entity` is drawn on this canvas
    #[must_use]
    pub fn has_entity(&self, entity: &str) -> bool {
        self.entities.iter().any(|item| item.entity == entity)
    }

    /// Link targets that live outside this data model, first seen first
    #[must_use]
    pub fn external_targets(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for link in self.entities.iter().flat_map(|item| &item.links) {
            if !self.has_entity(&link.target) && !out.contains(&link.target.as_str()) {
                out.push(&link.target);
            }
        }
        out
    }

    /// Add an entity. Returns `false` when already drawn.
    pub fn add_entity(&mut self, entity: impl Into<String>) -> bool {
        let entity = entity.into();
        if self.has_entity(&entity) {
            return false;
        }
        self.entities.push(EntityItem { entity, links: Vec::new() });
        true
    }

    /// Remove an entity. Returns `false` when absent.
    pub fn remove_entity(&mut self, entity: &str) -> bool {
        let before = self.entities.len();
        self.entities.retain(|item| item.entity != entity);
        self.entities.len() != before
    }

    /// Point link `id` from `source` at `target`, adding it if new.
    /// Returns `false` when `source` is not drawn or nothing changed.
    pub fn upsert_link(&mut self, source: &str, id: &str, target: &str) -> bool {
        let model = self.data_model_id.clone();
        let Some(item) = self.entities.iter_mut().find(|item| item.entity == source) else {
            return false;
        };
        match item.links.iter_mut().find(|link| link.id == id) {
            Some(link) if link.target == target => false,
            Some(link) => {
                link.target = target.to_string();
                true
            }
            None => {
                item.links.push(Link {
                    id: id.to_string(),
                    source: source.to_string(),
                    target: target.to_string(),
                    model,
                });
                true
            }
        }
    }

    /// Remove link `id` wherever it is drawn. Returns `false` when absent.
    pub fn remove_link(&mut self, id: &str) -> bool {
        for item in &mut self.entities {
            if let Some(index) = item.links.iter().position(|link| link.id == id) {
                item.links.remove(index);
                return true;
            }
        }
        false
    }
}

// =============================================================================
// View state
// =============================================================================

/// Everything the shell renders from
///
/// The default value is the "no project" state on the start page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    /// Current page
    pub route: Route,
    /// Route parameters
    pub params: BTreeMap<String, String>,
    /// Requested project id
    pub project_id: Option<String>,
    /// Loaded project record
    pub project: Option<Node>,
    /// Id of the project's root module
    pub root_module_id: Option<String>,
    /// Root module with its direct children
    pub root: Option<CachedRoot>,
    /// Module shown in the domain explorer
    pub module: Option<Node>,
    /// Selected elements
    pub selection: Selection,
    /// Open side panes
    pub drawers: Drawers,
    /// Data model open in the designer
    pub designer: Option<DesignerView>,
    /// New-project dialog is shown
    pub name_dialog: bool,
    /// Project name is being edited
    pub project_name_editor: bool,
    /// Message of the blocking error dialog
    pub alert: Option<String>,
    /// Designer zoom level
    pub zoom: i32,
}

impl ViewState {
    /// Name shown in the header
    #[must_use]
    pub fn project_name(&self) -> String {
        display_name(self.project.as_ref())
    }
}
