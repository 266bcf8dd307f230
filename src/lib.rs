// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Modelyard library - state synchronisation for an API data-modeling workspace
//!
//! This crate provides the event bus, the application shell's view-state
//! reducer, the offline persistence mirror and the native graph importer
//! that sit between a modeling UI and its domain store.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod import;
pub mod persistence;
pub mod shell;
pub mod store;

/// Core data types shared by the store, the shell and the importer
pub mod types {
    use serde::{Deserialize, Serialize};
    use serde_json::Value;
    use std::collections::BTreeMap;
    use std::fmt;
    use std::str::FromStr;

    // =========================================================================
    // Node kinds
    // =========================================================================

    /// Kind of a node in a modeling project graph
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub enum NodeKind {
        /// Top-level project
        Project,
        /// Module (modules nest)
        Module,
        /// Data model inside a module
        DataModel,
        /// Entity inside a data model
        Entity,
        /// Attribute of an entity
        Attribute,
        /// Association from an entity to another entity
        Association,
    }

    impl NodeKind {
        /// Every element kind that can be selected in the shell
        pub const ELEMENTS: [NodeKind; 5] = [
            Self::Module,
            Self::DataModel,
            Self::Entity,
            Self::Attribute,
            Self::Association,
        ];

        /// The `@type` marker used in records and import dumps
        #[must_use]
        pub fn type_marker(&self) -> &'static str {
            match self {
                Self::Project => "Project",
                Self::Module => "Module",
                Self::DataModel => "DataModel",
                Self::Entity => "Entity",
                Self::Attribute => "Attribute",
                Self::Association => "Association",
            }
        }

        /// The property name carried by navigation actions
        #[must_use]
        pub fn property(&self) -> &'static str {
            match self {
                Self::Project => "project",
                Self::Module => "module",
                Self::DataModel => "data-model",
                Self::Entity => "entity",
                Self::Attribute => "attribute",
                Self::Association => "association",
            }
        }

        /// Parse a navigation property name
        #[must_use]
        pub fn from_property(property: &str) -> Option<Self> {
            match property {
                "project" => Some(Self::Project),
                "module" => Some(Self::Module),
                "data-model" => Some(Self::DataModel),
                "entity" => Some(Self::Entity),
                "attribute" => Some(Self::Attribute),
                "association" => Some(Self::Association),
                _ => None,
            }
        }

        /// Parse a type marker, either bare (`Module`) or as the last
        /// segment of a vocabulary IRI (`http://a.ml/vocabularies/modularity#Module`)
        #[must_use]
        pub fn from_type_marker(marker: &str) -> Option<Self> {
            let local = marker
                .rsplit(&['#', ':', '/'][..])
                .next()
                .unwrap_or(marker);
            [
                Self::Project,
                Self::Module,
                Self::DataModel,
                Self::Entity,
                Self::Attribute,
                Self::Association,
            ]
            .into_iter()
            .find(|kind| kind.type_marker() == local)
        }

        /// Name used in bus event types (`State.<name>.created`)
        #[must_use]
        pub fn event_name(&self) -> &'static str {
            match self {
                Self::DataModel => "Model",
                other => other.type_marker(),
            }
        }
    }

    impl fmt::Display for NodeKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.property())
        }
    }

    // =========================================================================
    // Node
    // =========================================================================

    /// A record in the project graph as returned by the domain store
    ///
    /// Child fields hold ids. An empty child list and an absent one mean the
    /// same thing, so empty lists are not serialized.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Node {
        /// Unique identifier
        #[serde(rename = "@id")]
        pub id: String,
        /// Node kind
        #[serde(rename = "@type")]
        pub kind: NodeKind,
        /// Display name
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub name: Option<String>,
        /// Description
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub description: Option<String>,
        /// Id of the enclosing node (none for projects)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub parent: Option<String>,
        /// Child modules
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub modules: Vec<String>,
        /// Child data models
        #[serde(default, rename = "dataModels", skip_serializing_if = "Vec::is_empty")]
        pub data_models: Vec<String>,
        /// Entities of a data model
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub entities: Vec<String>,
        /// Attributes of an entity
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub attributes: Vec<String>,
        /// Associations of an entity
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub associations: Vec<String>,
        /// Association target entity
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub target: Option<String>,
        /// Any other property set through a changelog
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        pub properties: BTreeMap<String, Value>,
        /// Stored view-layout payload
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub view: Option<Value>,
    }

    impl Node {
        /// Create an empty node of the given kind
        #[must_use]
        pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
            Self {
                id: id.into(),
                kind,
                name: None,
                description: None,
                parent: None,
                modules: Vec::new(),
                data_models: Vec::new(),
                entities: Vec::new(),
                attributes: Vec::new(),
                associations: Vec::new(),
                target: None,
                properties: BTreeMap::new(),
                view: None,
            }
        }

        /// Set the display name
        #[must_use]
        pub fn with_name(mut self, name: impl Into<String>) -> Self {
            self.name = Some(name.into());
            self
        }

        /// Set the parent id
        #[must_use]
        pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
            self.parent = Some(parent.into());
            self
        }

        /// Child id list holding children of `kind`, if this node can have them
        #[must_use]
        pub fn children(&self, kind: NodeKind) -> Option<&Vec<String>> {
            match (self.kind, kind) {
                (NodeKind::Project | NodeKind::Module, NodeKind::Module) => Some(&self.modules),
                (NodeKind::Module, NodeKind::DataModel) => Some(&self.data_models),
                (NodeKind::DataModel, NodeKind::Entity) => Some(&self.entities),
                (NodeKind::Entity, NodeKind::Attribute) => Some(&self.attributes),
                (NodeKind::Entity, NodeKind::Association) => Some(&self.associations),
                _ => None,
            }
        }

        /// Mutable child id list holding children of `kind`
        pub fn children_mut(&mut self, kind: NodeKind) -> Option<&mut Vec<String>> {
            match (self.kind, kind) {
                (NodeKind::Project | NodeKind::Module, NodeKind::Module) => Some(&mut self.modules),
                (NodeKind::Module, NodeKind::DataModel) => Some(&mut self.data_models),
                (NodeKind::DataModel, NodeKind::Entity) => Some(&mut self.entities),
                (NodeKind::Entity, NodeKind::Attribute) => Some(&mut self.attributes),
                (NodeKind::Entity, NodeKind::Association) => Some(&mut self.associations),
                _ => None,
            }
        }

        /// All child ids, in field order
        pub fn all_children(&self) -> impl Iterator<Item = &String> {
            self.modules
                .iter()
                .chain(&self.data_models)
                .chain(&self.entities)
                .chain(&self.attributes)
                .chain(&self.associations)
        }
    }

    /// Nested-array fields of an exported graph node, in walk order
    pub const GRAPH_CHILD_KEYS: [&str; 5] =
        ["modules", "dataModels", "entities", "associations", "attributes"];

    /// Name shown for a project, falling back to "New project"
    #[must_use]
    pub fn display_name(project: Option<&Node>) -> String {
        project
            .and_then(|p| p.name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "New project".to_string())
    }

    // =========================================================================
    // Create / patch payloads
    // =========================================================================

    /// Information used to create a project
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct ProjectInfo {
        /// Project name
        pub name: Option<String>,
        /// Optional description
        pub description: Option<String>,
    }

    /// Information used to create a graph element
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct ElementInfo {
        /// Element name
        pub name: Option<String>,
        /// Optional description
        pub description: Option<String>,
        /// Association target (associations only)
        pub target: Option<String>,
    }

    impl ElementInfo {
        /// Element info carrying only a name
        #[must_use]
        pub fn named(name: impl Into<String>) -> Self {
            Self {
                name: Some(name.into()),
                ..Self::default()
            }
        }
    }

    /// Changelog operation
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum ChangeOp {
        /// Add a value
        Add,
        /// Replace a value
        Replace,
        /// Remove a value
        Remove,
    }

    /// A single changelog entry produced by an editor
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Change {
        /// Operation
        pub op: ChangeOp,
        /// Target path, e.g. `/name`
        pub path: String,
        /// New value (absent for removals)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub value: Option<Value>,
    }

    impl Change {
        /// A `replace` change
        #[must_use]
        pub fn replace(path: impl Into<String>, value: impl Into<Value>) -> Self {
            Self {
                op: ChangeOp::Replace,
                path: path.into(),
                value: Some(value.into()),
            }
        }

        /// A `remove` change
        #[must_use]
        pub fn remove(path: impl Into<String>) -> Self {
            Self {
                op: ChangeOp::Remove,
                path: path.into(),
                value: None,
            }
        }
    }

    // =========================================================================
    // Routing
    // =========================================================================

    /// Page currently shown by the application shell
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Route {
        /// Project picker
        #[default]
        Start,
        /// Domain explorer for the loaded project
        Domain,
        /// Data model designer
        Model,
        /// File import screen
        Import,
        /// Import in progress
        #[serde(rename = "importprocessing")]
        ImportProcessing,
    }

    impl Route {
        /// Route name as used in navigation events
        #[must_use]
        pub fn as_str(&self) -> &'static str {
            match self {
                Self::Start => "start",
                Self::Domain => "domain",
                Self::Model => "model",
                Self::Import => "import",
                Self::ImportProcessing => "importprocessing",
            }
        }
    }

    impl fmt::Display for Route {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    impl FromStr for Route {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s {
                "start" => Ok(Self::Start),
                "domain" => Ok(Self::Domain),
                "model" => Ok(Self::Model),
                "import" => Ok(Self::Import),
                "importprocessing" => Ok(Self::ImportProcessing),
                other => Err(format!("Unknown route: {other}")),
            }
        }
    }
}

/// Prelude for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::events::{BusEvent, DomainEvent, EventBus, NavigationEvent};
    pub use crate::store::{MemoryStore, ModelStore};
    pub use crate::types::*;
}
