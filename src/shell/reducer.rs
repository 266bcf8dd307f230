// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! View-state reducer
//!
//! [`reduce`] is the only place the shell's state changes. It never touches
//! the store: records a transition needs are fetched first and handed in
//! with the action (see [`record_needed`]).

use super::state::{CachedRoot, DesignerView, Pane, ViewState};
use crate::events::{ChangeKind, DomainEvent, ModelingAction};
use crate::types::{Node, NodeKind, Route};
use std::collections::BTreeMap;
use tracing::debug;

/// A state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// A project load started
    ProjectRequested(String),
    /// A project finished loading
    ProjectLoaded {
        /// Project record
        project: Node,
        /// Root module with its children, when the project has one
        root: Option<CachedRoot>,
    },
    /// The project was closed
    ProjectCleared,
    /// The domain store changed a record
    Domain {
        /// Store notification
        event: DomainEvent,
        /// Fetched record, when [`record_needed`] asked for one
        record: Option<Node>,
    },
    /// A module was picked in the navigation tree
    ModuleSelected(Node),
    /// Route change with parameters
    Navigate {
        /// Target route
        route: Route,
        /// Route parameters
        params: BTreeMap<String, String>,
    },
    /// Route change keeping the parameters
    Route(Route),
    /// A view or edit intent from a navigation widget
    Modeling {
        /// View or edit (deletes go through the store)
        action: ModelingAction,
        /// Element kind
        kind: NodeKind,
        /// Element id
        id: String,
        /// Enclosing element id
        parent: Option<String>,
    },
    /// Close one pane
    CloseDrawer {
        /// Element kind
        kind: NodeKind,
        /// Pane to close
        pane: Pane,
    },
    /// Switch from the details pane to the editor for the same element
    EditSelected(NodeKind),
    /// Clear a selection and close its panes
    ClearSelection(NodeKind),
    /// Clear a selection only if it is `id`
    Deselect {
        /// Element kind
        kind: NodeKind,
        /// Element id
        id: String,
    },
    /// A data model was loaded into the designer
    DesignerLoaded(DesignerView),
    /// The designer was closed
    DesignerCleared,
    /// Show the blocking error dialog
    Alert(String),
    /// Dismiss the error dialog
    DismissAlert,
    /// Show or hide the new-project dialog
    NameDialog(bool),
    /// Show or hide the project name editor
    ProjectNameEditor(bool),
    /// The project was renamed
    ProjectRenamed(String),
    /// Designer zoom changed
    Zoom(i32),
}

/// Whether a domain event needs the fetched record before reduction
#[must_use]
pub fn record_needed(state: &ViewState, event: &DomainEvent) -> bool {
    match (event.kind, event.change) {
        (NodeKind::Module | NodeKind::DataModel, ChangeKind::Created) => state
            .root
            .as_ref()
            .is_some_and(|root| {
                root.id() != event.id
                    && event.parent.as_deref() == Some(root.id())
                    && !root.contains(event.kind, &event.id)
            }),
        (NodeKind::Module | NodeKind::DataModel, ChangeKind::Updated) => state
            .root
            .as_ref()
            .is_some_and(|root| root.contains(event.kind, &event.id)),
        (NodeKind::Association, ChangeKind::Created | ChangeKind::Updated) => {
            match (&state.designer, event.parent.as_deref()) {
                (Some(designer), Some(parent)) => designer.has_entity(parent),
                _ => false,
            }
        }
        _ => false,
    }
}

/// Compute the next state
#[must_use]
pub fn reduce(mut state: ViewState, action: Action) -> ViewState {
    match action {
        Action::ProjectRequested(id) => {
            state.project_id = Some(id);
        }
        Action::ProjectLoaded { project, root } => {
            state.project_id = Some(project.id.clone());
            state.root_module_id = root.as_ref().map(|r| r.id().to_string());
            state.module = root.as_ref().map(|r| r.node.clone());
            state.root = root;
            state.project = Some(project);
            reset_selection(&mut state);
        }
        Action::ProjectCleared => {
            state.project_id = None;
            state.project = None;
            state.root_module_id = None;
            state.root = None;
            state.module = None;
            reset_selection(&mut state);
        }
        Action::Domain { event, record } => return reduce_domain(state, &event, record),
        Action::ModuleSelected(module) => {
            state.module = Some(module);
            state.route = Route::Domain;
        }
        Action::Navigate { route, params } => {
            state.route = route;
            state.params = params;
        }
        Action::Route(route) => {
            state.route = route;
        }
        Action::Modeling { action, kind, id, parent } => {
            if let Some(pane) = pane_for(action, kind) {
                state.selection.select(kind, id, parent);
                state.drawers.open(kind, pane);
            }
        }
        Action::CloseDrawer { kind, pane } => {
            state.drawers.close(kind, pane);
            if !state.drawers.any_open(kind) {
                state.selection.clear(kind);
            }
        }
        Action::EditSelected(kind) => {
            if state.selection.get(kind).is_some() {
                state.drawers.close(kind, Pane::Details);
                state.drawers.open(kind, Pane::Editor);
            }
        }
        Action::ClearSelection(kind) => {
            state.selection.clear(kind);
            state.drawers.close_all(kind);
        }
        Action::Deselect { kind, id } => {
            if state.selection.is_selected(kind, &id) {
                state.selection.clear(kind);
                state.drawers.close_all(kind);
            }
        }
        Action::DesignerLoaded(view) => {
            state.designer = Some(view);
        }
        Action::DesignerCleared => {
            state.designer = None;
        }
        Action::Alert(message) => {
            state.alert = Some(message);
        }
        Action::DismissAlert => {
            state.alert = None;
        }
        Action::NameDialog(open) => {
            state.name_dialog = open;
        }
        Action::ProjectNameEditor(open) => {
            state.project_name_editor = open;
        }
        Action::ProjectRenamed(name) => {
            if let Some(project) = &mut state.project {
                project.name = Some(name);
            }
            state.project_name_editor = false;
        }
        Action::Zoom(zoom) => {
            state.zoom = zoom;
        }
    }
    state
}

/// Pane opened by a view or edit intent
///
/// | action | kind | pane |
/// |---|---|---|
/// | view | module, data model, entity | details |
/// | view | attribute | editor |
/// | edit | any element | editor |
#[must_use]
pub fn pane_for(action: ModelingAction, kind: NodeKind) -> Option<Pane> {
    match (action, kind) {
        (ModelingAction::View, NodeKind::Module | NodeKind::DataModel | NodeKind::Entity) => {
            Some(Pane::Details)
        }
        (ModelingAction::View, NodeKind::Attribute)
        | (
            ModelingAction::Edit,
            NodeKind::Module
            | NodeKind::DataModel
            | NodeKind::Entity
            | NodeKind::Attribute
            | NodeKind::Association,
        ) => Some(Pane::Editor),
        _ => None,
    }
}

fn reset_selection(state: &mut ViewState) {
    state.selection = super::state::Selection::default();
    state.drawers = super::state::Drawers::default();
    state.designer = None;
}

fn open_editor(state: &mut ViewState, event: &DomainEvent) {
    state
        .selection
        .select(event.kind, event.id.clone(), event.parent.clone());
    state.drawers.open(event.kind, Pane::Editor);
}

fn reduce_domain(mut state: ViewState, event: &DomainEvent, record: Option<Node>) -> ViewState {
    let kind = event.kind;
    let id = event.id.as_str();
    match (kind, event.change) {
        (NodeKind::Module | NodeKind::DataModel, ChangeKind::Created) => {
            let Some(root) = &mut state.root else {
                return state;
            };
            if root.id() == id || root.contains(kind, id) {
                return state;
            }
            if event.parent.as_deref() == Some(root.id()) {
                if let Some(record) = record {
                    root.insert(kind, record);
                }
            } else {
                debug!("{} {} created outside the root module", kind, id);
                open_editor(&mut state, event);
            }
        }
        (NodeKind::Module | NodeKind::DataModel, ChangeKind::Updated) => {
            if let (Some(root), Some(record)) = (&mut state.root, record) {
                root.replace(kind, record);
            }
        }
        (NodeKind::Module | NodeKind::DataModel, ChangeKind::Deleted) => {
            if let Some(root) = &mut state.root {
                root.remove(kind, id);
            }
        }
        (NodeKind::Entity, ChangeKind::Created) => {
            if let Some(designer) = &mut state.designer {
                if event.parent.as_deref() == Some(designer.data_model_id.as_str()) {
                    designer.add_entity(id);
                }
            }
        }
        (NodeKind::Entity, ChangeKind::Deleted) => {
            if let Some(designer) = &mut state.designer {
                designer.remove_entity(id);
            }
        }
        (NodeKind::Association, ChangeKind::Created | ChangeKind::Updated) => {
            let target = record.and_then(|r| r.target);
            if let (Some(designer), Some(parent), Some(target)) =
                (&mut state.designer, event.parent.as_deref(), target)
            {
                designer.upsert_link(parent, id, &target);
            }
        }
        (NodeKind::Association, ChangeKind::Deleted) => {
            if let Some(designer) = &mut state.designer {
                designer.remove_link(id);
            }
        }
        (NodeKind::Attribute, ChangeKind::Created) => open_editor(&mut state, event),
        _ => {}
    }

    if event.change == ChangeKind::Deleted && state.selection.is_selected(kind, id) {
        state.selection.clear(kind);
        state.drawers.close_all(kind);
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_root() -> ViewState {
        reduce(
            ViewState::default(),
            Action::ProjectLoaded {
                project: Node::new("p1", NodeKind::Project),
                root: Some(CachedRoot::new(Node::new("root", NodeKind::Module))),
            },
        )
    }

    fn created(kind: NodeKind, id: &str, parent: &str) -> DomainEvent {
        DomainEvent::created(kind, id, Some(parent.to_string()))
    }

    #[test]
    fn test_created_for_cached_child_is_noop() {
        let mut state = with_root();
        if let Some(root) = &mut state.root {
            root.insert(NodeKind::Module, Node::new("m1", NodeKind::Module));
        }
        let event = created(NodeKind::Module, "m1", "root");
        assert!(!record_needed(&state, &event));

        let record = Node::new("m1", NodeKind::Module).with_name("late");
        let next = reduce(state.clone(), Action::Domain { event, record: Some(record) });
        assert_eq!(next, state);
        assert!(next.selection.is_empty());
    }

    #[test]
    fn test_created_inserts_into_absent_list() {
        let state = with_root();
        let event = created(NodeKind::Module, "m1", "root");
        assert!(record_needed(&state, &event));

        let record = Node::new("m1", NodeKind::Module).with_parent("root");
        let next = reduce(state, Action::Domain { event, record: Some(record) });

        let modules = next.root.as_ref().and_then(|r| r.modules.as_ref()).unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].id, "m1");
        assert!(next.selection.is_empty());
    }

    #[test]
    fn test_created_elsewhere_opens_editor() {
        let state = with_root();
        let event = created(NodeKind::Module, "m2", "other");
        assert!(!record_needed(&state, &event));

        let next = reduce(state, Action::Domain { event, record: None });

        assert!(next.root.as_ref().unwrap().modules.is_none());
        assert_eq!(next.selection.id(NodeKind::Module), Some("m2"));
        assert_eq!(
            next.selection.get(NodeKind::Module).and_then(|s| s.parent.as_deref()),
            Some("other")
        );
        assert!(next.drawers.is_open(NodeKind::Module, Pane::Editor));
    }

    #[test]
    fn test_update_for_missing_id_is_no_op() {
        let state = with_root();
        let event = DomainEvent::updated(NodeKind::DataModel, "dm9", Some("root".into()));
        assert!(!record_needed(&state, &event));

        let next = reduce(state.clone(), Action::Domain { event, record: None });
        assert_eq!(next, state);
    }

    #[test]
    fn test_update_replaces_in_place() {
        let mut state = with_root();
        if let Some(root) = &mut state.root {
            root.insert(NodeKind::DataModel, Node::new("dm1", NodeKind::DataModel));
            root.insert(NodeKind::DataModel, Node::new("dm2", NodeKind::DataModel));
        }
        let event = DomainEvent::updated(NodeKind::DataModel, "dm1", Some("root".into()));
        assert!(record_needed(&state, &event));

        let record = Node::new("dm1", NodeKind::DataModel).with_name("Sales");
        let next = reduce(state, Action::Domain { event, record: Some(record) });
        let models = next.root.unwrap().data_models.unwrap();
        assert_eq!(models[0].name.as_deref(), Some("Sales"));
        assert_eq!(models[1].id, "dm2");
    }

    #[test]
    fn test_delete_selected_entity_closes_panes() {
        let mut state = with_root();
        state = reduce(
            state,
            Action::Modeling {
                action: ModelingAction::View,
                kind: NodeKind::Entity,
                id: "e1".into(),
                parent: Some("dm1".into()),
            },
        );
        state = reduce(state, Action::EditSelected(NodeKind::Entity));
        state.drawers.open(NodeKind::Entity, Pane::Details);

        let other = reduce(
            state.clone(),
            Action::Domain { event: DomainEvent::deleted(NodeKind::Entity, "e2", None), record: None },
        );
        assert_eq!(other, state);

        let next = reduce(
            state,
            Action::Domain { event: DomainEvent::deleted(NodeKind::Entity, "e1", None), record: None },
        );
        assert!(next.selection.get(NodeKind::Entity).is_none());
        assert!(!next.drawers.any_open(NodeKind::Entity));
    }

    #[test]
    fn test_action_table() {
        assert_eq!(pane_for(ModelingAction::View, NodeKind::DataModel), Some(Pane::Details));
        assert_eq!(pane_for(ModelingAction::View, NodeKind::Attribute), Some(Pane::Editor));
        assert_eq!(pane_for(ModelingAction::View, NodeKind::Association), None);
        for kind in NodeKind::ELEMENTS {
            assert_eq!(pane_for(ModelingAction::Edit, kind), Some(Pane::Editor));
            assert_eq!(pane_for(ModelingAction::Delete, kind), None);
        }
    }

    #[test]
    fn test_closing_last_pane_clears_selection() {
        let mut state = reduce(
            ViewState::default(),
            Action::Modeling {
                action: ModelingAction::View,
                kind: NodeKind::Module,
                id: "m1".into(),
                parent: None,
            },
        );
        state = reduce(state, Action::EditSelected(NodeKind::Module));
        assert!(state.drawers.is_open(NodeKind::Module, Pane::Editor));
        assert!(!state.drawers.is_open(NodeKind::Module, Pane::Details));

        state = reduce(state, Action::CloseDrawer { kind: NodeKind::Module, pane: Pane::Editor });
        assert!(state.selection.get(NodeKind::Module).is_none());
    }

    #[test]
    fn test_designer_tracks_entities_and_links() {
        let mut state = with_root();
        state = reduce(state, Action::DesignerLoaded(DesignerView::new("dm1")));
        state = reduce(
            state,
            Action::Domain { event: created(NodeKind::Entity, "e1", "dm1"), record: None },
        );
        state = reduce(
            state,
            Action::Domain { event: created(NodeKind::Entity, "x", "dm2"), record: None },
        );

        let assoc = created(NodeKind::Association, "a1", "e1");
        assert!(record_needed(&state, &assoc));
        let mut record = Node::new("a1", NodeKind::Association);
        record.target = Some("far".into());
        state = reduce(state, Action::Domain { event: assoc, record: Some(record) });

        let designer = state.designer.as_ref().unwrap();
        assert_eq!(designer.entities.len(), 1);
        assert_eq!(designer.external_targets(), vec!["far"]);

        state = reduce(
            state,
            Action::Domain {
                event: DomainEvent::deleted(NodeKind::Association, "a1", Some("e1".into())),
                record: None,
            },
        );
        assert!(state.designer.unwrap().entities[0].links.is_empty());
    }

    #[test]
    fn test_attribute_created_opens_editor() {
        let next = reduce(
            ViewState::default(),
            Action::Domain { event: created(NodeKind::Attribute, "at1", "e1"), record: None },
        );
        assert!(next.drawers.is_open(NodeKind::Attribute, Pane::Editor));
        assert_eq!(next.selection.id(NodeKind::Attribute), Some("at1"));
    }

    #[test]
    fn test_clear_project_empties_cache() {
        let state = reduce(with_root(), Action::ProjectCleared);
        assert!(state.project.is_none());
        assert!(state.root.is_none());
        assert!(state.module.is_none());
        assert!(state.root_module_id.is_none());
        assert!(state.project_id.is_none());
    }
}
