// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! The application shell
//!
//! Holds the view state behind a `watch` channel: every change is a render
//! notification for subscribers, and reductions that change nothing notify
//! nobody. Bus events are handled one at a time in arrival order.

use super::reducer::{record_needed, reduce, Action};
use super::state::{CachedRoot, DesignerView, Pane, ViewState};
use super::zoom::ZoomDebouncer;
use crate::error::{Error, Result};
use crate::events::{BusEvent, EventBus, Listener, ModelingAction, NavigationEvent, ShellSignal};
use crate::import::{ContentFile, DomainImporter};
use crate::persistence::StorePersistence;
use crate::store::ModelStore;
use crate::types::{Change, ElementInfo, Node, NodeKind, ProjectInfo, Route};
use futures::future::try_join_all;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Name given to the root module of a new project
pub const ROOT_MODULE_NAME: &str = "root module";

/// An editor form the shell saves from
pub trait EditorWidget {
    /// Check the form. Invalid forms are not saved.
    fn validate(&self) -> bool;

    /// Changes made in the form
    fn changelog(&self) -> Vec<Change>;

    /// Layout payload to store with the record, if any
    fn view(&self) -> Option<Value> {
        None
    }
}

/// Monotonic load counter; a load whose ticket is no longer current is stale
#[derive(Debug, Default)]
struct Generation(AtomicU64);

impl Generation {
    fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.0.load(Ordering::SeqCst) == ticket
    }
}

/// Application shell over a domain store
pub struct ModelingApp<S> {
    store: S,
    bus: EventBus,
    persistence: StorePersistence<S>,
    listener: Listener,
    state: watch::Sender<ViewState>,
    projects: Generation,
    modules: Generation,
    designers: Generation,
    zoom: ZoomDebouncer,
}

impl<S: ModelStore> ModelingApp<S> {
    /// Create a shell with the "no project" state
    pub fn new(store: S, bus: EventBus, persistence: StorePersistence<S>) -> Self {
        let (state, _) = watch::channel(ViewState::default());
        Self {
            store,
            listener: Listener::new(bus.clone()),
            bus,
            persistence,
            state,
            projects: Generation::default(),
            modules: Generation::default(),
            designers: Generation::default(),
            zoom: ZoomDebouncer::default(),
        }
    }

    /// Use a different zoom debounce window
    #[must_use]
    pub fn with_zoom_debounce(mut self, window: Duration) -> Self {
        self.zoom = ZoomDebouncer::new(window);
        self
    }

    /// Receive a notification on every state change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    /// Snapshot of the current state
    #[must_use]
    pub fn state(&self) -> ViewState {
        self.state.borrow().clone()
    }

    /// The domain store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The persistence mirror
    pub fn persistence(&self) -> &StorePersistence<S> {
        &self.persistence
    }

    /// Reduce an action into the state. Returns whether anything changed.
    pub fn apply(&self, action: Action) -> bool {
        self.state.send_if_modified(|state| {
            let next = reduce(state.clone(), action);
            if next == *state {
                false
            } else {
                *state = next;
                true
            }
        })
    }

    // =========================================================================
    // Dispatch queue
    // =========================================================================

    /// Start handling bus events. Returns `false` when already listening.
    pub async fn listen(&self) -> bool {
        self.listener.listen().await
    }

    /// Stop handling bus events
    pub fn unlisten(&self) {
        self.listener.unlisten();
    }

    /// Handle bus events and settled zoom changes until unlistened
    pub async fn run(&self) {
        loop {
            tokio::select! {
                event = self.listener.next() => match event {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
                Some(signal) = self.zoom.settled() => {
                    if let Err(e) = self.handle_signal(signal).await {
                        self.report(&e);
                    }
                }
            }
        }
        debug!("Shell loop stopped");
    }

    /// Handle every event already published. Returns how many were seen.
    pub async fn drain(&self) -> usize {
        let mut seen = 0;
        while let Some(event) = self.listener.try_next().await {
            self.handle(event).await;
            seen += 1;
        }
        seen
    }

    async fn handle(&self, event: BusEvent) {
        let event_type = event.event_type();
        if let Err(e) = self.dispatch(event).await {
            warn!("Handling {} failed", event_type);
            self.report(&e);
        }
    }

    /// Handle one bus event
    pub async fn dispatch(&self, event: BusEvent) -> Result<()> {
        match event {
            BusEvent::Domain(event) => {
                let needed = record_needed(&self.state.borrow(), &event);
                let record = if needed {
                    Some(self.store.read(event.kind, &event.id).await?)
                } else {
                    None
                };
                self.apply(Action::Domain { event, record });
            }
            BusEvent::Navigation(NavigationEvent::Change { selected, kind }) => match kind {
                NodeKind::Module => self.select_module(&selected).await?,
                NodeKind::Entity => {
                    self.apply(Action::Route(Route::Model));
                    self.apply(Action::Modeling {
                        action: ModelingAction::View,
                        kind,
                        id: selected,
                        parent: None,
                    });
                }
                NodeKind::DataModel => self.open_data_model(&selected).await?,
                _ => debug!("Ignoring selection of {} {}", kind, selected),
            },
            BusEvent::Navigation(NavigationEvent::Action { action, property, selected, parent }) => {
                if action == ModelingAction::Delete {
                    self.store.remove(property, &selected).await?;
                    self.apply(Action::Deselect { kind: property, id: selected });
                } else {
                    self.apply(Action::Modeling { action, kind: property, id: selected, parent });
                }
            }
            BusEvent::Rejection(message) => {
                error!("{}", message);
                self.apply(Action::Alert(message));
            }
        }
        Ok(())
    }

    /// Handle a signal raised by a page component
    pub async fn handle_signal(&self, signal: ShellSignal) -> Result<()> {
        debug!("Signal {}", signal.name());
        match signal {
            ShellSignal::NewProjectRequested => {
                self.request_new_project();
            }
            ShellSignal::ImportRequested => {
                self.apply(Action::Route(Route::Import));
            }
            ShellSignal::Restore { id } => {
                self.restore_project(&id).await?;
            }
            ShellSignal::ImportProcessResult { import_type, files } => {
                if self.import_files(&files, &import_type).await.is_err() {
                    debug!("Import failed and was reported");
                }
            }
            ShellSignal::Navigate { route, params } => {
                self.navigate(route, params).await?;
            }
            ShellSignal::ZoomChange { zoom } => {
                self.apply(Action::Zoom(zoom));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Select the project to show. `None` or an empty id closes the project.
    ///
    /// Selecting the current project again does nothing. A load that
    /// resolves after a newer selection started is dropped.
    pub async fn select_project(&self, id: Option<&str>) -> Result<()> {
        let id = id.filter(|id| !id.is_empty());
        if self.state.borrow().project_id.as_deref() == id {
            return Ok(());
        }
        match id {
            Some(id) => self.load_project(id).await,
            None => {
                self.projects.next();
                self.apply(Action::ProjectCleared);
                Ok(())
            }
        }
    }

    async fn load_project(&self, id: &str) -> Result<()> {
        let ticket = self.projects.next();
        self.apply(Action::ProjectRequested(id.to_string()));

        let project = self.store.get_project(id).await?;
        let root = match project.modules.first() {
            Some(root_id) => Some(self.load_root(root_id).await?),
            None => None,
        };
        if !self.projects.is_current(ticket) {
            warn!("Discarding stale load of project {}", id);
            return Ok(());
        }
        info!("Loaded project {}", id);
        self.apply(Action::ProjectLoaded { project, root });
        Ok(())
    }

    async fn load_root(&self, id: &str) -> Result<CachedRoot> {
        let node = self.store.get_module(id).await?;
        let modules = try_join_all(node.modules.iter().map(|m| self.store.get_module(m))).await?;
        let data_models = try_join_all(
            node.data_models
                .iter()
                .map(|dm| self.store.read(NodeKind::DataModel, dm)),
        )
        .await?;
        Ok(CachedRoot::with_children(node, modules, data_models))
    }

    /// Show a module in the domain explorer
    pub async fn select_module(&self, id: &str) -> Result<()> {
        let ticket = self.modules.next();
        let module = self.store.get_module(id).await?;
        if !self.modules.is_current(ticket) {
            warn!("Discarding stale load of module {}", id);
            return Ok(());
        }
        self.apply(Action::ModuleSelected(module));
        Ok(())
    }

    /// Open a data model in the designer
    pub async fn open_data_model(&self, id: &str) -> Result<()> {
        let ticket = self.designers.next();
        self.apply(Action::Route(Route::Model));

        let model = self.store.read(NodeKind::DataModel, id).await?;
        let entities = try_join_all(
            model
                .entities
                .iter()
                .map(|e| self.store.read(NodeKind::Entity, e)),
        )
        .await?;
        let mut view = DesignerView::new(id);
        for entity in &entities {
            view.add_entity(entity.id.clone());
            for assoc_id in &entity.associations {
                let assoc = self.store.read(NodeKind::Association, assoc_id).await?;
                if let Some(target) = &assoc.target {
                    view.upsert_link(&entity.id, &assoc.id, target);
                }
            }
        }
        if !self.designers.is_current(ticket) {
            warn!("Discarding stale load of data model {}", id);
            return Ok(());
        }
        self.apply(Action::DesignerLoaded(view));
        Ok(())
    }

    // =========================================================================
    // Project flows
    // =========================================================================

    /// Show the new-project dialog
    pub fn request_new_project(&self) {
        self.apply(Action::NameDialog(true));
    }

    /// Replace the store contents with a new, named project
    ///
    /// An empty name leaves everything untouched and returns `None`.
    pub async fn create_project(&self, name: &str, description: Option<&str>) -> Result<Option<String>> {
        if name.is_empty() {
            return Ok(None);
        }
        let info = ProjectInfo {
            name: Some(name.to_string()),
            description: description.filter(|d| !d.is_empty()).map(String::from),
        };
        self.store.init_store().await?;
        let id = self.store.add_project(info).await?;
        self.store.add_module(&id, ElementInfo::named(ROOT_MODULE_NAME)).await?;
        self.apply(Action::NameDialog(false));
        self.load_project(&id).await?;
        self.apply(Action::Route(Route::Domain));
        info!("Created project {}", id);
        Ok(Some(id))
    }

    /// Show the project name editor
    pub fn edit_project_name(&self) {
        self.apply(Action::ProjectNameEditor(true));
    }

    /// Rename the loaded project and snapshot it
    pub async fn rename_project(&self, name: &str) -> Result<()> {
        let Some(id) = self.state.borrow().project_id.clone() else {
            return Ok(());
        };
        if name.is_empty() {
            return Ok(());
        }
        self.store
            .patch(NodeKind::Project, &[Change::replace("/name", name)], &id, None)
            .await?;
        self.apply(Action::ProjectRenamed(name.to_string()));
        self.persistence.store_state().await
    }

    /// Load a stored project and show it
    pub async fn restore_project(&self, id: &str) -> Result<Node> {
        let project = self.persistence.restore(id).await?;
        self.load_project(&project.id).await?;
        self.apply(Action::Route(Route::Domain));
        Ok(project)
    }

    /// Change the route. Routing to the domain page with a `project`
    /// parameter selects that project.
    pub async fn navigate(&self, route: Route, params: BTreeMap<String, String>) -> Result<()> {
        let project = params.get("project").cloned();
        self.apply(Action::Navigate { route, params });
        match (route, project) {
            (Route::Domain, Some(project)) => self.select_project(Some(&project)).await,
            _ => Ok(()),
        }
    }

    /// Import files into a new project and show it
    ///
    /// On failure the error is reported and the route returns to the start
    /// page. Records created before the failure stay in the store.
    pub async fn import_files(&self, files: &[ContentFile], import_type: &str) -> Result<String> {
        self.apply(Action::Route(Route::ImportProcessing));
        let imported = DomainImporter::new(&self.store)
            .process_import(files, import_type)
            .await;
        match imported {
            Ok(id) => {
                self.load_project(&id).await?;
                self.apply(Action::Route(Route::Domain));
                Ok(id)
            }
            Err(e) => {
                self.report(&e);
                self.apply(Action::Route(Route::Start));
                Err(e)
            }
        }
    }

    // =========================================================================
    // Drawers and editors
    // =========================================================================

    /// Save the editor of the selected `kind`
    ///
    /// Returns `false` when nothing is selected or the form is invalid.
    pub async fn save(&self, kind: NodeKind, editor: &impl EditorWidget) -> Result<bool> {
        let Some(selected) = self.state.borrow().selection.get(kind).cloned() else {
            return Ok(false);
        };
        if !editor.validate() {
            return Ok(false);
        }
        self.apply(Action::CloseDrawer { kind, pane: Pane::Editor });

        let changes = editor.changelog();
        let parent = selected.parent.as_deref();
        if !changes.is_empty() {
            self.store.patch(kind, &changes, &selected.id, parent).await?;
        }
        if let Some(view) = editor.view() {
            self.store.store_view_model(&selected.id, kind, view, parent).await?;
        }
        self.apply(Action::ClearSelection(kind));
        Ok(true)
    }

    /// Close a pane
    pub fn close_drawer(&self, kind: NodeKind, pane: Pane) {
        self.apply(Action::CloseDrawer { kind, pane });
    }

    /// Switch the details pane of `kind` to its editor
    pub fn edit_selected(&self, kind: NodeKind) {
        self.apply(Action::EditSelected(kind));
    }

    // =========================================================================
    // Errors and zoom
    // =========================================================================

    /// Show an error nobody else handled
    pub fn report(&self, error: &impl fmt::Display) {
        error!("{}", error);
        self.apply(Action::Alert(error.to_string()));
    }

    /// Dismiss the error dialog
    pub fn dismiss_alert(&self) {
        self.apply(Action::DismissAlert);
    }

    /// Zoom the designer in one step
    pub fn zoom_in(&self) {
        self.set_zoom(self.state.borrow().zoom + 1);
    }

    /// Zoom the designer out one step
    pub fn zoom_out(&self) {
        self.set_zoom(self.state.borrow().zoom - 1);
    }

    fn set_zoom(&self, zoom: i32) {
        self.apply(Action::Zoom(zoom));
        self.zoom.notify(zoom);
    }

    /// Wait for a burst of zoom changes to settle
    pub async fn zoom_settled(&self) -> Option<ShellSignal> {
        self.zoom.settled().await
    }

    /// Report a library error on the bus for other components
    pub fn publish_error(&self, error: &Error) {
        self.bus.report(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::NATIVE_IMPORT_TYPE;
    use crate::store::test_support::InstrumentedStore;
    use crate::store::MemoryStore;
    use crate::types::Change;
    use serde_json::json;

    type App = ModelingApp<MemoryStore>;

    fn app() -> App {
        let bus = EventBus::new();
        let store = MemoryStore::new(bus.clone());
        let persistence = StorePersistence::in_memory(store.clone(), bus.clone()).unwrap();
        ModelingApp::new(store, bus, persistence)
    }

    struct Form {
        valid: bool,
        changes: Vec<Change>,
        view: Option<Value>,
    }

    impl EditorWidget for Form {
        fn validate(&self) -> bool {
            self.valid
        }
        fn changelog(&self) -> Vec<Change> {
            self.changes.clone()
        }
        fn view(&self) -> Option<Value> {
            self.view.clone()
        }
    }

    #[tokio::test]
    async fn test_create_project_loads_root() {
        let app = app();
        assert_eq!(app.create_project("", None).await.unwrap(), None);

        let id = app.create_project("Shop", Some("orders")).await.unwrap().unwrap();
        let state = app.state();
        assert_eq!(state.route, Route::Domain);
        assert_eq!(state.project_id.as_deref(), Some(id.as_str()));
        assert_eq!(state.project_name(), "Shop");
        let root = state.root.unwrap();
        assert_eq!(root.node.name.as_deref(), Some(ROOT_MODULE_NAME));
        assert_eq!(state.module.map(|m| m.id), Some(root.node.id));
    }

    #[tokio::test]
    async fn test_created_module_reaches_cache_through_bus() {
        let app = app();
        app.listen().await;
        let id = app.create_project("Shop", None).await.unwrap().unwrap();
        let root_id = app.state().root_module_id.unwrap();
        app.drain().await;

        app.store().add_module(&root_id, ElementInfo::named("billing")).await.unwrap();
        assert_eq!(app.drain().await, 1);

        let state = app.state();
        let modules = state.root.unwrap().modules.unwrap();
        assert_eq!(modules[0].name.as_deref(), Some("billing"));
        assert!(state.selection.is_empty());
        assert_eq!(state.project_id, Some(id));
    }

    #[tokio::test]
    async fn test_same_project_fetches_once() {
        let bus = EventBus::new();
        let inner = MemoryStore::new(bus.clone());
        let pid = inner.add_project(ProjectInfo::default()).await.unwrap();
        inner.add_module(&pid, ElementInfo::named(ROOT_MODULE_NAME)).await.unwrap();
        let store = InstrumentedStore::new(inner);
        let persistence = StorePersistence::in_memory(store.clone(), bus.clone()).unwrap();
        let app = ModelingApp::new(store.clone(), bus, persistence);
        let mut rx = app.subscribe();

        app.select_project(Some(&pid)).await.unwrap();
        let reads = store.reads();
        assert!(rx.has_changed().unwrap());
        let _ = rx.borrow_and_update();

        app.select_project(Some(&pid)).await.unwrap();
        assert_eq!(store.reads(), reads);
        assert!(!rx.has_changed().unwrap());

        app.select_project(Some("")).await.unwrap();
        let state = app.state();
        assert!(state.project.is_none());
        assert!(state.root.is_none());
        assert!(state.module.is_none());
        assert!(state.root_module_id.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_project_load_is_dropped() {
        let bus = EventBus::new();
        let inner = MemoryStore::new(bus.clone());
        let slow = inner.add_project(ProjectInfo::default()).await.unwrap();
        let snapshot = inner.retrieve_store().await.unwrap();
        inner.init_store().await.unwrap();
        let fast = inner.add_project(ProjectInfo::default()).await.unwrap();
        // Both projects in one graph
        let mut merged = inner.retrieve_store().await.unwrap();
        merged["nodes"]
            .as_object_mut()
            .unwrap()
            .extend(snapshot["nodes"].as_object().unwrap().clone());
        inner.load_store(merged).await.unwrap();

        let store = InstrumentedStore::new(inner).with_slow_reads(&[slow.as_str()], Duration::from_millis(50));
        let persistence = StorePersistence::in_memory(store.clone(), bus.clone()).unwrap();
        let app = ModelingApp::new(store, bus, persistence);

        let (a, b) = tokio::join!(app.select_project(Some(&slow)), app.select_project(Some(&fast)));
        a.unwrap();
        b.unwrap();

        let state = app.state();
        assert_eq!(state.project_id.as_deref(), Some(fast.as_str()));
        assert_eq!(state.project.map(|p| p.id), Some(fast));
    }

    #[tokio::test]
    async fn test_save_patches_and_clears_selection() {
        let app = app();
        app.listen().await;
        let _ = app.create_project("Shop", None).await.unwrap();
        let root_id = app.state().root_module_id.unwrap();
        app.apply(Action::Modeling {
            action: ModelingAction::Edit,
            kind: NodeKind::Module,
            id: root_id.clone(),
            parent: None,
        });

        let invalid = Form { valid: false, changes: vec![], view: None };
        assert!(!app.save(NodeKind::Module, &invalid).await.unwrap());
        assert!(app.state().drawers.is_open(NodeKind::Module, Pane::Editor));

        let form = Form {
            valid: true,
            changes: vec![Change::replace("/name", "Core")],
            view: Some(json!({ "x": 1 })),
        };
        assert!(app.save(NodeKind::Module, &form).await.unwrap());

        let state = app.state();
        assert!(state.selection.get(NodeKind::Module).is_none());
        assert!(!state.drawers.any_open(NodeKind::Module));
        let module = app.store().get_module(&root_id).await.unwrap();
        assert_eq!(module.name.as_deref(), Some("Core"));
        assert_eq!(module.view, Some(json!({ "x": 1 })));
    }

    #[tokio::test]
    async fn test_delete_action_clears_matching_selection() {
        let app = app();
        app.listen().await;
        let _ = app.create_project("Shop", None).await.unwrap();
        let root_id = app.state().root_module_id.unwrap();
        let dm = app
            .store()
            .add(NodeKind::DataModel, &root_id, ElementInfo::named("Sales"))
            .await
            .unwrap();
        let e1 = app.store().add(NodeKind::Entity, &dm, ElementInfo::named("A")).await.unwrap();
        let e2 = app.store().add(NodeKind::Entity, &dm, ElementInfo::named("B")).await.unwrap();
        app.drain().await;
        app.apply(Action::Modeling {
            action: ModelingAction::View,
            kind: NodeKind::Entity,
            id: e1.clone(),
            parent: Some(dm.clone()),
        });

        let delete = |id: &str| NavigationEvent::Action {
            action: ModelingAction::Delete,
            property: NodeKind::Entity,
            selected: id.to_string(),
            parent: Some(dm.clone()),
        };
        app.dispatch(delete(&e2).into()).await.unwrap();
        assert_eq!(app.state().selection.id(NodeKind::Entity), Some(e1.as_str()));

        app.dispatch(delete(&e1).into()).await.unwrap();
        let state = app.state();
        assert!(state.selection.get(NodeKind::Entity).is_none());
        assert!(!state.drawers.any_open(NodeKind::Entity));
    }

    #[tokio::test]
    async fn test_import_failure_alerts_and_returns_to_start() {
        let app = app();
        let signal = ShellSignal::ImportProcessResult {
            import_type: "raml".into(),
            files: vec![ContentFile::new("api.raml", "#%RAML 1.0")],
        };
        app.handle_signal(signal).await.unwrap();

        let state = app.state();
        assert_eq!(state.route, Route::Start);
        assert_eq!(state.alert.as_deref(), Some("Unknown import format raml"));

        app.dismiss_alert();
        assert!(app.state().alert.is_none());
    }

    #[tokio::test]
    async fn test_import_does_not_duplicate_cached_children() {
        let app = app();
        app.listen().await;
        let dump = json!([
            { "@id": "top", "@type": ["Module"], "modules": [{ "@id": "child" }] },
            { "@id": "child", "@type": ["Module"], "name": "child" }
        ]);
        let files = [ContentFile::new("dump.json", dump.to_string())];
        app.import_files(&files, NATIVE_IMPORT_TYPE).await.unwrap();
        app.drain().await;

        let state = app.state();
        let root = state.root.unwrap();
        assert_eq!(root.id(), "top");
        let ids: Vec<_> = root.children(NodeKind::Module).iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["child"]);
        assert_eq!(root.children(NodeKind::Module)[0].name.as_deref(), Some("child"));
        assert!(state.selection.is_empty());
    }

    #[tokio::test]
    async fn test_rejection_on_bus_becomes_alert() {
        let app = app();
        app.listen().await;
        app.publish_error(&Error::InvalidChange("boom".into()));
        app.drain().await;
        assert_eq!(app.state().alert.as_deref(), Some("Invalid change: boom"));
    }

    #[tokio::test]
    async fn test_rename_and_restore() {
        let app = app();
        let id = app.create_project("Shop", None).await.unwrap().unwrap();
        app.edit_project_name();
        app.rename_project("Store").await.unwrap();
        assert_eq!(app.state().project_name(), "Store");
        assert!(!app.state().project_name_editor);

        app.select_project(None).await.unwrap();
        app.handle_signal(ShellSignal::Restore { id: id.clone() }).await.unwrap();
        let state = app.state();
        assert_eq!(state.route, Route::Domain);
        assert_eq!(state.project_name(), "Store");
    }

    #[tokio::test]
    async fn test_open_data_model_builds_designer() {
        let app = app();
        let _ = app.create_project("Shop", None).await.unwrap();
        let root_id = app.state().root_module_id.unwrap();
        let store = app.store();
        let dm = store.add(NodeKind::DataModel, &root_id, ElementInfo::named("Sales")).await.unwrap();
        let order = store.add(NodeKind::Entity, &dm, ElementInfo::named("Order")).await.unwrap();
        let link = ElementInfo { target: Some("amf://id#elsewhere".into()), ..ElementInfo::named("customer") };
        store.add(NodeKind::Association, &order, link).await.unwrap();

        app.dispatch(NavigationEvent::Change { selected: dm.clone(), kind: NodeKind::DataModel }.into())
            .await
            .unwrap();

        let state = app.state();
        assert_eq!(state.route, Route::Model);
        let designer = state.designer.unwrap();
        assert_eq!(designer.data_model_id, dm);
        assert_eq!(designer.external_targets(), vec!["amf://id#elsewhere"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zoom_is_debounced() {
        let app = app();
        app.zoom_in();
        app.zoom_in();
        app.zoom_out();
        app.zoom_in();
        assert_eq!(app.state().zoom, 2);
        assert_eq!(app.zoom_settled().await, Some(ShellSignal::ZoomChange { zoom: 2 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_handles_settled_zoom() {
        let app = app();
        app.listen().await;
        let driver = async {
            // A level raised only on the debouncer reaches state through the loop
            app.zoom.notify(5);
            tokio::time::sleep(Duration::from_millis(50)).await;
            assert_eq!(app.state().zoom, 5);

            let pending = tokio::time::timeout(Duration::from_millis(50), app.zoom_settled()).await;
            assert!(pending.is_err());
            app.unlisten();
        };
        tokio::join!(app.run(), driver);
        assert_eq!(app.state().zoom, 5);
    }
}
