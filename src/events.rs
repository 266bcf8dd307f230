// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Event bus carrying domain mutations, navigation intents and unhandled errors
//!
//! The bus is an explicitly constructed value handed to every component that
//! needs it. Each component owns a [`Listener`] that tracks its own
//! subscription, so subscribing twice is a no-op.

use crate::import::ContentFile;
use crate::types::{NodeKind, Route};
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, warn};

/// Bus buffer size; slower receivers past this many events lag
const EVENT_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// Events
// =============================================================================

/// What happened to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Record was created
    Created,
    /// Record was updated
    Updated,
    /// Record was deleted
    Deleted,
}

impl ChangeKind {
    /// Lowercase name used in event types
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

/// Notification that the domain store changed a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEvent {
    /// Kind of the changed record
    pub kind: NodeKind,
    /// What happened
    pub change: ChangeKind,
    /// Record id
    pub id: String,
    /// Enclosing record id, when known
    pub parent: Option<String>,
}

impl DomainEvent {
    /// A `created` event
    #[must_use]
    pub fn created(kind: NodeKind, id: impl Into<String>, parent: Option<String>) -> Self {
        Self { kind, change: ChangeKind::Created, id: id.into(), parent }
    }

    /// An `updated` event
    #[must_use]
    pub fn updated(kind: NodeKind, id: impl Into<String>, parent: Option<String>) -> Self {
        Self { kind, change: ChangeKind::Updated, id: id.into(), parent }
    }

    /// A `deleted` event
    #[must_use]
    pub fn deleted(kind: NodeKind, id: impl Into<String>, parent: Option<String>) -> Self {
        Self { kind, change: ChangeKind::Deleted, id: id.into(), parent }
    }

    /// Event type name, e.g. `State.Module.created`
    #[must_use]
    pub fn event_type(&self) -> String {
        format!("State.{}.{}", self.kind.event_name(), self.change.as_str())
    }
}

/// Action requested on a graph element from a navigation widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelingAction {
    /// Show details
    View,
    /// Open the editor
    Edit,
    /// Remove the element
    Delete,
}

impl ModelingAction {
    /// Parse an action name
    #[must_use]
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "view" => Some(Self::View),
            "edit" => Some(Self::Edit),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    /// Action name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }
}

/// Selection and action intents from navigation widgets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationEvent {
    /// An element was selected in the navigation tree
    Change {
        /// Selected id
        selected: String,
        /// Kind of the selected element
        kind: NodeKind,
    },
    /// An action was requested on an element
    Action {
        /// Requested action
        action: ModelingAction,
        /// Kind of the target element
        property: NodeKind,
        /// Target id
        selected: String,
        /// Enclosing element id
        parent: Option<String>,
    },
}

impl NavigationEvent {
    /// Event type name
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Change { .. } => "State.Navigation.change",
            Self::Action { .. } => "State.Navigation.action",
        }
    }
}

/// Anything carried by the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// Domain store mutation
    Domain(DomainEvent),
    /// Navigation intent
    Navigation(NavigationEvent),
    /// Error raised inside a fire-and-forget handler
    Rejection(String),
}

impl BusEvent {
    /// Event type name used for logging
    #[must_use]
    pub fn event_type(&self) -> String {
        match self {
            Self::Domain(e) => e.event_type(),
            Self::Navigation(e) => e.event_type().to_string(),
            Self::Rejection(_) => "unhandledrejection".to_string(),
        }
    }
}

impl From<DomainEvent> for BusEvent {
    fn from(event: DomainEvent) -> Self {
        Self::Domain(event)
    }
}

impl From<NavigationEvent> for BusEvent {
    fn from(event: NavigationEvent) -> Self {
        Self::Navigation(event)
    }
}

// =============================================================================
// Shell signals
// =============================================================================

/// Signals raised by page components towards the application shell
#[derive(Debug, Clone, PartialEq)]
pub enum ShellSignal {
    /// The user asked for a new project
    NewProjectRequested,
    /// The user asked for the import screen
    ImportRequested,
    /// The user picked a recent project
    Restore {
        /// Project id
        id: String,
    },
    /// The import screen finished reading files
    ImportProcessResult {
        /// Import data type, e.g. `ld+graph`
        import_type: String,
        /// File contents
        files: Vec<ContentFile>,
    },
    /// A component requested a route change
    Navigate {
        /// Target route
        route: Route,
        /// Route parameters
        params: BTreeMap<String, String>,
    },
    /// The designer zoom settled
    ZoomChange {
        /// Latest zoom level
        zoom: i32,
    },
}

impl ShellSignal {
    /// Signal name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewProjectRequested => "newprojectrequested",
            Self::ImportRequested => "importrequested",
            Self::Restore { .. } => "restore",
            Self::ImportProcessResult { .. } => "importprocessresult",
            Self::Navigate { .. } => "navigate",
            Self::ZoomChange { .. } => "zoomchange",
        }
    }
}

// =============================================================================
// Bus
// =============================================================================

/// Publish/subscribe channel shared by the shell, the store and the
/// persistence mirror
///
/// Cheaply cloneable; all clones publish into the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a bus with the default buffer
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(EVENT_CHANNEL_CAPACITY)
    }

    /// Create a bus buffering up to `capacity` events per receiver
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Returns the number of receivers that will see it.
    pub fn publish(&self, event: impl Into<BusEvent>) -> usize {
        let event = event.into();
        debug!("publish {}", event.event_type());
        // No receivers is not an error: nobody is listening yet.
        self.sender.send(event).unwrap_or(0)
    }

    /// Report an error that no caller will handle
    pub fn report(&self, error: &impl fmt::Display) -> usize {
        self.publish(BusEvent::Rejection(error.to_string()))
    }

    /// Get a new receiver for events published from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }
}

// =============================================================================
// Listener
// =============================================================================

/// A component's subscription to the bus
pub struct Listener {
    bus: EventBus,
    listening: watch::Sender<bool>,
    receiver: Mutex<Option<broadcast::Receiver<BusEvent>>>,
}

impl Listener {
    /// Create an inactive listener on `bus`
    #[must_use]
    pub fn new(bus: EventBus) -> Self {
        let (listening, _) = watch::channel(false);
        Self {
            bus,
            listening,
            receiver: Mutex::new(None),
        }
    }

    /// Start receiving events. Returns `false` when already listening.
    pub async fn listen(&self) -> bool {
        if self.is_listening() {
            return false;
        }
        let mut slot = self.receiver.lock().await;
        if slot.is_none() {
            *slot = Some(self.bus.subscribe());
        }
        self.listening.send_replace(true);
        true
    }

    /// Stop receiving events. A pending [`next`](Self::next) returns `None`.
    pub fn unlisten(&self) {
        self.listening.send_replace(false);
        if let Ok(mut slot) = self.receiver.try_lock() {
            *slot = None;
        }
    }

    /// Whether the listener is subscribed
    #[must_use]
    pub fn is_listening(&self) -> bool {
        *self.listening.borrow()
    }

    /// Wait for the next event. `None` once unlistened or the bus is gone.
    pub async fn next(&self) -> Option<BusEvent> {
        let mut stopped = self.listening.subscribe();
        let mut slot = self.receiver.lock().await;
        loop {
            let rx = slot.as_mut()?;
            let received = tokio::select! {
                received = rx.recv() => Some(received),
                _ = stopped.wait_for(|listening| !*listening) => None,
            };
            match received {
                None | Some(Err(RecvError::Closed)) => {
                    *slot = None;
                    return None;
                }
                Some(Ok(event)) => return Some(event),
                Some(Err(RecvError::Lagged(skipped))) => {
                    warn!("Listener lagged behind the bus, {} events skipped", skipped);
                }
            }
        }
    }

    /// Take the next already-published event without waiting
    pub async fn try_next(&self) -> Option<BusEvent> {
        let mut slot = self.receiver.lock().await;
        loop {
            let rx = slot.as_mut()?;
            match rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Listener lagged behind the bus, {} events skipped", skipped);
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Closed) => {
                    *slot = None;
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        let created = DomainEvent::created(NodeKind::DataModel, "dm1", Some("m1".into()));
        assert_eq!(created.event_type(), "State.Model.created");
        let deleted = DomainEvent::deleted(NodeKind::Association, "a1", None);
        assert_eq!(deleted.event_type(), "State.Association.deleted");
    }

    #[tokio::test]
    async fn test_listen_is_idempotent() {
        let bus = EventBus::new();
        let listener = Listener::new(bus.clone());

        assert!(listener.listen().await);
        assert!(!listener.listen().await);

        bus.publish(DomainEvent::deleted(NodeKind::Module, "m1", None));
        assert!(listener.try_next().await.is_some());
        // A second subscription would have delivered the event twice.
        assert!(listener.try_next().await.is_none());
    }

    #[tokio::test]
    async fn test_unlisten_stops_delivery() {
        let bus = EventBus::new();
        let listener = Listener::new(bus.clone());
        listener.listen().await;
        listener.unlisten();

        bus.publish(DomainEvent::deleted(NodeKind::Module, "m1", None));
        assert!(!listener.is_listening());
        assert!(listener.try_next().await.is_none());
        assert!(listener.next().await.is_none());
    }

    #[tokio::test]
    async fn test_next_receives_in_order() {
        let bus = EventBus::new();
        let listener = Listener::new(bus.clone());
        listener.listen().await;

        bus.publish(DomainEvent::created(NodeKind::Entity, "e1", None));
        bus.publish(DomainEvent::created(NodeKind::Entity, "e2", None));

        let first = listener.next().await;
        let second = listener.next().await;
        assert!(matches!(first, Some(BusEvent::Domain(e)) if e.id == "e1"));
        assert!(matches!(second, Some(BusEvent::Domain(e)) if e.id == "e2"));
    }

    #[tokio::test]
    async fn test_report_publishes_rejection() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.report(&"boom");
        assert_eq!(rx.recv().await.ok(), Some(BusEvent::Rejection("boom".into())));
    }
}
