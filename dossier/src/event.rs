//! Lifecycle events and the listener bus they are published on.
//!
//! Events are published under `<channel>:<event>` names, e.g. `collection:beforeSave` or
//! `collectionsManager:afterInitialize`. A listener attached to the bare channel name
//! receives every event of that channel.

use crate::Record;
use dashmap::DashMap;
use mongodb::bson::Bson;
use std::{fmt, sync::Arc};
use tracing::trace;

/// Channel lifecycle events are published on.
pub const COLLECTION_CHANNEL: &str = "collection";

/// Channel of registry notifications.
pub const MANAGER_CHANNEL: &str = "collectionsManager";

/// A lifecycle event of an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    BeforeValidation,
    BeforeValidationOnCreate,
    BeforeValidationOnUpdate,
    Validation,
    OnValidationFails,
    AfterValidationOnCreate,
    AfterValidationOnUpdate,
    AfterValidation,
    BeforeSave,
    BeforeCreate,
    BeforeUpdate,
    AfterCreate,
    AfterUpdate,
    AfterSave,
    NotSaved,
    BeforeDelete,
    AfterDelete,
    NotDeleted,
}

impl Event {
    pub const ALL: [Event; 18] = [
        Self::BeforeValidation,
        Self::BeforeValidationOnCreate,
        Self::BeforeValidationOnUpdate,
        Self::Validation,
        Self::OnValidationFails,
        Self::AfterValidationOnCreate,
        Self::AfterValidationOnUpdate,
        Self::AfterValidation,
        Self::BeforeSave,
        Self::BeforeCreate,
        Self::BeforeUpdate,
        Self::AfterCreate,
        Self::AfterUpdate,
        Self::AfterSave,
        Self::NotSaved,
        Self::BeforeDelete,
        Self::AfterDelete,
        Self::NotDeleted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BeforeValidation => "beforeValidation",
            Self::BeforeValidationOnCreate => "beforeValidationOnCreate",
            Self::BeforeValidationOnUpdate => "beforeValidationOnUpdate",
            Self::Validation => "validation",
            Self::OnValidationFails => "onValidationFails",
            Self::AfterValidationOnCreate => "afterValidationOnCreate",
            Self::AfterValidationOnUpdate => "afterValidationOnUpdate",
            Self::AfterValidation => "afterValidation",
            Self::BeforeSave => "beforeSave",
            Self::BeforeCreate => "beforeCreate",
            Self::BeforeUpdate => "beforeUpdate",
            Self::AfterCreate => "afterCreate",
            Self::AfterUpdate => "afterUpdate",
            Self::AfterSave => "afterSave",
            Self::NotSaved => "notSaved",
            Self::BeforeDelete => "beforeDelete",
            Self::AfterDelete => "afterDelete",
            Self::NotDeleted => "notDeleted",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.as_str() == name)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver of published events.
///
/// `Some(false)` cancels the operation that published the event; `Some(true)` and `None`
/// let it continue.
pub trait EventsManager: Send + Sync {
    fn fire(&self, event: &str, subject: &mut dyn Record, data: Option<&Bson>) -> Option<bool>;
}

pub type Listener = Arc<dyn Fn(&str, &mut dyn Record, Option<&Bson>) -> Option<bool> + Send + Sync>;

/// A listener registry keyed by channel or full event name.
///
/// # Example
///
/// ```ignore
/// let bus = EventBus::new();
///
/// bus.attach("collection:beforeSave", |_, record, _| {
///     Some(record.read_attribute("name").ok().flatten().is_some())
/// });
///
/// manager.set_events_manager(Arc::new(bus));
/// ```
#[derive(Default)]
pub struct EventBus {
    listeners: DashMap<String, Vec<Listener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a listener to a channel (`collection`) or to one event (`collection:afterSave`).
    pub fn attach<F>(&self, name: impl Into<String>, listener: F)
    where
        F: Fn(&str, &mut dyn Record, Option<&Bson>) -> Option<bool> + Send + Sync + 'static,
    {
        self.listeners
            .entry(name.into())
            .or_default()
            .push(Arc::new(listener));
    }

    pub fn detach_all(&self, name: &str) {
        self.listeners.remove(name);
    }

    pub fn has_listeners(&self, name: &str) -> bool {
        self.listeners
            .get(name)
            .is_some_and(|listeners| !listeners.is_empty())
    }

    fn listeners_for(&self, name: &str) -> Vec<Listener> {
        self.listeners
            .get(name)
            .map(|listeners| listeners.value().clone())
            .unwrap_or_default()
    }
}

impl EventsManager for EventBus {
    fn fire(&self, event: &str, subject: &mut dyn Record, data: Option<&Bson>) -> Option<bool> {
        let mut listeners = match event.split_once(':') {
            Some((channel, _)) => self.listeners_for(channel),
            None => Vec::new(),
        };
        listeners.extend(self.listeners_for(event));

        trace!(event, listeners = listeners.len(), "firing event");

        let mut status = None;

        for listener in listeners {
            match listener(event, &mut *subject, data) {
                Some(false) => return Some(false),
                Some(true) => status = Some(true),
                None => {}
            }
        }

        status
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("names", &self.listeners.len())
            .finish()
    }
}
