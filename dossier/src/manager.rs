use crate::{
    Behavior, Config, Connection, Container, Entity, Error, Event, EventsManager, Record, Result,
    event::{COLLECTION_CHANNEL, MANAGER_CHANNEL},
};
use dashmap::{DashMap, DashSet};
use heck::ToSnakeCase;
use mongodb::bson::Bson;
use parking_lot::{ReentrantMutex, RwLock};
use std::{
    any::type_name,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tracing::{debug, trace};

/// Container service connections are resolved from unless configured otherwise.
pub const DEFAULT_CONNECTION_SERVICE: &str = "mongo";

/// The registry shared by every entity type of a scope.
///
/// It holds per-type configuration (collection name, connection service, id policy, custom
/// events manager, behaviors), runs each type's [`Hooks::initialize`](crate::Hooks::initialize)
/// once, and dispatches lifecycle events. All caches are keyed by the exact
/// [`std::any::type_name`] of the entity type and are populated lazily; setting a value
/// twice simply overwrites it.
///
/// Entities keep an `Arc<Manager>`, so a manager lives as long as its entities do.
pub struct Manager {
    container: RwLock<Option<Arc<Container>>>,
    events_manager: RwLock<Option<Arc<dyn EventsManager>>>,
    custom_events_managers: DashMap<&'static str, Arc<dyn EventsManager>>,
    initialized: DashSet<&'static str>,
    initializing: ReentrantMutex<()>,
    in_progress: DashSet<&'static str>,
    last_initialized: RwLock<Option<&'static str>>,
    sources: DashMap<&'static str, String>,
    behaviors: DashMap<&'static str, Vec<Arc<dyn Behavior>>>,
    connection_services: DashMap<&'static str, String>,
    implicit_object_ids: DashMap<&'static str, bool>,
    service_name: RwLock<String>,
    prefix: RwLock<String>,
    events_disabled: AtomicBool,
}

impl Manager {
    pub fn new() -> Self {
        Self {
            container: RwLock::new(None),
            events_manager: RwLock::new(None),
            custom_events_managers: DashMap::new(),
            initialized: DashSet::new(),
            initializing: ReentrantMutex::new(()),
            in_progress: DashSet::new(),
            last_initialized: RwLock::new(None),
            sources: DashMap::new(),
            behaviors: DashMap::new(),
            connection_services: DashMap::new(),
            implicit_object_ids: DashMap::new(),
            service_name: RwLock::new(DEFAULT_CONNECTION_SERVICE.to_owned()),
            prefix: RwLock::new(String::new()),
            events_disabled: AtomicBool::new(false),
        }
    }

    pub fn with_container(container: Arc<Container>) -> Self {
        let manager = Self::new();
        manager.set_container(container);
        manager
    }

    pub fn from_config(config: &Config) -> Self {
        let manager = Self::new();
        manager.set_service_name(config.connection_service.clone());
        manager.set_source_prefix(config.source_prefix.clone());
        manager.disable_events(!config.events);
        manager
    }

    pub fn set_container(&self, container: Arc<Container>) {
        *self.container.write() = Some(container);
    }

    pub fn container(&self) -> Option<Arc<Container>> {
        self.container.read().clone()
    }

    pub fn set_events_manager(&self, events_manager: Arc<dyn EventsManager>) {
        *self.events_manager.write() = Some(events_manager);
    }

    pub fn events_manager(&self) -> Option<Arc<dyn EventsManager>> {
        self.events_manager.read().clone()
    }

    /// Runs the one-time setup of `T`, at most once per manager.
    ///
    /// Fires `collectionsManager:afterInitialize` on the global events manager and records
    /// `T` as the last initialized type. A failed setup is retried by the next instance.
    ///
    /// Setups are serialized: other threads constructing a type that is not set up yet wait
    /// until the running setup has finished. A setup constructing entities of its own type on the same thread
    /// sees that type as already set up.
    pub fn initialize<T: Entity>(&self, entity: &mut T) -> Result<()> {
        let type_name = type_name::<T>();

        if self.initialized.contains(type_name) {
            return Ok(());
        }

        let _guard = self.initializing.lock();

        if self.initialized.contains(type_name) || !self.in_progress.insert(type_name) {
            return Ok(());
        }

        debug!(entity = type_name, "initializing entity type");

        let result = crate::Hooks::initialize(entity);
        self.in_progress.remove(type_name);
        result?;

        self.initialized.insert(type_name);

        if let Some(events_manager) = self.events_manager() {
            events_manager.fire(&format!("{MANAGER_CHANNEL}:afterInitialize"), entity, None);
        }

        *self.last_initialized.write() = Some(type_name);

        Ok(())
    }

    pub fn is_initialized(&self, type_name: &str) -> bool {
        self.initialized.contains(type_name)
    }

    pub fn get_last_initialized(&self) -> Option<&'static str> {
        *self.last_initialized.read()
    }

    pub fn set_source<T: Entity>(&self, source: impl Into<String>) {
        self.set_source_for(type_name::<T>(), source.into());
    }

    /// The collection name of `T`, prefixed with the source prefix.
    pub fn get_source<T: Entity>(&self) -> Result<String> {
        self.source_for(type_name::<T>())
    }

    pub(crate) fn set_source_for(&self, type_name: &'static str, source: String) {
        debug!(entity = type_name, %source, "setting source");
        self.sources.insert(type_name, source);
    }

    pub(crate) fn source_for(&self, type_name: &'static str) -> Result<String> {
        let source = self
            .sources
            .entry(type_name)
            .or_insert_with(|| derive_source(type_name))
            .clone();

        let source = format!("{}{source}", self.prefix.read());

        if source.is_empty() {
            return Err(Error::EmptySource {
                type_name: type_name.to_owned(),
            });
        }

        Ok(source)
    }

    pub fn set_connection_service<T: Entity>(&self, service: impl Into<String>) {
        self.set_connection_service_for(type_name::<T>(), service.into());
    }

    pub fn get_connection_service<T: Entity>(&self) -> String {
        self.connection_service_for(type_name::<T>())
    }

    pub(crate) fn set_connection_service_for(&self, type_name: &'static str, service: String) {
        self.connection_services.insert(type_name, service);
    }

    pub(crate) fn connection_service_for(&self, type_name: &str) -> String {
        self.connection_services
            .get(type_name)
            .map_or_else(|| self.service_name(), |service| service.value().clone())
    }

    pub fn get_connection<T: Entity>(&self) -> Result<Arc<dyn Connection>> {
        self.connection_for(type_name::<T>())
    }

    pub(crate) fn connection_for(&self, type_name: &str) -> Result<Arc<dyn Connection>> {
        let service = self.connection_service_for(type_name);

        let container = self.container().ok_or(Error::NoContainer)?;

        container
            .get_shared(&service)
            .ok_or(Error::InvalidConnection { service })
    }

    pub fn set_custom_events_manager<T: Entity>(&self, events_manager: Arc<dyn EventsManager>) {
        self.set_custom_events_manager_for(type_name::<T>(), events_manager);
    }

    pub fn get_custom_events_manager<T: Entity>(&self) -> Option<Arc<dyn EventsManager>> {
        self.custom_events_manager_for(type_name::<T>())
    }

    pub(crate) fn set_custom_events_manager_for(
        &self,
        type_name: &'static str,
        events_manager: Arc<dyn EventsManager>,
    ) {
        self.custom_events_managers.insert(type_name, events_manager);
    }

    pub(crate) fn custom_events_manager_for(
        &self,
        type_name: &str,
    ) -> Option<Arc<dyn EventsManager>> {
        self.custom_events_managers
            .get(type_name)
            .map(|events_manager| Arc::clone(events_manager.value()))
    }

    /// Whether string ids of `T` are converted to `ObjectId`s. Defaults to `true`.
    pub fn use_implicit_object_ids<T: Entity>(&self, implicit: bool) {
        self.use_implicit_object_ids_for(type_name::<T>(), implicit);
    }

    pub fn is_using_implicit_object_ids<T: Entity>(&self) -> bool {
        self.implicit_object_ids_for(type_name::<T>())
    }

    pub(crate) fn use_implicit_object_ids_for(&self, type_name: &'static str, implicit: bool) {
        self.implicit_object_ids.insert(type_name, implicit);
    }

    pub(crate) fn implicit_object_ids_for(&self, type_name: &str) -> bool {
        self.implicit_object_ids
            .get(type_name)
            .is_none_or(|implicit| *implicit)
    }

    /// Appends a behavior to the ones notified for `T`.
    pub fn add_behavior<T: Entity>(&self, behavior: impl Behavior + 'static) {
        self.add_behavior_for(type_name::<T>(), Arc::new(behavior));
    }

    pub fn behaviors<T: Entity>(&self) -> Vec<Arc<dyn Behavior>> {
        self.behaviors_for(type_name::<T>())
    }

    pub(crate) fn add_behavior_for(&self, type_name: &'static str, behavior: Arc<dyn Behavior>) {
        self.behaviors.entry(type_name).or_default().push(behavior);
    }

    fn behaviors_for(&self, type_name: &str) -> Vec<Arc<dyn Behavior>> {
        self.behaviors
            .get(type_name)
            .map(|behaviors| behaviors.value().clone())
            .unwrap_or_default()
    }

    /// Dispatches `event` to the behaviors of the entity's type, then to the global events
    /// manager, then to the type's custom events manager.
    ///
    /// The first `Some(false)` stops the dispatch and is returned. Otherwise the answer of the
    /// last events manager that answered is returned.
    pub fn notify_event(&self, event: Event, record: &mut dyn Record) -> Result<Option<bool>> {
        let type_name = record.type_name();

        for behavior in self.behaviors_for(type_name) {
            if behavior.notify(event, &mut *record)? == Some(false) {
                trace!(entity = type_name, %event, "behavior canceled the operation");
                return Ok(Some(false));
            }
        }

        let name = format!("{COLLECTION_CHANNEL}:{event}");
        let mut status = None;

        let events_managers = self
            .events_manager()
            .into_iter()
            .chain(self.custom_events_manager_for(type_name));

        for events_manager in events_managers {
            match events_manager.fire(&name, &mut *record, None) {
                Some(false) => {
                    trace!(entity = type_name, %event, "listener canceled the operation");
                    return Ok(Some(false));
                }
                Some(true) => status = Some(true),
                None => {}
            }
        }

        Ok(status)
    }

    /// Resolves a method the entity does not implement.
    ///
    /// Behaviors are asked in registration order and the first answer wins. Otherwise the
    /// call is fired as `collection:<method>` on the global events manager with the arguments
    /// as data. `None` means nobody handled it.
    pub fn missing_method(
        &self,
        record: &mut dyn Record,
        method: &str,
        arguments: &[Bson],
    ) -> Result<Option<Bson>> {
        for behavior in self.behaviors_for(record.type_name()) {
            if let Some(result) = behavior.missing_method(&mut *record, method, arguments)? {
                return Ok(Some(result));
            }
        }

        let Some(events_manager) = self.events_manager() else {
            return Ok(None);
        };

        let data = Bson::Array(arguments.to_vec());

        Ok(events_manager
            .fire(&format!("{COLLECTION_CHANNEL}:{method}"), record, Some(&data))
            .map(Bson::Boolean))
    }

    pub fn service_name(&self) -> String {
        self.service_name.read().clone()
    }

    /// Sets the default connection service of types without an explicit one.
    pub fn set_service_name(&self, service: impl Into<String>) {
        *self.service_name.write() = service.into();
    }

    pub fn source_prefix(&self) -> String {
        self.prefix.read().clone()
    }

    pub fn set_source_prefix(&self, prefix: impl Into<String>) {
        *self.prefix.write() = prefix.into();
    }

    /// Suppresses every lifecycle event except the mandatory `validation`.
    pub fn disable_events(&self, disabled: bool) {
        self.events_disabled.store(disabled, Ordering::SeqCst);
    }

    pub fn are_events_disabled(&self) -> bool {
        self.events_disabled.load(Ordering::SeqCst)
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("service_name", &*self.service_name.read())
            .field("prefix", &*self.prefix.read())
            .field("initialized", &self.initialized.len())
            .field("events_disabled", &self.are_events_disabled())
            .finish_non_exhaustive()
    }
}

/// `app::models::RobotPart<T>` becomes `robot_part`.
fn derive_source(type_name: &str) -> String {
    let path = type_name.split('<').next().unwrap_or(type_name);
    let short_name = path.rsplit("::").next().unwrap_or(path);

    short_name.to_snake_case()
}
