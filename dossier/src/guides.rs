/// ## Getting started
///
/// An entity is a struct deriving [`Entity`](crate::Entity). It must:
/// - be a struct with named fields and no generic parameters
/// - implement [`Clone`] and [`Default`]
/// - have exactly one field of type [`EntityState`](crate::EntityState), marked
///   `#[entity(state)]`, which holds the id, the dirty state and the messages
/// - use field types that can be converted to and from BSON with `serde`.
///
/// The collection name is the snake-cased type name (`RobotPart` → `robot_part`),
/// prefixed with the [`Manager`](crate::Manager)'s source prefix.
///
/// ### Example
///
/// ```ignore
/// use dossier::prelude::*;
///
/// #[derive(Clone, Default, Entity)]
/// struct Robots {
///     #[entity(state)]
///     state: EntityState,
///     name: String,
///     year: i32,
/// }
/// ```
///
/// ### Creating a `Manager`
///
/// Every entity is bound to a [`Manager`](crate::Manager), which resolves connections through
/// its [`Container`](crate::Container). Connections are registered as named services; entity
/// types use the `mongo` service unless configured otherwise.
///
/// ```ignore
/// let container = Arc::new(Container::new());
/// container.set_shared("mongo", Arc::new(MongoConnection::with_uri_str(uri, "app")?));
///
/// let manager = Arc::new(Manager::with_container(container));
/// ```
///
/// [`MemoryConnection`](crate::MemoryConnection) implements the same interface in memory and
/// is what the test suites of this crate run against.
///
/// ### Method overview
///
/// Constructors and queries are associated functions of [`Entity`](crate::Entity) taking the
/// manager: `new`, `with_data`, `find`, `find_first`, `find_by_id`, `count`, `aggregate`.
///
/// The lifecycle lives on [`Record`](crate::Record): `save`, `create`, `update`, `delete`,
/// `exists`, plus attribute access (`read_attribute`, `write_attribute`, `assign`) and
/// serialization (`to_array`, `json_serialize`, `to_bytes`).
///
/// ### Per-type configuration
///
/// Put configuration into [`Hooks::initialize`](crate::Hooks::initialize), which the
/// manager runs once per type before the first instance is used:
///
/// ```ignore
/// #[derive(Clone, Default, Entity)]
/// #[entity(hooks)]
/// struct Robots { /* ... */ }
///
/// impl Hooks for Robots {
///     fn initialize(&mut self) -> dossier::Result<()> {
///         self.set_source("robots_archive")?;
///         self.use_implicit_object_ids(false)
///     }
/// }
/// ```
pub mod getting_started {}

/// ## Attributes
///
/// Fields can be customized with `#[entity(...)]`:
///
/// - `reserved` keeps the field out of the store and serialized output.
/// - `rename = "name"` sets the attribute name.
/// - `setter` routes [`assign`](crate::Record::assign) through `set_<field>`, `getter` routes
///   serialization through `get_<field>`. Both accept an explicit method name:
///   `setter = "store_password"`.
///
/// ```ignore
/// #[derive(Clone, Default, Entity)]
/// struct Users {
///     #[entity(state)]
///     state: EntityState,
///     #[entity(setter, getter)]
///     password: String,
///     #[entity(reserved)]
///     session: Option<String>,
/// }
///
/// impl Users {
///     fn set_password(&mut self, value: Bson) -> dossier::Result<()> {
///         self.password = hash(value.as_str().unwrap_or_default());
///         Ok(())
///     }
///
///     fn get_password(&self) -> dossier::Result<Bson> {
///         Ok(Bson::String("********".into()))
///     }
/// }
/// ```
///
/// `read_attribute` and `write_attribute` always bypass overrides.
///
/// ### Typed documents
///
/// Embedded values derive [`TypedDocument`](crate::TypedDocument). They are stored as nested
/// documents and can be used as entity field types:
///
/// ```ignore
/// #[derive(Clone, Default, TypedDocument)]
/// struct RobotPart {
///     name: String,
///     weight: Option<f64>,
/// }
/// ```
pub mod attributes {}

/// ## Lifecycle events
///
/// Saving runs these events in order, stopping at the first one that is canceled:
///
/// 1. `beforeValidation`, then `beforeValidationOnCreate` or `beforeValidationOnUpdate`
/// 2. `validation`; when it fails, `onValidationFails` is fired
/// 3. `afterValidationOnCreate` or `afterValidationOnUpdate`, then `afterValidation`
/// 4. `beforeSave`, then `beforeCreate` or `beforeUpdate`
/// 5. the store write
/// 6. `afterCreate` or `afterUpdate`, then `afterSave`; `notSaved` when the write failed
///
/// Deleting fires `beforeDelete`, then `afterDelete` or `notDeleted`.
///
/// Each event reaches, in order, the entity's own
/// [`Hooks::on_event`](crate::Hooks::on_event), the type's behaviors, the manager's events
/// manager and the type's custom events manager. The first `Some(false)` cancels.
///
/// ### Validation
///
/// ```ignore
/// impl Hooks for Robots {
///     fn on_event(&mut self, event: Event) -> Option<bool> {
///         if event != Event::Validation {
///             return None;
///         }
///
///         let valid = self.validate(&|record: &dyn Record| {
///             match record.read_attribute("year") {
///                 Ok(Some(Bson::Int32(year))) if year > 1900 => vec![],
///                 _ => vec![Message::new("year is invalid").field("year")],
///             }
///         });
///
///         Some(valid)
///     }
/// }
/// ```
///
/// ### Listeners
///
/// [`EventBus`](crate::EventBus) is a ready-made [`EventsManager`](crate::EventsManager).
/// Attach listeners to a channel (`collection`) or one event (`collection:beforeSave`):
///
/// ```ignore
/// let bus = EventBus::new();
/// bus.attach("collection:beforeSave", |_, record, _| {
///     Some(record.read_attribute("name").ok().flatten().is_some())
/// });
///
/// manager.set_events_manager(Arc::new(bus));
/// ```
///
/// Set [`Manager::disable_events`](crate::Manager::disable_events) to suppress every event
/// except `validation`.
pub mod lifecycle_events {}

/// ## Behaviors
///
/// A [`Behavior`](crate::Behavior) is notified of every event of the types it is attached
/// to and may resolve methods the entity does not implement. Two are provided.
///
/// ### `Timestampable`
///
/// Writes a timestamp on the events it is configured for. Each option takes a `field`
/// (one name or several) and an optional `strftime` `format`; without one, Unix seconds
/// are stored.
///
/// ```ignore
/// self.add_behavior(Timestampable::new(doc! {
///     "beforeCreate": { "field": "created_at", "format": "%Y-%m-%d" },
///     "beforeUpdate": { "field": ["updated_at", "touched_at"] },
/// }))?;
/// ```
///
/// ### `SoftDelete`
///
/// Turns `delete` into a save that flags the document instead:
///
/// ```ignore
/// self.add_behavior(SoftDelete::new("status", "deleted"))?;
///
/// robot.delete()?; // status is now "deleted", the document is still stored
/// ```
pub mod behaviors {}
