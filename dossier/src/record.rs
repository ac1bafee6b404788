use crate::{
    Behavior, CollectionHandle, Connection, DirtyState, Entity, Error, Event, EventsManager,
    Manager, Message, Operation, Result, Validator,
    attributes::{self, ColumnMap},
    id,
    validation::ValidationResult,
};
use mongodb::bson::{self, Bson, Document, doc};
use std::{any::Any, collections::BTreeSet, sync::Arc};
use tracing::{debug, trace, warn};

/// The lifecycle surface of an entity, usable behind `&mut dyn Record`.
///
/// Implemented for every [`Entity`]. Behaviors and event listeners receive entities as
/// `&mut dyn Record`.
///
/// # Lifecycle
///
/// An entity starts [`DirtyState::Transient`], becomes [`DirtyState::Persistent`] once the
/// store acknowledged a write or confirmed it exists, and [`DirtyState::Detached`] once it
/// was deleted. Failed operations leave the state as it was.
///
/// Validation failures, canceled events and unacknowledged writes are reported as
/// `Ok(false)` with [`Record::messages`] describing them. Configuration and driver errors
/// are returned as `Err`.
pub trait Record: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn collections_manager(&self) -> Result<Arc<Manager>>;

    /// The id, unless unset or empty.
    fn id(&self) -> Option<&Bson>;

    /// Sets the id, converting strings to `ObjectId`s when implicit object ids are enabled.
    fn set_id(&mut self, id: Bson) -> Result<()>;

    fn dirty_state(&self) -> DirtyState;

    fn set_dirty_state(&mut self, dirty_state: DirtyState);

    fn operation_made(&self) -> Operation;

    fn messages(&self) -> &[Message];

    fn append_message(&mut self, message: Message);

    /// Makes the running operation report success without writing to the store.
    fn skip_operation(&mut self, skip: bool);

    fn is_skipped(&self) -> bool;

    fn reserved_attributes(&self) -> BTreeSet<&'static str>;

    /// Whether `name` is `_id` or a declared field.
    fn has_attribute(&self, name: &str) -> bool;

    /// Raw value of a declared field; `_id` reads the id.
    fn read_attribute(&self, name: &str) -> Result<Option<Bson>>;

    /// Raw write of a declared field, bypassing setters; `_id` writes the id as given.
    /// Undeclared names are ignored.
    fn write_attribute(&mut self, name: &str, value: Bson) -> Result<()>;

    fn assign(&mut self, data: Document) -> Result<&mut Self>
    where
        Self: Sized;

    /// Assigns `data` through declared setters.
    ///
    /// Keys are first renamed through `column_map`, dropping unmapped ones, then limited to
    /// `whitelist`. Reserved, undeclared and null entries are ignored.
    fn assign_with(
        &mut self,
        data: Document,
        column_map: Option<&ColumnMap>,
        whitelist: Option<&[&str]>,
    ) -> Result<&mut Self>
    where
        Self: Sized;

    /// Persistent fields with raw values, `_id` first when set.
    fn to_array(&self) -> Result<Document>;

    /// Like [`Record::to_array`] with `_id` stringified and values read through getters.
    fn to_serialized(&self) -> Result<Document>;

    fn json_serialize(&self) -> Result<serde_json::Value>;

    /// [`Record::to_array`] encoded as BSON bytes.
    fn to_bytes(&self) -> Result<Vec<u8>>;

    fn source(&self) -> Result<String>;

    fn set_source(&self, source: &str) -> Result<()>;

    /// The connection of the entity's type, resolved once per instance.
    fn connection(&mut self) -> Result<Arc<dyn Connection>>;

    fn connection_service(&self) -> Result<String>;

    fn set_connection_service(&self, service: &str) -> Result<()>;

    fn use_implicit_object_ids(&self, implicit: bool) -> Result<()>;

    fn is_using_implicit_object_ids(&self) -> Result<bool>;

    fn add_behavior(&self, behavior: impl Behavior + 'static) -> Result<()>
    where
        Self: Sized;

    fn set_custom_events_manager(&self, events_manager: Arc<dyn EventsManager>) -> Result<()>;

    /// Runs the entity's own hook, then notifies the manager. Returns the manager's answer,
    /// `false` when nobody answered.
    fn fire_event(&mut self, event: Event) -> Result<bool>;

    /// Like [`Record::fire_event`], but only an explicit `false` from the hook or the manager
    /// yields `false`.
    fn fire_event_cancel(&mut self, event: Event) -> Result<bool>;

    /// Forwards a call the entity does not implement to its behaviors and events manager.
    fn missing_method(&mut self, method: &str, arguments: &[Bson]) -> Result<Option<Bson>>;

    /// Runs `validator`, appending the messages it returns. `true` when valid.
    fn validate(&mut self, validator: &dyn Validator) -> bool;

    fn create(&mut self) -> Result<bool>;

    fn update(&mut self) -> Result<bool>;

    fn save(&mut self) -> Result<bool>;

    fn delete(&mut self) -> Result<bool>;

    /// Whether the document exists in the store, caching the answer in the dirty state.
    fn exists(&mut self) -> Result<bool>;

    fn clone_record(&self) -> Box<dyn Record>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Entity> Record for T {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn collections_manager(&self) -> Result<Arc<Manager>> {
        self.state().manager.clone().ok_or(Error::Unbound {
            type_name: std::any::type_name::<T>(),
        })
    }

    fn id(&self) -> Option<&Bson> {
        self.state().id()
    }

    fn set_id(&mut self, id: Bson) -> Result<()> {
        let implicit = self.is_using_implicit_object_ids()?;
        self.state_mut().id = Some(id::normalize(id, implicit)?);

        Ok(())
    }

    fn dirty_state(&self) -> DirtyState {
        self.state().dirty_state
    }

    fn set_dirty_state(&mut self, dirty_state: DirtyState) {
        self.state_mut().dirty_state = dirty_state;
    }

    fn operation_made(&self) -> Operation {
        self.state().operation_made
    }

    fn messages(&self) -> &[Message] {
        &self.state().error_messages
    }

    fn append_message(&mut self, message: Message) {
        self.state_mut().error_messages.push(message);
    }

    fn skip_operation(&mut self, skip: bool) {
        self.state_mut().skipped = skip;
    }

    fn is_skipped(&self) -> bool {
        self.state().skipped
    }

    fn reserved_attributes(&self) -> BTreeSet<&'static str> {
        T::schema().reserved_attributes()
    }

    fn has_attribute(&self, name: &str) -> bool {
        name == "_id" || T::schema().field(name).is_some()
    }

    fn read_attribute(&self, name: &str) -> Result<Option<Bson>> {
        if name == "_id" {
            return Ok(self.state().id.clone());
        }

        self.read_field(name)
    }

    fn write_attribute(&mut self, name: &str, value: Bson) -> Result<()> {
        if name == "_id" {
            self.state_mut().id = Some(value);
            return Ok(());
        }

        if !self.write_field(name, value)? {
            trace!(entity = self.type_name(), attribute = name, "ignoring undeclared attribute");
        }

        Ok(())
    }

    fn assign(&mut self, data: Document) -> Result<&mut Self> {
        attributes::assign(self, data, None, None)?;

        Ok(self)
    }

    fn assign_with(
        &mut self,
        data: Document,
        column_map: Option<&ColumnMap>,
        whitelist: Option<&[&str]>,
    ) -> Result<&mut Self> {
        attributes::assign(self, data, column_map, whitelist)?;

        Ok(self)
    }

    fn to_array(&self) -> Result<Document> {
        let mut document = Document::new();

        if let Some(id) = self.id() {
            document.insert("_id", id.clone());
        }

        attributes::raw_fields(self, &mut document)?;

        Ok(document)
    }

    fn to_serialized(&self) -> Result<Document> {
        let mut document = Document::new();

        if let Some(id) = self.id() {
            document.insert("_id", id::stringify(id));
        }

        attributes::serialized_fields(self, &mut document)?;

        Ok(document)
    }

    fn json_serialize(&self) -> Result<serde_json::Value> {
        Ok(Bson::Document(self.to_serialized()?).into_relaxed_extjson())
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bson::to_vec(&self.to_array()?)?)
    }

    fn source(&self) -> Result<String> {
        self.collections_manager()?.source_for(self.type_name())
    }

    fn set_source(&self, source: &str) -> Result<()> {
        self.collections_manager()?
            .set_source_for(self.type_name(), source.to_owned());

        Ok(())
    }

    fn connection(&mut self) -> Result<Arc<dyn Connection>> {
        if let Some(connection) = &self.state().connection {
            return Ok(Arc::clone(connection));
        }

        let connection = self
            .collections_manager()?
            .connection_for(self.type_name())?;
        self.state_mut().connection = Some(Arc::clone(&connection));

        Ok(connection)
    }

    fn connection_service(&self) -> Result<String> {
        Ok(self
            .collections_manager()?
            .connection_service_for(self.type_name()))
    }

    fn set_connection_service(&self, service: &str) -> Result<()> {
        self.collections_manager()?
            .set_connection_service_for(self.type_name(), service.to_owned());

        Ok(())
    }

    fn use_implicit_object_ids(&self, implicit: bool) -> Result<()> {
        self.collections_manager()?
            .use_implicit_object_ids_for(self.type_name(), implicit);

        Ok(())
    }

    fn is_using_implicit_object_ids(&self) -> Result<bool> {
        Ok(self
            .collections_manager()?
            .implicit_object_ids_for(self.type_name()))
    }

    fn add_behavior(&self, behavior: impl Behavior + 'static) -> Result<()> {
        self.collections_manager()?
            .add_behavior_for(self.type_name(), Arc::new(behavior));

        Ok(())
    }

    fn set_custom_events_manager(&self, events_manager: Arc<dyn EventsManager>) -> Result<()> {
        self.collections_manager()?
            .set_custom_events_manager_for(self.type_name(), events_manager);

        Ok(())
    }

    fn fire_event(&mut self, event: Event) -> Result<bool> {
        self.on_event(event);

        let status = self.collections_manager()?.notify_event(event, self)?;

        Ok(status.unwrap_or(false))
    }

    fn fire_event_cancel(&mut self, event: Event) -> Result<bool> {
        if self.on_event(event) == Some(false) {
            trace!(entity = self.type_name(), %event, "canceled by the entity");
            return Ok(false);
        }

        let status = self.collections_manager()?.notify_event(event, self)?;

        Ok(status != Some(false))
    }

    fn missing_method(&mut self, method: &str, arguments: &[Bson]) -> Result<Option<Bson>> {
        self.collections_manager()?
            .missing_method(self, method, arguments)
    }

    fn validate(&mut self, validator: &dyn Validator) -> bool {
        match validator.validate(&*self) {
            ValidationResult::Bool(valid) => valid,
            ValidationResult::Messages(messages) => {
                let valid = messages.is_empty();

                for message in messages {
                    self.append_message(message);
                }

                valid
            }
        }
    }

    fn create(&mut self) -> Result<bool> {
        let collection = prepare_cu(self)?;
        let disable_events = begin(self, Operation::Create)?;

        if !pre_save(self, disable_events, false)? {
            return Ok(false);
        }

        if take_skipped(self) {
            return Ok(true);
        }

        let success = insert(self, collection.as_ref())?;

        post_save(self, disable_events, success, false)
    }

    fn update(&mut self) -> Result<bool> {
        let collection = prepare_cu(self)?;

        if !exists_in(self, collection.as_ref())? {
            return Err(Error::NotFound {
                operation: "updated",
            });
        }

        let disable_events = begin(self, Operation::Update)?;

        if !pre_save(self, disable_events, true)? {
            return Ok(false);
        }

        if take_skipped(self) {
            return Ok(true);
        }

        let success = replace(self, collection.as_ref())?;

        post_save(self, disable_events, success, true)
    }

    fn save(&mut self) -> Result<bool> {
        let collection = prepare_cu(self)?;
        let exists = exists_in(self, collection.as_ref())?;

        let operation = if exists {
            Operation::Update
        } else {
            Operation::Create
        };
        let disable_events = begin(self, operation)?;

        if !pre_save(self, disable_events, exists)? {
            return Ok(false);
        }

        if take_skipped(self) {
            return Ok(true);
        }

        let success = if exists {
            replace(self, collection.as_ref())?
        } else {
            insert(self, collection.as_ref())?
        };

        post_save(self, disable_events, success, exists)
    }

    fn delete(&mut self) -> Result<bool> {
        let Some(id) = self.id().cloned() else {
            return Err(Error::NotFound {
                operation: "deleted",
            });
        };

        let manager = self.collections_manager()?;
        let disable_events = manager.are_events_disabled();

        self.state_mut().skipped = false;
        self.state_mut().operation_made = Operation::Delete;

        if !disable_events && !self.fire_event_cancel(Event::BeforeDelete)? {
            return Ok(false);
        }

        if self.state().skipped {
            debug!(entity = self.type_name(), "delete skipped");
            return Ok(true);
        }

        let collection = prepare_cu(self)?;
        let id = id::normalize(id, manager.implicit_object_ids_for(self.type_name()))?;

        debug!(entity = self.type_name(), %id, "deleting");

        let result = collection.delete_one(doc! { "_id": id })?;

        if !result.acknowledged {
            not_acknowledged(self);
        }

        if !result.acknowledged || result.deleted_count == 0 {
            cancel_operation(self, disable_events)?;
            return Ok(false);
        }

        if !disable_events {
            self.fire_event(Event::AfterDelete)?;
        }

        self.state_mut().dirty_state = DirtyState::Detached;

        Ok(true)
    }

    fn exists(&mut self) -> Result<bool> {
        if self.id().is_none() {
            return Ok(false);
        }

        let collection = prepare_cu(self)?;

        exists_in(self, collection.as_ref())
    }

    fn clone_record(&self) -> Box<dyn Record> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Resolves the collection of a create, update or save.
fn prepare_cu<T: Entity>(entity: &mut T) -> Result<Box<dyn CollectionHandle>> {
    if entity.collections_manager()?.container().is_none() {
        return Err(Error::NoContainer);
    }

    let source = entity.source()?;
    let connection = entity.connection()?;

    Ok(connection.select_collection(&source))
}

/// Starts a create, update or save. Returns whether events are disabled.
fn begin<T: Entity>(entity: &mut T, operation: Operation) -> Result<bool> {
    let disable_events = entity.collections_manager()?.are_events_disabled();

    debug!(entity = entity.type_name(), ?operation, "starting operation");

    let state = entity.state_mut();
    state.operation_made = operation;
    state.error_messages.clear();
    state.skipped = false;

    Ok(disable_events)
}

fn take_skipped<T: Entity>(entity: &mut T) -> bool {
    let skipped = std::mem::take(&mut entity.state_mut().skipped);

    if skipped {
        debug!(entity = entity.type_name(), "operation skipped");
    }

    skipped
}

fn exists_in<T: Entity>(entity: &mut T, collection: &dyn CollectionHandle) -> Result<bool> {
    let Some(id) = entity.id().cloned() else {
        return Ok(false);
    };

    let id = id::normalize(id, entity.is_using_implicit_object_ids()?)?;
    entity.state_mut().id = Some(id.clone());

    if entity.dirty_state() == DirtyState::Persistent {
        return Ok(true);
    }

    let exists = collection.count_documents(doc! { "_id": id })? > 0;

    entity.set_dirty_state(if exists {
        DirtyState::Persistent
    } else {
        DirtyState::Transient
    });

    Ok(exists)
}

fn insert<T: Entity>(entity: &mut T, collection: &dyn CollectionHandle) -> Result<bool> {
    let result = collection.insert_one(entity.to_array()?)?;

    if !result.acknowledged {
        not_acknowledged(entity);
        return Ok(false);
    }

    debug!(entity = entity.type_name(), id = %result.inserted_id, "inserted");

    let state = entity.state_mut();
    state.id = Some(result.inserted_id);
    state.dirty_state = DirtyState::Persistent;

    Ok(true)
}

fn replace<T: Entity>(entity: &mut T, collection: &dyn CollectionHandle) -> Result<bool> {
    let Some(id) = entity.id().cloned() else {
        return Err(Error::NotFound {
            operation: "updated",
        });
    };

    let mut document = entity.to_array()?;
    document.remove("_id");

    let result = collection.update_one(doc! { "_id": id }, doc! { "$set": document })?;

    if !result.acknowledged {
        not_acknowledged(entity);
        return Ok(false);
    }

    Ok(true)
}

fn not_acknowledged<T: Entity>(entity: &mut T) {
    warn!(
        entity = entity.type_name(),
        operation = ?entity.operation_made(),
        "write was not acknowledged"
    );

    entity.append_message(
        Message::new("The write was not acknowledged by the store").kind("NotAcknowledged"),
    );
}

fn pre_save<T: Entity>(entity: &mut T, disable_events: bool, exists: bool) -> Result<bool> {
    if !disable_events {
        if !entity.fire_event_cancel(Event::BeforeValidation)? {
            return Ok(false);
        }

        let event = if exists {
            Event::BeforeValidationOnUpdate
        } else {
            Event::BeforeValidationOnCreate
        };

        if !entity.fire_event_cancel(event)? {
            return Ok(false);
        }
    }

    if !entity.fire_event_cancel(Event::Validation)? {
        if !disable_events {
            entity.fire_event(Event::OnValidationFails)?;
        }

        return Ok(false);
    }

    if !disable_events {
        let (after_validation, before_write) = if exists {
            (Event::AfterValidationOnUpdate, Event::BeforeUpdate)
        } else {
            (Event::AfterValidationOnCreate, Event::BeforeCreate)
        };

        for event in [
            after_validation,
            Event::AfterValidation,
            Event::BeforeSave,
            before_write,
        ] {
            if !entity.fire_event_cancel(event)? {
                return Ok(false);
            }
        }
    }

    Ok(true)
}

fn post_save<T: Entity>(
    entity: &mut T,
    disable_events: bool,
    success: bool,
    exists: bool,
) -> Result<bool> {
    if !success {
        if !disable_events {
            entity.fire_event(Event::NotSaved)?;
        }

        cancel_operation(entity, disable_events)?;

        return Ok(false);
    }

    if !disable_events {
        entity.fire_event(if exists {
            Event::AfterUpdate
        } else {
            Event::AfterCreate
        })?;
        entity.fire_event(Event::AfterSave)?;
    }

    Ok(true)
}

/// Fires `notDeleted` or `notSaved` depending on the operation in flight.
fn cancel_operation<T: Entity>(entity: &mut T, disable_events: bool) -> Result<bool> {
    if disable_events {
        return Ok(false);
    }

    let event = if entity.operation_made() == Operation::Delete {
        Event::NotDeleted
    } else {
        Event::NotSaved
    };

    entity.fire_event(event)?;

    Ok(true)
}
