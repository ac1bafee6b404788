use crate::{
    Criteria, Cursor, DirtyState, EntityState, Event, Manager, Record, Result,
    attributes::{self, Attributes},
    id,
};
use mongodb::bson::{Bson, Document, doc};
use std::{any::type_name, sync::Arc};
use tracing::debug;

/// Optional per-type callbacks of an entity.
///
/// `#[derive(Entity)]` implements this trait with every callback left as a no-op. Add
/// `#[entity(hooks)]` to the struct to write the implementation yourself.
pub trait Hooks {
    /// One-time setup of the type, run by the manager before the first instance is used.
    ///
    /// This is where per-type configuration goes: `set_source`, `add_behavior`,
    /// `use_implicit_object_ids`, `set_connection_service`.
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Runs on [`Entity::with_data`] before the data is assigned.
    fn on_construct(&mut self, _data: &Document) {}

    /// Runs after the entity was materialized from a store result.
    fn after_fetch(&mut self) {}

    /// Receives every lifecycle event before behaviors and events managers do.
    /// `Some(false)` cancels cancelable events.
    fn on_event(&mut self, _event: Event) -> Option<bool> {
        None
    }
}

/// Conversion of a stored document into a query result.
pub trait FromDocument: Sized {
    fn from_document(manager: &Arc<Manager>, document: Document) -> Result<Self>;
}

impl FromDocument for Document {
    fn from_document(_manager: &Arc<Manager>, document: Document) -> Result<Self> {
        Ok(document)
    }
}

/// A persistent entity bound to a collection.
///
/// Derive it with `#[derive(Entity)]`; the struct needs `Default` and `Clone` and exactly one
/// field of type [`EntityState`] marked `#[entity(state)]`. Lifecycle operations live on
/// [`Record`], queries and constructors here.
pub trait Entity: Attributes + Hooks + Clone + Default + Send + Sync + 'static {
    fn state(&self) -> &EntityState;

    fn state_mut(&mut self) -> &mut EntityState;

    /// A transient instance bound to `manager`.
    fn new(manager: &Arc<Manager>) -> Result<Self> {
        bind(manager)
    }

    /// A transient instance bound to `manager`, with `data` assigned.
    fn with_data(manager: &Arc<Manager>, data: Document) -> Result<Self> {
        let mut entity = bind::<Self>(manager)?;

        entity.on_construct(&data);
        attributes::assign(&mut entity, data, None, None)?;

        Ok(entity)
    }

    fn find(manager: &Arc<Manager>, criteria: impl Into<Criteria>) -> Result<Cursor<Self>>
    where
        Self: FromDocument,
    {
        Self::find_as(manager, criteria)
    }

    /// Like [`Entity::find`], materializing results as `R` (e.g. a raw `Document`).
    fn find_as<R: FromDocument>(
        manager: &Arc<Manager>,
        criteria: impl Into<Criteria>,
    ) -> Result<Cursor<R>> {
        let collection = query_collection::<Self>(manager)?;
        let documents = collection.find(&criteria.into())?;

        Ok(Cursor::new(manager, documents))
    }

    fn find_first(manager: &Arc<Manager>, criteria: impl Into<Criteria>) -> Result<Option<Self>>
    where
        Self: FromDocument,
    {
        Self::find_first_as(manager, criteria)
    }

    fn find_first_as<R: FromDocument>(
        manager: &Arc<Manager>,
        criteria: impl Into<Criteria>,
    ) -> Result<Option<R>> {
        let collection = query_collection::<Self>(manager)?;

        collection
            .find_one(&criteria.into())?
            .map(|document| R::from_document(manager, document))
            .transpose()
    }

    /// Finds by `ObjectId` or 24-digit hex string.
    ///
    /// Any other id is answered with `None` without querying the store. Hex strings are
    /// converted to `ObjectId`s unless implicit object ids are disabled for the type.
    fn find_by_id(manager: &Arc<Manager>, id: impl Into<Bson>) -> Result<Option<Self>>
    where
        Self: FromDocument,
    {
        let id = match id.into() {
            id @ Bson::ObjectId(_) => id,
            Bson::String(hex) if id::is_object_id_hex(&hex) => {
                bind::<Self>(manager)?;

                id::normalize(
                    Bson::String(hex),
                    manager.implicit_object_ids_for(type_name::<Self>()),
                )?
            }
            id => {
                debug!(entity = type_name::<Self>(), %id, "not an object id");
                return Ok(None);
            }
        };

        Self::find_first(manager, doc! { "_id": id })
    }

    fn count(manager: &Arc<Manager>, conditions: Document) -> Result<u64> {
        let collection = query_collection::<Self>(manager)?;

        collection.count_documents(conditions)
    }

    /// Runs an aggregation pipeline; results are raw documents.
    fn aggregate(manager: &Arc<Manager>, pipeline: Vec<Document>) -> Result<Cursor<Document>> {
        Self::aggregate_as(manager, pipeline)
    }

    fn aggregate_as<R: FromDocument>(
        manager: &Arc<Manager>,
        pipeline: Vec<Document>,
    ) -> Result<Cursor<R>> {
        let collection = query_collection::<Self>(manager)?;
        let documents = collection.aggregate(pipeline)?;

        Ok(Cursor::new(manager, documents))
    }

    /// A copy of `base` in `dirty_state` with `data` written over it, bypassing setters.
    ///
    /// Runs [`Hooks::after_fetch`] on the copy.
    fn clone_result(base: &Self, data: Document, dirty_state: DirtyState) -> Result<Self> {
        let mut entity = base.clone();
        entity.set_dirty_state(dirty_state);

        for (name, value) in data {
            entity.write_attribute(&name, value)?;
        }

        entity.after_fetch();

        Ok(entity)
    }

    /// Materializes a document read from the store as a persistent entity.
    ///
    /// [`Hooks::on_construct`] is not run.
    fn from_store_document(manager: &Arc<Manager>, document: Document) -> Result<Self> {
        let base = bind::<Self>(manager)?;

        Self::clone_result(&base, document, DirtyState::Persistent)
    }

    /// Inverse of [`Record::to_bytes`]. The dirty state is left transient.
    fn from_bytes(manager: &Arc<Manager>, bytes: &[u8]) -> Result<Self> {
        let document = Document::from_reader(bytes)?;
        let mut entity = bind::<Self>(manager)?;

        for (name, value) in document {
            entity.write_attribute(&name, value)?;
        }

        Ok(entity)
    }
}

/// A default instance attached to `manager`, its type initialized.
pub(crate) fn bind<T: Entity>(manager: &Arc<Manager>) -> Result<T> {
    let mut entity = T::default();
    entity.state_mut().manager = Some(Arc::clone(manager));

    manager.initialize(&mut entity)?;

    Ok(entity)
}

fn query_collection<T: Entity>(
    manager: &Arc<Manager>,
) -> Result<Box<dyn crate::CollectionHandle>> {
    let mut template = bind::<T>(manager)?;
    let source = template.source()?;
    let connection = template.connection()?;

    Ok(connection.select_collection(&source))
}
