//! Dossier is an active-record document mapper for `MongoDB`.
//!
//! Entities are plain structs that carry their own lifecycle state. They are bound to a
//! shared [`Manager`] that knows which collection and connection each type uses, runs
//! each type's one-time setup, and dispatches lifecycle events to behaviors and listeners.
//!
//! ## Example
//!
//! ```ignore
//! use dossier::prelude::*;
//!
//! #[derive(Clone, Default, Entity)]
//! #[entity(hooks)]
//! struct Robots {
//!     #[entity(state)]
//!     state: EntityState,
//!     name: String,
//!     version: i32,
//! }
//!
//! impl Hooks for Robots {
//!     fn initialize(&mut self) -> dossier::Result<()> {
//!         self.add_behavior(Timestampable::new(doc! {
//!             "beforeCreate": { "field": "created_at" },
//!         }))
//!     }
//! }
//!
//! let container = Arc::new(Container::new());
//! container.set_shared("mongo", Arc::new(MongoConnection::with_uri_str(uri, "app")?));
//!
//! let manager = Arc::new(Manager::with_container(container));
//!
//! // Insert
//! let mut robot = Robots::with_data(&manager, doc! { "name": "Astro Boy", "version": 1 })?;
//! robot.save()?;
//!
//! // Query
//! let found = Robots::find_by_id(&manager, robot.id().cloned().unwrap_or_default())?;
//! let mechanical = Robots::find(&manager, doc! { "version": { "$gte": 1 } })?
//!     .collect::<dossier::Result<Vec<_>>>()?;
//!
//! // Delete
//! robot.delete()?;
//! ```
//!
//! See [`guides`] module to learn more!

#![warn(clippy::pedantic)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_errors_doc
)]

extern crate self as dossier;

mod attributes;
pub mod behavior;
mod config;
pub mod connection;
mod container;
mod cursor;
mod document;
mod entity;
mod error;
pub mod event;
pub mod guides;
pub mod id;
mod manager;
mod record;
mod state;
mod validation;

pub use attributes::{Attributes, BASE_RESERVED, ColumnMap, FieldDescriptor, Schema};
pub use behavior::{Behavior, SoftDelete, Timestampable};
pub use config::Config;
pub use connection::{
    CollectionHandle, Connection, Criteria, DeleteResult, DocumentStream, InsertOneResult,
    MemoryConnection, MongoConnection, UpdateResult,
};
pub use container::Container;
pub use cursor::Cursor;
pub use document::TypedDocument;
pub use dossier_macros::{Entity, TypedDocument};
pub use entity::{Entity, FromDocument, Hooks};
pub use error::{Error, Result};
pub use event::{Event, EventBus, EventsManager, Listener};
pub use manager::{DEFAULT_CONNECTION_SERVICE, Manager};
pub use mongodb::{self, bson};
pub use record::Record;
pub use state::{DirtyState, EntityState, Message, Operation};
pub use validation::{ValidationResult, Validator};

/// Everything needed to declare and use entities.
pub mod prelude {
    pub use crate::{
        Behavior, Config, Container, Criteria, DirtyState, Entity, EntityState, Event,
        EventBus, EventsManager, Hooks, Manager, MemoryConnection, Message, MongoConnection,
        Record, SoftDelete, Timestampable, TypedDocument,
    };
    pub use mongodb::bson::{Bson, Document, bson, doc, oid::ObjectId};
    pub use std::sync::Arc;
}

#[doc(hidden)]
pub mod __private {
    pub use serde;
}
