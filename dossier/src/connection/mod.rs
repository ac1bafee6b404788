//! The store boundary.
//!
//! Entities never talk to a driver directly: they select a [`CollectionHandle`] from the
//! [`Connection`] registered in the manager's container. [`MongoConnection`] is backed by the
//! MongoDB driver, [`MemoryConnection`] keeps documents in process.

mod memory;
mod mongo;

pub use memory::MemoryConnection;
pub use mongo::MongoConnection;

use crate::Result;
use mongodb::bson::{Bson, Document};

/// Lazily produced documents of a query.
pub type DocumentStream = Box<dyn Iterator<Item = Result<Document>>>;

pub trait Connection: Send + Sync {
    fn select_collection(&self, name: &str) -> Box<dyn CollectionHandle>;
}

/// Single-document writes and queries against one collection.
///
/// Writes are issued with an acknowledged write concern; the returned `acknowledged` flag
/// reports whether the store confirmed them.
pub trait CollectionHandle {
    fn insert_one(&self, document: Document) -> Result<InsertOneResult>;

    fn update_one(&self, filter: Document, update: Document) -> Result<UpdateResult>;

    fn delete_one(&self, filter: Document) -> Result<DeleteResult>;

    fn find(&self, criteria: &Criteria) -> Result<DocumentStream>;

    fn find_one(&self, criteria: &Criteria) -> Result<Option<Document>>;

    fn aggregate(&self, pipeline: Vec<Document>) -> Result<DocumentStream>;

    fn count_documents(&self, filter: Document) -> Result<u64>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct InsertOneResult {
    pub acknowledged: bool,
    pub inserted_id: Bson,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteResult {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

/// Filter and options of a find query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Criteria {
    pub conditions: Document,
    pub order: Option<Document>,
    pub limit: Option<i64>,
    pub skip: Option<u64>,
    pub projection: Option<Document>,
}

impl Criteria {
    pub fn new(conditions: Document) -> Self {
        Self {
            conditions,
            ..Self::default()
        }
    }

    pub fn order(mut self, order: Document) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }
}

impl From<Document> for Criteria {
    fn from(conditions: Document) -> Self {
        Self::new(conditions)
    }
}
