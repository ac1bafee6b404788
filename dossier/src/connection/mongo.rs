use super::{
    CollectionHandle, Connection, Criteria, DeleteResult, DocumentStream, InsertOneResult,
    UpdateResult,
};
use crate::{Error, Result};
use mongodb::{
    bson::Document,
    options::{Acknowledgment, WriteConcern},
    sync::{Client, Collection, Database},
};

/// A [`Connection`] backed by a MongoDB database.
#[derive(Clone, Debug)]
pub struct MongoConnection {
    db: Database,
}

impl MongoConnection {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Connects to `uri` and selects `database`.
    pub fn with_uri_str(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri)?;

        Ok(Self::new(client.database(database)))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl From<Database> for MongoConnection {
    fn from(db: Database) -> Self {
        Self::new(db)
    }
}

impl Connection for MongoConnection {
    fn select_collection(&self, name: &str) -> Box<dyn CollectionHandle> {
        Box::new(MongoCollection {
            collection: self.db.collection(name),
        })
    }
}

struct MongoCollection {
    collection: Collection<Document>,
}

fn acknowledged() -> WriteConcern {
    let mut write_concern = WriteConcern::default();
    write_concern.w = Some(Acknowledgment::Nodes(1));
    write_concern
}

impl CollectionHandle for MongoCollection {
    fn insert_one(&self, document: Document) -> Result<InsertOneResult> {
        let result = self
            .collection
            .insert_one(document)
            .write_concern(acknowledged())
            .run()?;

        Ok(InsertOneResult {
            acknowledged: true,
            inserted_id: result.inserted_id,
        })
    }

    fn update_one(&self, filter: Document, update: Document) -> Result<UpdateResult> {
        let result = self
            .collection
            .update_one(filter, update)
            .write_concern(acknowledged())
            .run()?;

        Ok(UpdateResult {
            acknowledged: true,
            matched_count: result.matched_count,
            modified_count: result.modified_count,
        })
    }

    fn delete_one(&self, filter: Document) -> Result<DeleteResult> {
        let result = self
            .collection
            .delete_one(filter)
            .write_concern(acknowledged())
            .run()?;

        Ok(DeleteResult {
            acknowledged: true,
            deleted_count: result.deleted_count,
        })
    }

    fn find(&self, criteria: &Criteria) -> Result<DocumentStream> {
        let mut query = self.collection.find(criteria.conditions.clone());

        if let Some(order) = &criteria.order {
            query = query.sort(order.clone());
        }

        if let Some(limit) = criteria.limit {
            query = query.limit(limit);
        }

        if let Some(skip) = criteria.skip {
            query = query.skip(skip);
        }

        if let Some(projection) = &criteria.projection {
            query = query.projection(projection.clone());
        }

        let cursor = query.run()?;

        Ok(Box::new(cursor.map(|document| document.map_err(Error::from))))
    }

    fn find_one(&self, criteria: &Criteria) -> Result<Option<Document>> {
        let mut query = self.collection.find_one(criteria.conditions.clone());

        if let Some(order) = &criteria.order {
            query = query.sort(order.clone());
        }

        if let Some(skip) = criteria.skip {
            query = query.skip(skip);
        }

        if let Some(projection) = &criteria.projection {
            query = query.projection(projection.clone());
        }

        Ok(query.run()?)
    }

    fn aggregate(&self, pipeline: Vec<Document>) -> Result<DocumentStream> {
        let cursor = self.collection.aggregate(pipeline).run()?;

        Ok(Box::new(cursor.map(|document| document.map_err(Error::from))))
    }

    fn count_documents(&self, filter: Document) -> Result<u64> {
        Ok(self.collection.count_documents(filter).run()?)
    }
}
