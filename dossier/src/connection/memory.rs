use super::{
    CollectionHandle, Connection, Criteria, DeleteResult, DocumentStream, InsertOneResult,
    UpdateResult,
};
use crate::{Error, Result};
use mongodb::bson::{Bson, Document, oid::ObjectId};
use parking_lot::RwLock;
use std::{
    cmp::Ordering,
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{self, AtomicBool, AtomicUsize},
    },
};
use tracing::trace;

/// An in-process [`Connection`] holding collections as vectors of documents.
///
/// Clones share the same data. Filters understand equality, dotted paths, array membership
/// and the comparison operators `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`. Updates
/// understand `$set` and `$unset`; pipelines understand `$match`, `$sort`, `$limit` and
/// `$count`. Anything else fails with [`Error::Unsupported`].
#[derive(Clone, Default)]
pub struct MemoryConnection {
    store: Arc<Store>,
}

struct Store {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    acknowledge: AtomicBool,
    operations: AtomicUsize,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            collections: RwLock::default(),
            acknowledge: AtomicBool::new(true),
            operations: AtomicUsize::new(0),
        }
    }
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// When `false`, writes are dropped and reported as unacknowledged.
    pub fn set_acknowledge_writes(&self, acknowledge: bool) {
        self.store
            .acknowledge
            .store(acknowledge, atomic::Ordering::SeqCst);
    }

    /// Number of collection operations issued so far, reads included.
    pub fn operation_count(&self) -> usize {
        self.store.operations.load(atomic::Ordering::SeqCst)
    }

    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.store
            .collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn drop_collection(&self, collection: &str) {
        self.store.collections.write().remove(collection);
    }
}

impl Connection for MemoryConnection {
    fn select_collection(&self, name: &str) -> Box<dyn CollectionHandle> {
        Box::new(MemoryCollection {
            store: Arc::clone(&self.store),
            name: name.to_owned(),
        })
    }
}

impl fmt::Debug for MemoryConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryConnection")
            .field("collections", &self.store.collections.read().len())
            .field("operations", &self.operation_count())
            .finish()
    }
}

struct MemoryCollection {
    store: Arc<Store>,
    name: String,
}

impl MemoryCollection {
    fn begin(&self, operation: &str) {
        self.store
            .operations
            .fetch_add(1, atomic::Ordering::SeqCst);

        trace!(collection = %self.name, operation, "memory store operation");
    }

    fn acknowledges(&self) -> bool {
        self.store.acknowledge.load(atomic::Ordering::SeqCst)
    }

    fn snapshot(&self) -> Vec<Document> {
        self.store
            .collections
            .read()
            .get(&self.name)
            .cloned()
            .unwrap_or_default()
    }

    fn query(&self, criteria: &Criteria) -> Result<Vec<Document>> {
        let mut documents = filter(self.snapshot(), &criteria.conditions)?;

        if let Some(order) = &criteria.order {
            sort(&mut documents, order);
        }

        let skip = criteria
            .skip
            .map_or(0, |skip| usize::try_from(skip).unwrap_or(usize::MAX));
        let mut documents = documents.into_iter().skip(skip).collect::<Vec<_>>();

        if let Some(limit) = criteria.limit.filter(|limit| *limit != 0) {
            documents.truncate(usize::try_from(limit.unsigned_abs()).unwrap_or(usize::MAX));
        }

        if let Some(projection) = &criteria.projection {
            documents = documents
                .iter()
                .map(|document| project(document, projection))
                .collect();
        }

        Ok(documents)
    }
}

impl CollectionHandle for MemoryCollection {
    fn insert_one(&self, document: Document) -> Result<InsertOneResult> {
        self.begin("insert_one");

        let id = document
            .get("_id")
            .cloned()
            .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));

        if !self.acknowledges() {
            return Ok(InsertOneResult {
                acknowledged: false,
                inserted_id: Bson::Null,
            });
        }

        let mut collections = self.store.collections.write();
        let collection = collections.entry(self.name.clone()).or_default();

        if collection
            .iter()
            .any(|stored| stored.get("_id").is_some_and(|stored| values_equal(stored, &id)))
        {
            return Err(Error::DuplicateKey(id));
        }

        let mut stored = Document::new();
        stored.insert("_id", id.clone());
        for (key, value) in document {
            if key != "_id" {
                stored.insert(key, value);
            }
        }
        collection.push(stored);

        Ok(InsertOneResult {
            acknowledged: true,
            inserted_id: id,
        })
    }

    fn update_one(&self, filter: Document, update: Document) -> Result<UpdateResult> {
        self.begin("update_one");

        validate_update(&update)?;

        if !self.acknowledges() {
            return Ok(UpdateResult {
                acknowledged: false,
                matched_count: 0,
                modified_count: 0,
            });
        }

        let mut collections = self.store.collections.write();
        let collection = collections.entry(self.name.clone()).or_default();

        for document in collection.iter_mut() {
            if matches(document, &filter)? {
                let modified = apply_update(document, &update)?;

                return Ok(UpdateResult {
                    acknowledged: true,
                    matched_count: 1,
                    modified_count: u64::from(modified),
                });
            }
        }

        Ok(UpdateResult {
            acknowledged: true,
            matched_count: 0,
            modified_count: 0,
        })
    }

    fn delete_one(&self, filter: Document) -> Result<DeleteResult> {
        self.begin("delete_one");

        if !self.acknowledges() {
            return Ok(DeleteResult {
                acknowledged: false,
                deleted_count: 0,
            });
        }

        let mut collections = self.store.collections.write();
        let collection = collections.entry(self.name.clone()).or_default();

        let mut position = None;

        for (index, document) in collection.iter().enumerate() {
            if matches(document, &filter)? {
                position = Some(index);
                break;
            }
        }

        let deleted_count = match position {
            Some(index) => {
                collection.remove(index);
                1
            }
            None => 0,
        };

        Ok(DeleteResult {
            acknowledged: true,
            deleted_count,
        })
    }

    fn find(&self, criteria: &Criteria) -> Result<DocumentStream> {
        self.begin("find");

        let documents = self.query(criteria)?;

        Ok(Box::new(documents.into_iter().map(Ok)))
    }

    fn find_one(&self, criteria: &Criteria) -> Result<Option<Document>> {
        self.begin("find_one");

        let criteria = criteria.clone().limit(1);

        Ok(self.query(&criteria)?.into_iter().next())
    }

    fn aggregate(&self, pipeline: Vec<Document>) -> Result<DocumentStream> {
        self.begin("aggregate");

        let mut documents = self.snapshot();

        for stage in pipeline {
            documents = run_stage(documents, &stage)?;
        }

        Ok(Box::new(documents.into_iter().map(Ok)))
    }

    fn count_documents(&self, filter: Document) -> Result<u64> {
        self.begin("count_documents");

        let mut count = 0;

        for document in self.snapshot() {
            if matches(&document, &filter)? {
                count += 1;
            }
        }

        Ok(count)
    }
}

fn filter(documents: Vec<Document>, conditions: &Document) -> Result<Vec<Document>> {
    let mut matching = Vec::with_capacity(documents.len());

    for document in documents {
        if matches(&document, conditions)? {
            matching.push(document);
        }
    }

    Ok(matching)
}

fn matches(document: &Document, conditions: &Document) -> Result<bool> {
    for (path, condition) in conditions {
        if path.starts_with('$') {
            return Err(Error::Unsupported(path.clone()));
        }

        if !matches_condition(&lookup(document, path), condition)? {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Values found at a dotted path, descending into arrays of sub-documents.
fn lookup<'a>(document: &'a Document, path: &str) -> Vec<&'a Bson> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };

    let Some(value) = document.get(head) else {
        return Vec::new();
    };

    let Some(rest) = rest else {
        return vec![value];
    };

    match value {
        Bson::Document(nested) => lookup(nested, rest),
        Bson::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Bson::Document(nested) => Some(lookup(nested, rest)),
                _ => None,
            })
            .flatten()
            .collect(),
        _ => Vec::new(),
    }
}

fn is_operator_document(condition: &Bson) -> Option<&Document> {
    match condition {
        Bson::Document(operators)
            if !operators.is_empty() && operators.keys().all(|key| key.starts_with('$')) =>
        {
            Some(operators)
        }
        _ => None,
    }
}

fn matches_condition(values: &[&Bson], condition: &Bson) -> Result<bool> {
    let Some(operators) = is_operator_document(condition) else {
        return Ok(any_equal(values, condition));
    };

    for (operator, operand) in operators {
        let matched = match operator.as_str() {
            "$eq" => any_equal(values, operand),
            "$ne" => !any_equal(values, operand),
            "$gt" => any_compares(values, operand, |ordering| ordering.is_gt()),
            "$gte" => any_compares(values, operand, |ordering| ordering.is_ge()),
            "$lt" => any_compares(values, operand, |ordering| ordering.is_lt()),
            "$lte" => any_compares(values, operand, |ordering| ordering.is_le()),
            operator => return Err(Error::Unsupported(operator.to_owned())),
        };

        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

fn any_equal(values: &[&Bson], target: &Bson) -> bool {
    if values.is_empty() {
        return matches!(target, Bson::Null);
    }

    values.iter().any(|value| {
        values_equal(value, target)
            || matches!(value, Bson::Array(items) if items.iter().any(|item| values_equal(item, target)))
    })
}

fn any_compares(values: &[&Bson], operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    values.iter().any(|value| match value {
        Bson::Array(items) => items
            .iter()
            .any(|item| compare(item, operand).is_some_and(&accept)),
        value => compare(value, operand).is_some_and(&accept),
    })
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(value) => Some(f64::from(*value)),
        #[allow(clippy::cast_precision_loss)]
        Bson::Int64(value) => Some(*value as f64),
        Bson::Double(value) => Some(*value),
        _ => None,
    }
}

fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(value) => Some(i64::from(*value)),
        Bson::Int64(value) => Some(*value),
        #[allow(clippy::cast_possible_truncation)]
        Bson::Double(value) if value.fract() == 0.0 => Some(*value as i64),
        _ => None,
    }
}

/// Ordering between values of comparable types, `None` across incomparable types.
fn compare(left: &Bson, right: &Bson) -> Option<Ordering> {
    if let (Some(left), Some(right)) = (as_f64(left), as_f64(right)) {
        return left.partial_cmp(&right);
    }

    match (left, right) {
        (Bson::String(left), Bson::String(right)) => Some(left.cmp(right)),
        (Bson::Boolean(left), Bson::Boolean(right)) => Some(left.cmp(right)),
        (Bson::DateTime(left), Bson::DateTime(right)) => Some(left.cmp(right)),
        (Bson::ObjectId(left), Bson::ObjectId(right)) => Some(left.bytes().cmp(&right.bytes())),
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn values_equal(left: &Bson, right: &Bson) -> bool {
    compare(left, right).map_or_else(|| left == right, Ordering::is_eq)
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(value) => *value,
        Bson::Null | Bson::Undefined => false,
        value => as_f64(value).is_none_or(|number| number != 0.0),
    }
}

/// Rank of a type in the store's cross-type sort order.
fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        None | Some(Bson::Null | Bson::Undefined) => 0,
        Some(Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => 1,
        Some(Bson::String(_)) => 2,
        Some(Bson::Document(_)) => 3,
        Some(Bson::Array(_)) => 4,
        Some(Bson::ObjectId(_)) => 5,
        Some(Bson::Boolean(_)) => 6,
        Some(Bson::DateTime(_)) => 7,
        Some(_) => 8,
    }
}

fn sort(documents: &mut [Document], order: &Document) {
    documents.sort_by(|left, right| {
        for (path, direction) in order {
            let left = lookup(left, path).first().copied();
            let right = lookup(right, path).first().copied();

            let ordering = match (left, right) {
                (Some(left), Some(right)) => compare(left, right),
                _ => None,
            }
            .unwrap_or_else(|| type_rank(left).cmp(&type_rank(right)));

            let ordering = if as_i64(direction).is_some_and(|direction| direction < 0) {
                ordering.reverse()
            } else {
                ordering
            };

            if ordering.is_ne() {
                return ordering;
            }
        }

        Ordering::Equal
    });
}

fn project(document: &Document, projection: &Document) -> Document {
    let inclusive = projection
        .iter()
        .any(|(key, value)| key != "_id" && truthy(value));

    if inclusive {
        let keep_id = projection.get("_id").is_none_or(truthy);

        document
            .iter()
            .filter(|(key, _)| {
                if key.as_str() == "_id" {
                    keep_id
                } else {
                    projection.get(key.as_str()).is_some_and(truthy)
                }
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    } else {
        document
            .iter()
            .filter(|(key, _)| projection.get(key.as_str()).is_none_or(truthy))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

fn validate_update(update: &Document) -> Result<()> {
    for (operator, operand) in update {
        if !matches!(operator.as_str(), "$set" | "$unset") {
            return Err(Error::Unsupported(operator.clone()));
        }

        if !matches!(operand, Bson::Document(_)) {
            return Err(Error::Unsupported(operator.clone()));
        }
    }

    Ok(())
}

fn apply_update(document: &mut Document, update: &Document) -> Result<bool> {
    let mut modified = false;

    for (operator, operand) in update {
        let Bson::Document(fields) = operand else {
            return Err(Error::Unsupported(operator.clone()));
        };

        match operator.as_str() {
            "$set" => {
                for (key, value) in fields {
                    if document.get(key) != Some(value) {
                        document.insert(key.clone(), value.clone());
                        modified = true;
                    }
                }
            }
            "$unset" => {
                for key in fields.keys() {
                    modified |= document.remove(key).is_some();
                }
            }
            operator => return Err(Error::Unsupported(operator.to_owned())),
        }
    }

    Ok(modified)
}

fn run_stage(documents: Vec<Document>, stage: &Document) -> Result<Vec<Document>> {
    let Some((name, argument)) = stage.iter().next() else {
        return Err(Error::Unsupported(String::from("{}")));
    };

    let unsupported = || Error::Unsupported(name.clone());

    match name.as_str() {
        "$match" => {
            let Bson::Document(conditions) = argument else {
                return Err(unsupported());
            };

            filter(documents, conditions)
        }
        "$sort" => {
            let Bson::Document(order) = argument else {
                return Err(unsupported());
            };

            let mut documents = documents;
            sort(&mut documents, order);
            Ok(documents)
        }
        "$limit" => {
            let limit = as_i64(argument)
                .and_then(|limit| usize::try_from(limit).ok())
                .ok_or_else(unsupported)?;

            Ok(documents.into_iter().take(limit).collect())
        }
        "$count" => {
            let Bson::String(field) = argument else {
                return Err(unsupported());
            };

            if documents.is_empty() {
                return Ok(Vec::new());
            }

            let mut count = Document::new();
            count.insert(
                field.clone(),
                i64::try_from(documents.len()).unwrap_or(i64::MAX),
            );

            Ok(vec![count])
        }
        _ => Err(unsupported()),
    }
}
