use crate::{DocumentStream, FromDocument, Manager, Result};
use std::{fmt, marker::PhantomData, sync::Arc};

/// Query results, materialized lazily as `T`.
pub struct Cursor<T> {
    manager: Arc<Manager>,
    documents: DocumentStream,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Cursor<T> {
    pub(crate) fn new(manager: &Arc<Manager>, documents: DocumentStream) -> Self {
        Self {
            manager: Arc::clone(manager),
            documents,
            _marker: PhantomData,
        }
    }
}

impl<T: FromDocument> Iterator for Cursor<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let document = self.documents.next()?;

        Some(document.and_then(|document| T::from_document(&self.manager, document)))
    }
}

impl<T> fmt::Debug for Cursor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("item", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}
