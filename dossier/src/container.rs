use crate::Connection;
use dashmap::DashMap;
use std::{fmt, sync::Arc};

/// Named, shared connection services.
///
/// Entities resolve their connection through the [`Manager`](crate::Manager)'s container by
/// service name (`"mongo"` unless configured otherwise).
#[derive(Default)]
pub struct Container {
    services: DashMap<String, Arc<dyn Connection>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_shared(&self, name: impl Into<String>, connection: Arc<dyn Connection>) {
        self.services.insert(name.into(), connection);
    }

    pub fn get_shared(&self, name: &str) -> Option<Arc<dyn Connection>> {
        self.services.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn has(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<dyn Connection>> {
        self.services.remove(name).map(|(_, connection)| connection)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field(
                "services",
                &self
                    .services
                    .iter()
                    .map(|entry| entry.key().clone())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
