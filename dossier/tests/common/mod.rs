#![allow(dead_code)]

use dossier::prelude::*;

pub fn setup() -> (Arc<Manager>, MemoryConnection) {
    let connection = MemoryConnection::new();

    let container = Arc::new(Container::new());
    container.set_shared("mongo", Arc::new(connection.clone()));

    (Arc::new(Manager::with_container(container)), connection)
}

#[derive(Clone, Default, TypedDocument)]
pub struct RobotPart {
    pub name: String,
    pub weight: Option<f64>,
}

#[derive(Clone, Entity)]
#[entity(hooks)]
pub struct Robots {
    #[entity(state)]
    pub state: EntityState,
    pub first_name: String,
    pub last_name: String,
    pub version: i32,
    #[entity(reserved)]
    pub cache: Option<String>,
    #[entity(setter, getter)]
    pub protected_field: String,
    pub rbpart: Option<RobotPart>,
}

impl Default for Robots {
    fn default() -> Self {
        Self {
            state: EntityState::default(),
            first_name: String::new(),
            last_name: String::new(),
            version: 1,
            cache: None,
            protected_field: String::new(),
            rbpart: None,
        }
    }
}

impl Robots {
    fn set_protected_field(&mut self, value: Bson) -> dossier::Result<()> {
        self.protected_field = format!("protected:{}", value.as_str().unwrap_or_default());
        Ok(())
    }

    fn get_protected_field(&self) -> dossier::Result<Bson> {
        Ok(Bson::String(self.protected_field.to_uppercase()))
    }
}

impl Hooks for Robots {
    fn on_event(&mut self, event: Event) -> Option<bool> {
        if event == Event::Validation && self.version < 1 {
            self.append_message(Message::new("version must be positive").field("version"));
            return Some(false);
        }

        None
    }
}

/// Records every event it receives in a field that is never stored.
#[derive(Clone, Default, Entity)]
#[entity(hooks)]
pub struct Journal {
    #[entity(state)]
    pub state: EntityState,
    pub title: String,
    #[entity(reserved)]
    pub events: Vec<String>,
    #[entity(reserved)]
    pub cancel: Option<String>,
}

impl Hooks for Journal {
    fn initialize(&mut self) -> dossier::Result<()> {
        self.set_source("journal_entries")
    }

    fn on_event(&mut self, event: Event) -> Option<bool> {
        self.events.push(event.to_string());

        (self.cancel.as_deref() == Some(event.as_str())).then_some(false)
    }
}

#[derive(Clone, Default, Entity)]
pub struct Articles {
    #[entity(state)]
    pub state: EntityState,
    pub title: String,
    pub status: Option<String>,
    pub created_at: Option<Bson>,
    pub updated_at: Option<Bson>,
}
