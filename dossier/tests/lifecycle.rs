mod common;

use common::{Journal, Robots, setup};
use dossier::{Error, Operation, ValidationResult, prelude::*};

#[derive(Clone, Default, Entity)]
#[entity(hooks)]
struct Tickets {
    #[entity(state)]
    state: EntityState,
    title: String,
    priority: i32,
}

impl Hooks for Tickets {
    fn on_event(&mut self, event: Event) -> Option<bool> {
        if event != Event::Validation {
            return None;
        }

        let has_title = self.validate(&|record: &dyn Record| match record.read_attribute("title") {
            Ok(Some(Bson::String(title))) if !title.is_empty() => ValidationResult::Messages(Vec::new()),
            _ => Message::new("title is required").field("title").kind("PresenceOf").into(),
        });
        let has_priority = self.validate(&|record: &dyn Record| {
            matches!(record.read_attribute("priority"), Ok(Some(Bson::Int32(priority))) if priority > 0)
        });

        Some(has_title && has_priority)
    }
}

/// Rejects every entity with a fixed set of messages.
struct Reject(Vec<&'static str>);

impl dossier::Validator for Reject {
    fn validate(&self, _record: &dyn Record) -> ValidationResult {
        self.0.iter().map(|message| Message::new(*message)).collect::<Vec<_>>().into()
    }
}

fn events(journal: &Journal) -> Vec<&str> {
    journal.events.iter().map(String::as_str).collect()
}

#[test]
fn create_marks_persistent_and_adopts_generated_id() {
    let (manager, connection) = setup();

    let mut robot =
        Robots::with_data(&manager, doc! { "first_name": "Wall", "last_name": "E" }).unwrap();
    assert_eq!(robot.dirty_state(), DirtyState::Transient);
    assert!(robot.id().is_none());

    assert!(robot.create().unwrap());

    assert_eq!(robot.dirty_state(), DirtyState::Persistent);
    assert_eq!(robot.operation_made(), Operation::Create);
    assert!(matches!(robot.id(), Some(Bson::ObjectId(_))));

    let stored = connection.documents("robots");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].get("_id"), robot.id());
    assert_eq!(stored[0].get_str("last_name").unwrap(), "E");
}

#[test]
fn created_entity_is_found_by_field() {
    let (manager, _) = setup();

    let mut robot =
        Robots::with_data(&manager, doc! { "first_name": "Wall", "last_name": "E" }).unwrap();
    assert!(robot.create().unwrap());

    let found = Robots::find_first(&manager, doc! { "first_name": "Wall" })
        .unwrap()
        .unwrap();

    assert_eq!(found.last_name, "E");
    assert_eq!(found.dirty_state(), DirtyState::Persistent);
    assert_eq!(found.id(), robot.id());
}

#[test]
fn update_without_id_is_not_found_and_never_reaches_the_store() {
    let (manager, connection) = setup();

    let mut robot = Robots::with_data(&manager, doc! { "first_name": "Wall" }).unwrap();

    assert!(matches!(robot.update(), Err(Error::NotFound { operation: "updated" })));
    assert_eq!(connection.operation_count(), 0);
}

#[test]
fn update_of_unknown_id_is_not_found() {
    let (manager, connection) = setup();

    let mut robot = Robots::new(&manager).unwrap();
    robot.set_id(Bson::ObjectId(ObjectId::new())).unwrap();

    assert!(matches!(robot.update(), Err(Error::NotFound { .. })));
    assert_eq!(connection.operation_count(), 1);
    assert_eq!(robot.dirty_state(), DirtyState::Transient);
}

#[test]
fn update_replaces_stored_fields() {
    let (manager, connection) = setup();

    let mut robot =
        Robots::with_data(&manager, doc! { "first_name": "Wall", "last_name": "E" }).unwrap();
    assert!(robot.create().unwrap());

    robot.last_name = "A".to_owned();
    robot.version = 2;
    assert!(robot.update().unwrap());
    assert_eq!(robot.operation_made(), Operation::Update);

    let stored = connection.documents("robots");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].get_str("last_name").unwrap(), "A");
    assert_eq!(stored[0].get_i32("version").unwrap(), 2);
}

#[test]
fn save_inserts_then_updates() {
    let (manager, connection) = setup();

    let mut robot = Robots::with_data(&manager, doc! { "first_name": "Astro" }).unwrap();

    assert!(robot.save().unwrap());
    assert_eq!(robot.operation_made(), Operation::Create);

    robot.first_name = "Astro Boy".to_owned();
    assert!(robot.save().unwrap());
    assert_eq!(robot.operation_made(), Operation::Update);

    let stored = connection.documents("robots");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].get_str("first_name").unwrap(), "Astro Boy");
}

#[test]
fn save_keeps_a_user_supplied_id() {
    let (manager, connection) = setup();

    let mut robot = Robots::with_data(&manager, doc! { "first_name": "Bender" }).unwrap();
    robot.set_id(Bson::String("5f1d7a7e0123456789abcdef".to_owned())).unwrap();

    assert!(robot.save().unwrap());

    let expected = ObjectId::parse_str("5f1d7a7e0123456789abcdef").unwrap();
    assert_eq!(robot.id(), Some(&Bson::ObjectId(expected)));
    assert_eq!(
        connection.documents("robots")[0].get_object_id("_id").unwrap(),
        expected
    );
}

#[test]
fn exists_checks_the_store_and_caches_the_answer() {
    let (manager, connection) = setup();

    let mut stored = Robots::with_data(&manager, doc! { "first_name": "Marvin" }).unwrap();
    assert!(stored.create().unwrap());

    let mut robot = Robots::new(&manager).unwrap();
    assert!(!robot.exists().unwrap());

    robot.set_id(stored.id().cloned().unwrap()).unwrap();
    let operations = connection.operation_count();

    assert!(robot.exists().unwrap());
    assert_eq!(robot.dirty_state(), DirtyState::Persistent);
    assert_eq!(connection.operation_count(), operations + 1);

    assert!(robot.exists().unwrap());
    assert_eq!(connection.operation_count(), operations + 1);
}

#[test]
fn delete_without_id_is_not_found() {
    let (manager, _) = setup();

    let mut robot = Robots::new(&manager).unwrap();

    assert!(matches!(robot.delete(), Err(Error::NotFound { operation: "deleted" })));
}

#[test]
fn delete_detaches() {
    let (manager, connection) = setup();

    let mut robot = Robots::with_data(&manager, doc! { "first_name": "Wall" }).unwrap();
    assert!(robot.create().unwrap());

    assert!(robot.delete().unwrap());

    assert_eq!(robot.dirty_state(), DirtyState::Detached);
    assert_eq!(robot.operation_made(), Operation::Delete);
    assert!(connection.documents("robots").is_empty());
}

#[test]
fn deleting_a_missing_document_fails() {
    let (manager, _) = setup();

    let mut journal = Journal::new(&manager).unwrap();
    journal.set_id(Bson::ObjectId(ObjectId::new())).unwrap();

    assert!(!journal.delete().unwrap());

    assert_eq!(events(&journal), ["beforeDelete", "notDeleted"]);
    assert_eq!(journal.dirty_state(), DirtyState::Transient);
}

#[test]
fn failed_validation_reports_messages() {
    let (manager, connection) = setup();

    let mut robot = Robots::with_data(&manager, doc! { "first_name": "Rusty", "version": 0 })
        .unwrap();

    assert!(!robot.save().unwrap());

    assert_eq!(robot.messages().len(), 1);
    assert_eq!(robot.messages()[0].get_field(), Some("version"));
    assert_eq!(robot.dirty_state(), DirtyState::Transient);
    assert!(connection.documents("robots").is_empty());
}

#[test]
fn messages_are_cleared_on_the_next_save() {
    let (manager, _) = setup();

    let mut robot = Robots::with_data(&manager, doc! { "version": 0 }).unwrap();
    assert!(!robot.save().unwrap());
    assert!(!robot.messages().is_empty());

    robot.version = 3;
    assert!(robot.save().unwrap());
    assert!(robot.messages().is_empty());
}

#[test]
fn create_fires_events_in_order() {
    let (manager, _) = setup();

    let mut journal = Journal::with_data(&manager, doc! { "title": "first" }).unwrap();
    assert!(journal.save().unwrap());

    assert_eq!(
        events(&journal),
        [
            "beforeValidation",
            "beforeValidationOnCreate",
            "validation",
            "afterValidationOnCreate",
            "afterValidation",
            "beforeSave",
            "beforeCreate",
            "afterCreate",
            "afterSave",
        ]
    );
}

#[test]
fn update_fires_events_in_order() {
    let (manager, _) = setup();

    let mut journal = Journal::with_data(&manager, doc! { "title": "first" }).unwrap();
    assert!(journal.save().unwrap());

    journal.events.clear();
    journal.title = "second".to_owned();
    assert!(journal.save().unwrap());

    assert_eq!(
        events(&journal),
        [
            "beforeValidation",
            "beforeValidationOnUpdate",
            "validation",
            "afterValidationOnUpdate",
            "afterValidation",
            "beforeSave",
            "beforeUpdate",
            "afterUpdate",
            "afterSave",
        ]
    );
}

#[test]
fn canceled_event_aborts_without_a_write() {
    let (manager, connection) = setup();

    let mut journal = Journal::with_data(&manager, doc! { "title": "draft" }).unwrap();
    journal.cancel = Some("beforeSave".to_owned());

    assert!(!journal.save().unwrap());

    assert_eq!(events(&journal).last(), Some(&"beforeSave"));
    assert_eq!(journal.dirty_state(), DirtyState::Transient);
    assert!(connection.documents("journal_entries").is_empty());
}

#[test]
fn canceled_validation_fires_on_validation_fails() {
    let (manager, _) = setup();

    let mut journal = Journal::with_data(&manager, doc! { "title": "draft" }).unwrap();
    journal.cancel = Some("validation".to_owned());

    assert!(!journal.create().unwrap());

    assert_eq!(
        events(&journal),
        [
            "beforeValidation",
            "beforeValidationOnCreate",
            "validation",
            "onValidationFails",
        ]
    );
}

#[test]
fn disabled_events_still_validate() {
    let (manager, connection) = setup();
    manager.disable_events(true);

    let mut journal = Journal::with_data(&manager, doc! { "title": "quiet" }).unwrap();
    assert!(journal.save().unwrap());
    assert_eq!(events(&journal), ["validation"]);

    let mut robot = Robots::with_data(&manager, doc! { "version": 0 }).unwrap();
    assert!(!robot.save().unwrap());
    assert_eq!(connection.documents("journal_entries").len(), 1);
    assert!(connection.documents("robots").is_empty());
}

#[test]
fn unacknowledged_write_is_reported_not_raised() {
    let (manager, connection) = setup();
    connection.set_acknowledge_writes(false);

    let mut journal = Journal::with_data(&manager, doc! { "title": "lost" }).unwrap();

    assert!(!journal.save().unwrap());

    assert_eq!(journal.dirty_state(), DirtyState::Transient);
    assert!(journal.id().is_none());
    assert_eq!(journal.messages()[0].get_kind(), "NotAcknowledged");
    assert_eq!(events(&journal).last(), Some(&"notSaved"));
    assert!(!events(&journal).contains(&"afterSave"));
}

#[test]
fn unbound_entity_cannot_be_saved() {
    let mut robot = Robots::default();

    assert!(matches!(robot.save(), Err(Error::Unbound { .. })));
}

#[test]
fn missing_container_or_service_is_fatal() {
    let manager = Arc::new(Manager::new());
    let mut robot = Robots::new(&manager).unwrap();
    assert!(matches!(robot.save(), Err(Error::NoContainer)));

    manager.set_container(Arc::new(Container::new()));
    let mut robot = Robots::new(&manager).unwrap();
    assert!(matches!(
        robot.create(),
        Err(Error::InvalidConnection { service }) if service == "mongo"
    ));
}

#[test]
fn validator_messages_fail_the_save_and_are_kept() {
    let (manager, connection) = setup();

    let mut ticket = Tickets::with_data(&manager, doc! { "priority": 1 }).unwrap();

    assert!(!ticket.save().unwrap());

    let [message] = ticket.messages() else {
        panic!("expected one message, got {:?}", ticket.messages());
    };
    assert_eq!(message.message(), "title is required");
    assert_eq!(message.get_field(), Some("title"));
    assert_eq!(message.get_kind(), "PresenceOf");
    assert_eq!(ticket.dirty_state(), DirtyState::Transient);
    assert!(connection.documents("tickets").is_empty());

    ticket.title = "Broken arm".to_owned();
    assert!(ticket.save().unwrap());
    assert!(ticket.messages().is_empty());
    assert_eq!(connection.documents("tickets").len(), 1);
}

#[test]
fn boolean_validator_fails_the_save_without_messages() {
    let (manager, connection) = setup();

    let mut ticket =
        Tickets::with_data(&manager, doc! { "title": "Broken arm", "priority": 0 }).unwrap();

    assert!(!ticket.save().unwrap());
    assert!(ticket.messages().is_empty());
    assert!(connection.documents("tickets").is_empty());

    ticket.priority = 2;
    assert!(ticket.save().unwrap());
}

#[test]
fn validate_appends_every_message() {
    let (manager, _) = setup();

    let mut ticket = Tickets::new(&manager).unwrap();

    assert!(ticket.validate(&Reject(Vec::new())));
    assert!(ticket.validate(&|_: &dyn Record| true));
    assert!(ticket.messages().is_empty());

    assert!(!ticket.validate(&Reject(vec!["first", "second"])));
    assert!(!ticket.validate(&|_: &dyn Record| false));

    let messages = ticket.messages().iter().map(Message::message).collect::<Vec<_>>();
    assert_eq!(messages, ["first", "second"]);
}
