mod common;

use common::{Articles, Journal, Robots, setup};
use dossier::{Behavior, Error, prelude::*};
use parking_lot::Mutex;
use std::{
    any::type_name,
    sync::atomic::{AtomicUsize, Ordering},
};

#[derive(Clone, Default, Entity)]
#[entity(hooks)]
struct Misconfigured {
    #[entity(state)]
    state: EntityState,
}

impl Hooks for Misconfigured {
    fn initialize(&mut self) -> dossier::Result<()> {
        Err(Error::Unsupported("no setup for this type".to_owned()))
    }
}

static SLOW_SETUPS: AtomicUsize = AtomicUsize::new(0);

#[derive(Clone, Default, Entity)]
#[entity(hooks)]
struct SlowSetup {
    #[entity(state)]
    state: EntityState,
}

impl Hooks for SlowSetup {
    fn initialize(&mut self) -> dossier::Result<()> {
        SLOW_SETUPS.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(50));
        self.set_source("slow_setups")
    }
}

/// Appends `<label>:<event>` to a shared log and answers with `answer`.
struct Recorder {
    label: &'static str,
    log: Arc<Mutex<Vec<String>>>,
    answer: Option<bool>,
}

impl Behavior for Recorder {
    fn notify(&self, event: Event, _record: &mut dyn Record) -> dossier::Result<Option<bool>> {
        self.log.lock().push(format!("{}:{event}", self.label));
        Ok(self.answer)
    }

    fn missing_method(
        &self,
        _record: &mut dyn Record,
        method: &str,
        arguments: &[Bson],
    ) -> dossier::Result<Option<Bson>> {
        Ok((method == self.label).then(|| Bson::Array(arguments.to_vec())))
    }
}

fn recording_bus(label: &'static str, log: &Arc<Mutex<Vec<String>>>, answer: Option<bool>) -> EventBus {
    let bus = EventBus::new();
    let log = Arc::clone(log);

    bus.attach("collection", move |event, _, _| {
        log.lock().push(format!("{label}:{event}"));
        answer
    });

    bus
}

#[test]
fn types_are_initialized_once() {
    let (manager, _) = setup();
    let initialized = Arc::new(AtomicUsize::new(0));

    let bus = EventBus::new();
    let counter = Arc::clone(&initialized);
    bus.attach("collectionsManager:afterInitialize", move |_, _, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        None
    });
    manager.set_events_manager(Arc::new(bus));

    assert!(!manager.is_initialized(type_name::<Journal>()));

    Journal::new(&manager).unwrap();
    Journal::with_data(&manager, doc! { "title": "again" }).unwrap();

    assert!(manager.is_initialized(type_name::<Journal>()));
    assert_eq!(initialized.load(Ordering::SeqCst), 1);
    assert_eq!(manager.get_last_initialized(), Some(type_name::<Journal>()));

    Robots::new(&manager).unwrap();
    assert_eq!(initialized.load(Ordering::SeqCst), 2);
    assert_eq!(manager.get_last_initialized(), Some(type_name::<Robots>()));
}

#[test]
fn failed_initialization_is_retried() {
    let (manager, _) = setup();

    assert!(matches!(Misconfigured::new(&manager), Err(Error::Unsupported(_))));
    assert!(!manager.is_initialized(type_name::<Misconfigured>()));
    assert!(manager.get_last_initialized().is_none());

    assert!(Misconfigured::new(&manager).is_err());
}

#[test]
fn sources_are_derived_configured_and_prefixed() {
    let (manager, connection) = setup();

    assert_eq!(manager.get_source::<Robots>().unwrap(), "robots");

    let mut journal = Journal::with_data(&manager, doc! { "title": "entry" }).unwrap();
    assert_eq!(manager.get_source::<Journal>().unwrap(), "journal_entries");
    assert_eq!(journal.source().unwrap(), "journal_entries");

    manager.set_source_prefix("app_");
    assert_eq!(manager.get_source::<Robots>().unwrap(), "app_robots");

    assert!(journal.save().unwrap());
    assert_eq!(connection.documents("app_journal_entries").len(), 1);
}

#[test]
fn empty_source_is_a_configuration_error() {
    let (manager, _) = setup();
    manager.set_source::<Articles>("");

    let mut article = Articles::with_data(&manager, doc! { "title": "untitled" }).unwrap();

    assert!(matches!(article.save(), Err(Error::EmptySource { .. })));
    assert!(matches!(
        Articles::find_first(&manager, doc! {}),
        Err(Error::EmptySource { .. })
    ));
}

#[test]
fn connection_service_can_be_overridden_per_type() {
    let (manager, default_connection) = setup();

    let archive = MemoryConnection::new();
    manager
        .container()
        .unwrap()
        .set_shared("archive", Arc::new(archive.clone()));
    manager.set_connection_service::<Articles>("archive");

    assert_eq!(manager.get_connection_service::<Articles>(), "archive");
    assert_eq!(manager.get_connection_service::<Robots>(), "mongo");

    let mut article = Articles::with_data(&manager, doc! { "title": "moved" }).unwrap();
    assert!(article.save().unwrap());

    assert_eq!(archive.documents("articles").len(), 1);
    assert!(default_connection.documents("articles").is_empty());
    assert_eq!(Articles::count(&manager, doc! {}).unwrap(), 1);
}

#[test]
fn config_sets_defaults_of_a_manager() {
    let manager = Manager::from_config(
        &Config::default()
            .with_connection_service("archive")
            .with_source_prefix("test_"),
    );

    assert_eq!(manager.get_connection_service::<Robots>(), "archive");
    assert_eq!(manager.get_source::<Robots>().unwrap(), "test_robots");
    assert!(!manager.are_events_disabled());
}

#[test]
fn behaviors_run_before_the_global_then_the_custom_events_manager() {
    let (manager, _) = setup();
    let log = Arc::new(Mutex::new(Vec::new()));

    manager.add_behavior::<Articles>(Recorder {
        label: "first",
        log: Arc::clone(&log),
        answer: None,
    });
    manager.add_behavior::<Articles>(Recorder {
        label: "second",
        log: Arc::clone(&log),
        answer: Some(true),
    });
    manager.set_events_manager(Arc::new(recording_bus("global", &log, None)));
    manager.set_custom_events_manager::<Articles>(Arc::new(recording_bus("custom", &log, None)));

    let mut article = Articles::new(&manager).unwrap();

    assert_eq!(manager.notify_event(Event::BeforeSave, &mut article).unwrap(), None);
    assert_eq!(
        *log.lock(),
        [
            "first:beforeSave",
            "second:beforeSave",
            "global:collection:beforeSave",
            "custom:collection:beforeSave",
        ]
    );
}

#[test]
fn first_cancellation_stops_dispatch() {
    let (manager, connection) = setup();
    let log = Arc::new(Mutex::new(Vec::new()));

    manager.add_behavior::<Articles>(Recorder {
        label: "veto",
        log: Arc::clone(&log),
        answer: Some(false),
    });
    manager.add_behavior::<Articles>(Recorder {
        label: "never",
        log: Arc::clone(&log),
        answer: None,
    });
    manager.set_events_manager(Arc::new(recording_bus("global", &log, None)));

    let mut article = Articles::with_data(&manager, doc! { "title": "vetoed" }).unwrap();

    assert!(!article.save().unwrap());
    assert_eq!(*log.lock(), ["veto:beforeValidation"]);
    assert!(connection.documents("articles").is_empty());
}

#[test]
fn global_cancellation_skips_the_custom_events_manager() {
    let (manager, _) = setup();
    let log = Arc::new(Mutex::new(Vec::new()));

    manager.set_events_manager(Arc::new(recording_bus("global", &log, Some(false))));
    manager.set_custom_events_manager::<Articles>(Arc::new(recording_bus("custom", &log, None)));

    let mut article = Articles::new(&manager).unwrap();

    assert_eq!(
        manager.notify_event(Event::BeforeCreate, &mut article).unwrap(),
        Some(false)
    );
    assert_eq!(*log.lock(), ["global:collection:beforeCreate"]);
}

#[test]
fn custom_events_manager_only_sees_its_type() {
    let (manager, _) = setup();
    let log = Arc::new(Mutex::new(Vec::new()));

    manager.set_custom_events_manager::<Articles>(Arc::new(recording_bus("custom", &log, Some(true))));

    let mut robot = Robots::new(&manager).unwrap();
    assert_eq!(manager.notify_event(Event::AfterSave, &mut robot).unwrap(), None);
    assert!(log.lock().is_empty());

    let mut article = Articles::new(&manager).unwrap();
    assert!(article.fire_event(Event::AfterSave).unwrap());
    assert_eq!(*log.lock(), ["custom:collection:afterSave"]);
}

#[test]
fn missing_methods_go_to_behaviors_then_the_events_manager() {
    let (manager, _) = setup();
    let log = Arc::new(Mutex::new(Vec::new()));

    manager.add_behavior::<Articles>(Recorder {
        label: "publish",
        log: Arc::clone(&log),
        answer: None,
    });

    let bus = EventBus::new();
    bus.attach("collection:archive", |_, _, data| {
        Some(data == Some(&Bson::Array(vec![Bson::Int32(2020)])))
    });
    manager.set_events_manager(Arc::new(bus));

    let mut article = Articles::new(&manager).unwrap();

    assert_eq!(
        article.missing_method("publish", &[Bson::Boolean(true)]).unwrap(),
        Some(Bson::Array(vec![Bson::Boolean(true)]))
    );
    assert_eq!(
        article.missing_method("archive", &[Bson::Int32(2020)]).unwrap(),
        Some(Bson::Boolean(true))
    );
    assert_eq!(article.missing_method("translate", &[]).unwrap(), None);
}

#[test]
fn per_instance_configuration_reaches_the_manager() {
    let (manager, _) = setup();

    let robot = Robots::new(&manager).unwrap();
    robot.use_implicit_object_ids(false).unwrap();
    robot.set_connection_service("archive").unwrap();

    assert!(!manager.is_using_implicit_object_ids::<Robots>());
    assert!(manager.is_using_implicit_object_ids::<Articles>());
    assert_eq!(robot.connection_service().unwrap(), "archive");
    assert!(matches!(
        manager.get_connection::<Robots>(),
        Err(Error::InvalidConnection { service }) if service == "archive"
    ));
}

#[test]
fn concurrent_construction_waits_for_the_setup() {
    let (manager, _) = setup();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                SlowSetup::new(&manager).unwrap();
                assert_eq!(manager.get_source::<SlowSetup>().unwrap(), "slow_setups");
            });
        }
    });

    assert_eq!(SLOW_SETUPS.load(Ordering::SeqCst), 1);
    assert!(manager.is_initialized(type_name::<SlowSetup>()));
}
