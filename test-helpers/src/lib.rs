//! Common fixtures for tests and benchmarks: a small object graph and a
//! recording observer wired into a fresh core.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use vigild::broker::{BrokerEvent, Recorder};
use vigild::config::Config;
use vigild::core::Core;
use vigild::objects::{ObjectConfig, ObjectStore, ServiceKey};

/// Fixed "now" used across the engine tests.
pub const T0: i64 = 1_700_000_000;

/// The canned object graph:
/// `gw -> h1 -> {c1, c2}`, standalone `h2`/`h3`, hostgroup `webservers`
/// (h1..h3), services `h1/http` and `h2/http` in servicegroup `web`, and
/// contacts `alice`/`bob` (group `admins`) with unrestricted periods.
pub fn fixture_store() -> ObjectStore {
    let cfg: ObjectConfig = serde_json::from_value(serde_json::json!({
        "hosts": [
            {"name": "gw", "address": "10.0.0.1", "contacts": ["alice"],
             "notification_interval": 1.0},
            {"name": "h1", "address": "10.0.0.2", "parents": ["gw"],
             "contacts": ["alice"], "notification_interval": 1.0},
            {"name": "h2", "address": "10.0.0.3", "contacts": ["alice"],
             "notification_interval": 1.0},
            {"name": "h3", "address": "10.0.0.4", "contacts": ["alice"],
             "notification_interval": 1.0},
            {"name": "c1", "parents": ["h1"], "contacts": ["alice"],
             "notification_interval": 1.0},
            {"name": "c2", "parents": ["h1"], "contacts": ["alice"],
             "notification_interval": 1.0}
        ],
        "services": [
            {"host_name": "h1", "description": "http", "contacts": ["alice"],
             "notification_interval": 1.0},
            {"host_name": "h2", "description": "http", "contacts": ["alice"],
             "notification_interval": 1.0}
        ],
        "contacts": [
            {"name": "alice", "alias": "Alice", "email": "alice@example.net",
             "host_notification_commands":
                ["notify-host-by-email $CONTACTNAME$ $HOSTNAME$ $HOSTSTATE$"],
             "service_notification_commands":
                ["notify-svc-by-email $CONTACTNAME$ $HOSTNAME$ $SERVICEDESC$ $SERVICESTATE$"]},
            {"name": "bob", "alias": "Bob", "email": "bob@example.net",
             "host_notification_commands":
                ["notify-host-by-email $CONTACTNAME$ $HOSTNAME$ $HOSTSTATE$"],
             "service_notification_commands":
                ["notify-svc-by-email $CONTACTNAME$ $HOSTNAME$ $SERVICEDESC$ $SERVICESTATE$"]}
        ],
        "hostgroups": [
            {"name": "webservers", "members": ["h1", "h2", "h3"]}
        ],
        "servicegroups": [
            {"name": "web", "members": [
                {"host": "h1", "description": "http"},
                {"host": "h2", "description": "http"}
            ]}
        ],
        "contactgroups": [
            {"name": "admins", "members": ["alice"]}
        ]
    }))
    .expect("fixture config is valid");
    ObjectStore::from_config(cfg).expect("fixture store builds")
}

/// A fresh core over the fixture graph with a recording observer
/// attached; returns the shared event log for assertions.
pub fn fixture_core() -> (Core, Rc<RefCell<Vec<BrokerEvent>>>) {
    let mut core = Core::new(Arc::new(Config::default()), fixture_store(), T0);
    let recorder = Recorder::new();
    let log = recorder.handle();
    core.attach_observer(Box::new(recorder));
    (core, log)
}

/// Key of the fixture's primary service.
pub fn http_key() -> ServiceKey {
    ServiceKey::new("h1", "http")
}

/// Counts recorded broker events matching a predicate.
pub fn count_matching(
    log: &Rc<RefCell<Vec<BrokerEvent>>>,
    pred: impl Fn(&BrokerEvent) -> bool,
) -> usize {
    log.borrow().iter().filter(|e| pred(e)).count()
}
