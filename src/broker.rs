//! Observer surface: the events the core publishes to external consumers
//! (status writers, retention, replication tools). Observers see mutations;
//! they cannot veto them.

use std::cell::RefCell;
use std::rc::Rc;

use crate::notifications::{NotificationReason, SuppressionKind, SuppressionReason};
use crate::objects::{ServiceKey, Timestamp};

/// One broker event. Fields carry just enough to reconstruct the log
/// surface; consumers needing full objects look them up in the store.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerEvent {
    AdaptiveProgram {
        command_id: i32,
        modified_host_attribute: u32,
        modified_host_attributes: u32,
        modified_service_attribute: u32,
        modified_service_attributes: u32,
    },
    AdaptiveHost {
        host: String,
        command_id: i32,
        attr: u32,
        modified_attributes: u32,
    },
    AdaptiveService {
        service: ServiceKey,
        command_id: i32,
        attr: u32,
        modified_attributes: u32,
    },
    AdaptiveContact {
        contact: String,
        command_id: i32,
        attr: u32,
        modified_attributes: u32,
    },
    ProgramStatus,
    HostStatus {
        host: String,
    },
    ServiceStatus {
        service: ServiceKey,
    },
    ContactStatus {
        contact: String,
    },
    ExternalCommandStart {
        command_id: i32,
        entry_time: Timestamp,
        name: String,
        args: String,
    },
    ExternalCommandEnd {
        command_id: i32,
        name: String,
    },
    DowntimeAdd {
        downtime_id: u64,
        host: String,
        service: Option<String>,
        start_time: Timestamp,
        end_time: Timestamp,
        fixed: bool,
        triggered_by: u64,
        duration: i64,
    },
    DowntimeStart {
        downtime_id: u64,
        host: String,
        service: Option<String>,
    },
    DowntimeStop {
        downtime_id: u64,
        host: String,
        service: Option<String>,
        cancelled: bool,
    },
    DowntimeDelete {
        downtime_id: u64,
    },
    FlappingStart {
        host: String,
        service: Option<String>,
        percent_change: f64,
        high_threshold: f64,
        low_threshold: f64,
    },
    FlappingStop {
        host: String,
        service: Option<String>,
        percent_change: f64,
        disabled: bool,
    },
    NotificationStart {
        host: String,
        service: Option<String>,
        reason: NotificationReason,
    },
    NotificationEnd {
        host: String,
        service: Option<String>,
        reason: NotificationReason,
        contacts_notified: u32,
    },
    ContactNotification {
        contact: String,
        host: String,
        service: Option<String>,
        reason: NotificationReason,
        command: String,
    },
    NotificationSuppressed {
        kind: SuppressionKind,
        object: String,
        reason: SuppressionReason,
    },
    HostCheckInitiated {
        host: String,
    },
    ServiceCheckInitiated {
        service: ServiceKey,
    },
    StateChange {
        host: String,
        service: Option<String>,
        state: i32,
        hard: bool,
    },
}

pub trait Observer {
    fn notify(&mut self, event: &BrokerEvent);
}

/// Broadcast fan-out owned by the core.
#[derive(Default)]
pub struct ObserverSet {
    observers: Vec<Box<dyn Observer>>,
}

impl ObserverSet {
    pub fn attach(&mut self, observer: Box<dyn Observer>) {
        self.observers.push(observer);
    }

    pub fn broadcast(&mut self, event: BrokerEvent) {
        for obs in &mut self.observers {
            obs.notify(&event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSet")
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Records every event; tests keep a clone of the shared log handle.
#[derive(Default, Clone)]
pub struct Recorder {
    log: Rc<RefCell<Vec<BrokerEvent>>>,
}

impl Recorder {
    #[must_use]
    pub fn new() -> Self {
        Recorder::default()
    }

    /// The shared log to inspect after handing the recorder to a core.
    pub fn handle(&self) -> Rc<RefCell<Vec<BrokerEvent>>> {
        Rc::clone(&self.log)
    }
}

impl Observer for Recorder {
    fn notify(&mut self, event: &BrokerEvent) {
        self.log.borrow_mut().push(event.clone());
    }
}
