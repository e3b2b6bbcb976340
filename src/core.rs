//! The single-writer core: every piece of monitoring state the handlers
//! mutate, threaded explicitly through the engines instead of living in
//! globals.

use std::sync::Arc;

use crate::broker::{BrokerEvent, Observer, ObserverSet};
use crate::command::catalog::CommandRegistry;
use crate::command::handlers;
use crate::config::Config;
use crate::downtime::{self, DowntimeCatalog};
use crate::events::{EventAction, EventQueue};
use crate::notifications::SuppressionLedger;
use crate::objects::{CommentStore, ObjectStore, ProgramStatus, ServiceKey, Timestamp};
use crate::workers::JobTable;

/// Running totals reported at shutdown.
#[derive(Debug, Default, Clone)]
pub struct Counters {
    pub commands_processed: u64,
    pub commands_failed: u64,
    pub custom_commands: u64,
    pub notifications_sent: u64,
    pub jobs_completed: u64,
}

#[derive(Debug)]
pub struct Core {
    pub config: Arc<Config>,
    /// Wallclock as seen by the engines; the main loop refreshes it, tests
    /// drive it by hand.
    pub now: Timestamp,
    pub objects: ObjectStore,
    pub comments: CommentStore,
    pub downtimes: DowntimeCatalog,
    pub events: EventQueue,
    pub program: ProgramStatus,
    pub registry: CommandRegistry,
    pub observers: ObserverSet,
    pub suppressions: SuppressionLedger,
    pub counters: Counters,
    pub jobs: JobTable,
    next_notification_id: u64,
}

impl Core {
    /// Builds a core around a pre-populated object store with the full
    /// command catalog registered.
    pub fn new(config: Arc<Config>, objects: ObjectStore, now: Timestamp) -> Self {
        let mut registry = CommandRegistry::with_capacity(64);
        handlers::register_core_commands(&mut registry);
        Core {
            config,
            now,
            objects,
            comments: CommentStore::default(),
            downtimes: DowntimeCatalog::default(),
            events: EventQueue::new(),
            program: ProgramStatus {
                program_start: now,
                ..ProgramStatus::default()
            },
            registry,
            observers: ObserverSet::default(),
            suppressions: SuppressionLedger::default(),
            counters: Counters::default(),
            jobs: JobTable::new(),
            next_notification_id: 0,
        }
    }

    pub fn attach_observer(&mut self, observer: Box<dyn Observer>) {
        self.observers.attach(observer);
    }

    pub fn broadcast(&mut self, event: BrokerEvent) {
        self.observers.broadcast(event);
    }

    /// Opaque per-notification id, monotonically assigned.
    pub fn next_notification_id(&mut self) -> u64 {
        self.next_notification_id += 1;
        self.next_notification_id
    }

    // Status-update hooks. The core itself keeps no status files; writers
    // subscribe through the observer surface.

    pub fn update_host_status(&mut self, host: &str) {
        self.broadcast(BrokerEvent::HostStatus {
            host: host.to_string(),
        });
    }

    pub fn update_service_status(&mut self, key: &ServiceKey) {
        self.broadcast(BrokerEvent::ServiceStatus {
            service: key.clone(),
        });
    }

    pub fn update_contact_status(&mut self, contact: &str) {
        self.broadcast(BrokerEvent::ContactStatus {
            contact: contact.to_string(),
        });
    }

    pub fn update_program_status(&mut self) {
        self.broadcast(BrokerEvent::ProgramStatus);
    }

    /// Fires one timed event.
    pub fn dispatch_event(&mut self, action: EventAction) {
        match action {
            EventAction::DowntimeStart(id) => downtime::handle_downtime_start_event(self, id),
            EventAction::DowntimeStop(id) => downtime::handle_downtime_stop_event(self, id),
            EventAction::ExpireDowntimes => downtime::check_for_expired_downtime(self),
            EventAction::HostCheck(host) => {
                self.broadcast(BrokerEvent::HostCheckInitiated { host });
            }
            EventAction::ServiceCheck(service) => {
                self.broadcast(BrokerEvent::ServiceCheckInitiated { service });
            }
            EventAction::Shutdown => self.program.sigshutdown = true,
            EventAction::Restart => self.program.sigrestart = true,
        }
    }

    /// Advances the clock to `t`, firing every due event along the way in
    /// (time, sequence) order.
    pub fn run_events_until(&mut self, t: Timestamp) {
        while let Some(due) = self.events.next_due() {
            if due > t {
                break;
            }
            if due > self.now {
                self.now = due;
            }
            if let Some(action) = self.events.pop_due(self.now) {
                self.dispatch_event(action);
            }
        }
        if t > self.now {
            self.now = t;
        }
    }
}
