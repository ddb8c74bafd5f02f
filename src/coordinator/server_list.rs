//! Authoritative registry of cluster servers
//!
//! Stores one entry per enlisted server in a sparse slot vector, keyed by
//! [`ServerId`]. Every state transition appends a delta record to the
//! pending update batch; committing a batch bumps the membership version
//! and hands the batch to the membership updater for dissemination.
//!
//! Lifecycle per entry: UP, then CRASHED once the server is suspected
//! down, then DOWN when its slot is reclaimed. No other transition exists.

use std::sync::Arc;

use crate::common::{Error, Result};
use crate::coordinator::ids::{ServerId, ServerStatus, ServiceMask, ServiceType};
use crate::coordinator::tracker::{ServerChangeEvent, ServerDetails, ServerTracker};
use crate::coordinator::updater::{MembershipUpdate, Recipient, UpdateSink};
use crate::proto;

/// Per-server record.
#[derive(Debug, Clone)]
pub struct ServerEntry {
    pub server_id: ServerId,
    pub service_locator: String,
    pub services: ServiceMask,
    /// Read bandwidth the server promised for recovery; backups only.
    pub expected_read_mbytes_per_sec: u32,
    pub status: ServerStatus,
    /// Planned partitioning of this master's tablets for recovery.
    /// `None` for servers without a master service.
    pub will: Option<proto::Tablets>,
    /// Id of the durable log record for this entry; 0 until logged.
    pub log_id: u64,
}

impl ServerEntry {
    fn new(
        server_id: ServerId,
        service_locator: &str,
        services: ServiceMask,
        expected_read_mbytes_per_sec: u32,
    ) -> Self {
        Self {
            server_id,
            service_locator: service_locator.to_string(),
            services,
            expected_read_mbytes_per_sec: if services.has(ServiceType::Backup) {
                expected_read_mbytes_per_sec
            } else {
                0
            },
            status: ServerStatus::Up,
            will: services.has(ServiceType::Master).then(proto::Tablets::default),
            log_id: 0,
        }
    }

    pub fn is_master(&self) -> bool {
        self.services.has(ServiceType::Master)
    }

    pub fn is_backup(&self) -> bool {
        self.services.has(ServiceType::Backup)
    }

    /// Serialize for the wire, reflecting the entry's current status.
    pub fn serialize(&self) -> proto::server_list::Entry {
        proto::server_list::Entry {
            services: self.services.serialize(),
            server_id: self.server_id.as_u64(),
            service_locator: self.service_locator.clone(),
            expected_read_mbytes_per_sec: self.expected_read_mbytes_per_sec,
            status: self.status as i32,
        }
    }

    fn details(&self) -> ServerDetails {
        ServerDetails {
            server_id: self.server_id,
            service_locator: self.service_locator.clone(),
            services: self.services,
            expected_read_mbytes_per_sec: self.expected_read_mbytes_per_sec,
            status: self.status,
        }
    }

    // Illegal transitions indicate coordinator state corruption; there is
    // no safe way to continue from them.
    fn advance(&mut self, next: ServerStatus) {
        let legal = matches!(
            (self.status, next),
            (ServerStatus::Up, ServerStatus::Crashed)
                | (ServerStatus::Crashed, ServerStatus::Down)
        );
        assert!(
            legal,
            "illegal status transition {:?} -> {:?} for server {}",
            self.status, next, self.server_id
        );
        self.status = next;
    }
}

#[derive(Default)]
struct Slot {
    entry: Option<ServerEntry>,
    /// Generation the next occupant of this slot will receive.
    next_generation: u32,
}

/// The versioned server list.
pub struct ServerList {
    /// Slot 0 stays empty so that index 0 denotes the invalid id.
    slots: Vec<Slot>,
    number_of_masters: u32,
    number_of_backups: u32,
    version: u64,
    /// Entry transitions accumulated since the last committed batch.
    updates: proto::ServerList,
    trackers: Vec<Arc<dyn ServerTracker>>,
    sink: Arc<dyn UpdateSink>,
}

impl ServerList {
    pub fn new(sink: Arc<dyn UpdateSink>) -> Self {
        Self {
            slots: Vec::new(),
            number_of_masters: 0,
            number_of_backups: 0,
            version: 0,
            updates: proto::ServerList::default(),
            trackers: Vec::new(),
            sink,
        }
    }

    /// Enlist a server, assigning it the lowest free slot.
    pub fn add(
        &mut self,
        service_locator: &str,
        services: ServiceMask,
        expected_read_mbytes_per_sec: u32,
    ) -> ServerId {
        let index = self.first_free_index();
        let generation = self.slots[index as usize].next_generation;
        let id = ServerId::new(index, generation);

        let entry = ServerEntry::new(id, service_locator, services, expected_read_mbytes_per_sec);
        if entry.is_master() {
            self.number_of_masters += 1;
        }
        if entry.is_backup() {
            self.number_of_backups += 1;
        }

        self.updates.server.push(entry.serialize());
        let details = entry.details();
        self.slots[index as usize].entry = Some(entry);

        tracing::debug!("server {} enlisted at {} ({})", id, service_locator, services);
        self.fire_trackers(&details, ServerChangeEvent::Added);
        id
    }

    /// Mark a server as crashed. Idempotent: a second call for the same
    /// id changes nothing and emits no delta.
    pub fn crashed(&mut self, id: ServerId) -> Result<()> {
        let entry = self.entry_mut(id)?;
        if entry.status == ServerStatus::Crashed {
            return Ok(());
        }
        entry.advance(ServerStatus::Crashed);

        let was_master = entry.is_master();
        let was_backup = entry.is_backup();
        let delta = entry.serialize();
        let details = entry.details();

        if was_master {
            self.number_of_masters -= 1;
        }
        if was_backup {
            self.number_of_backups -= 1;
        }
        self.updates.server.push(delta);

        tracing::info!("server {} ({}) crashed", id, details.service_locator);
        self.fire_trackers(&details, ServerChangeEvent::Crashed);
        Ok(())
    }

    /// Remove a server, freeing its slot. An UP server is first crashed,
    /// so the delta stream always shows UP -> CRASHED -> DOWN.
    pub fn remove(&mut self, id: ServerId) -> Result<()> {
        if self.entry(id)?.status == ServerStatus::Up {
            self.crashed(id)?;
        }

        let slot = &mut self.slots[id.index() as usize];
        let mut entry = slot.entry.take().expect("entry validated above");
        slot.next_generation += 1;

        entry.advance(ServerStatus::Down);
        self.updates.server.push(entry.serialize());
        let details = entry.details();

        tracing::info!("server {} removed; slot {} reclaimed", id, id.index());
        self.fire_trackers(&details, ServerChangeEvent::Removed);
        Ok(())
    }

    /// Look up a live entry by id.
    pub fn entry(&self, id: ServerId) -> Result<&ServerEntry> {
        self.slots
            .get(id.index() as usize)
            .and_then(|slot| slot.entry.as_ref())
            .filter(|entry| id.is_valid() && entry.server_id == id)
            .ok_or_else(|| Error::InvalidServerId(id.to_string()))
    }

    fn entry_mut(&mut self, id: ServerId) -> Result<&mut ServerEntry> {
        self.slots
            .get_mut(id.index() as usize)
            .and_then(|slot| slot.entry.as_mut())
            .filter(|entry| id.is_valid() && entry.server_id == id)
            .ok_or_else(|| Error::InvalidServerId(id.to_string()))
    }

    /// Borrow a master's will for extension.
    pub fn will_mut(&mut self, id: ServerId) -> Result<&mut proto::Tablets> {
        let display = id.to_string();
        self.entry_mut(id)?
            .will
            .as_mut()
            .ok_or(Error::InvalidServerId(display))
    }

    /// The will of a master, for snapshotting at recovery start.
    pub fn will(&self, id: ServerId) -> Result<&proto::Tablets> {
        self.entry(id)?
            .will
            .as_ref()
            .ok_or_else(|| Error::InvalidServerId(id.to_string()))
    }

    /// Entry occupying a slot, if any.
    pub fn entry_by_index(&self, index: u32) -> Option<&ServerEntry> {
        self.slots.get(index as usize).and_then(|s| s.entry.as_ref())
    }

    /// First UP server in slot order matching a locator and capability.
    pub fn find_up(&self, service_locator: &str, service: ServiceType) -> Option<ServerId> {
        self.slots.iter().find_map(|slot| {
            slot.entry
                .as_ref()
                .filter(|e| {
                    e.status == ServerStatus::Up
                        && e.services.has(service)
                        && e.service_locator == service_locator
                })
                .map(|e| e.server_id)
        })
    }

    /// Smallest index >= `from` holding an UP master, if any.
    pub fn next_master_index(&self, from: u32) -> Option<u32> {
        self.next_index_with(from, ServiceType::Master)
    }

    /// Smallest index >= `from` holding an UP backup, if any.
    pub fn next_backup_index(&self, from: u32) -> Option<u32> {
        self.next_index_with(from, ServiceType::Backup)
    }

    fn next_index_with(&self, from: u32, service: ServiceType) -> Option<u32> {
        (from as usize..self.slots.len())
            .find(|&i| {
                self.slots[i]
                    .entry
                    .as_ref()
                    .is_some_and(|e| e.status == ServerStatus::Up && e.services.has(service))
            })
            .map(|i| i as u32)
    }

    /// Serialize every entry whose services intersect `filter`, in slot
    /// order. CRASHED entries are included; freed slots are not.
    pub fn serialize(&self, filter: ServiceMask) -> proto::ServerList {
        proto::ServerList {
            server: self
                .slots
                .iter()
                .filter_map(|slot| slot.entry.as_ref())
                .filter(|e| e.services.intersects(filter))
                .map(|e| e.serialize())
                .collect(),
            version_number: self.version,
        }
    }

    /// Commit the pending delta batch: bump the version, stamp the batch,
    /// and hand it to the updater with the current recipient set. A call
    /// with nothing pending is a no-op.
    pub fn push_updates(&mut self, exclude: Option<ServerId>) {
        if self.updates.server.is_empty() {
            return;
        }

        self.version += 1;
        self.updates.version_number = self.version;
        let delta = std::mem::take(&mut self.updates);

        let recipients = self
            .slots
            .iter()
            .filter_map(|slot| slot.entry.as_ref())
            .filter(|e| {
                e.status == ServerStatus::Up
                    && e.services.has(ServiceType::Membership)
                    && Some(e.server_id) != exclude
            })
            .map(|e| Recipient {
                server_id: e.server_id,
                service_locator: e.service_locator.clone(),
            })
            .collect();

        self.sink.enqueue(MembershipUpdate {
            version: self.version,
            delta,
            full: self.serialize(ServiceMask::ALL),
            recipients,
        });
    }

    /// Record the durable log entry backing this server's enlistment.
    pub fn set_log_id(&mut self, id: ServerId, log_id: u64) -> Result<()> {
        self.entry_mut(id)?.log_id = log_id;
        Ok(())
    }

    pub fn log_id(&self, id: ServerId) -> Result<u64> {
        Ok(self.entry(id)?.log_id)
    }

    /// Subscribe an observer. The tracker is first backfilled with an
    /// `Added` event for every occupied slot.
    pub fn register_tracker(&mut self, tracker: Arc<dyn ServerTracker>) {
        for slot in &self.slots {
            if let Some(entry) = &slot.entry {
                tracker.server_changed(&entry.details(), ServerChangeEvent::Added);
            }
        }
        self.trackers.push(tracker);
    }

    pub fn unregister_tracker(&mut self, tracker: &Arc<dyn ServerTracker>) {
        self.trackers.retain(|t| !Arc::ptr_eq(t, tracker));
    }

    pub fn number_of_masters(&self) -> u32 {
        self.number_of_masters
    }

    pub fn number_of_backups(&self) -> u32 {
        self.number_of_backups
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Transitions accumulated since the last committed batch.
    pub fn pending_updates(&self) -> &proto::ServerList {
        &self.updates
    }

    fn first_free_index(&mut self) -> u32 {
        if self.slots.is_empty() {
            self.slots.push(Slot::default()); // reserved slot 0
        }
        for i in 1..self.slots.len() {
            if self.slots[i].entry.is_none() {
                return i as u32;
            }
        }
        self.slots.push(Slot::default());
        (self.slots.len() - 1) as u32
    }

    fn fire_trackers(&self, details: &ServerDetails, event: ServerChangeEvent) {
        for tracker in &self.trackers {
            tracker.server_changed(details, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct CollectSink {
        updates: Mutex<Vec<MembershipUpdate>>,
    }

    impl CollectSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                updates: Mutex::new(Vec::new()),
            })
        }

        fn pop(&self) -> Option<MembershipUpdate> {
            let mut updates = self.updates.lock().unwrap();
            if updates.is_empty() {
                None
            } else {
                Some(updates.remove(0))
            }
        }
    }

    impl UpdateSink for CollectSink {
        fn enqueue(&self, update: MembershipUpdate) {
            self.updates.lock().unwrap().push(update);
        }
    }

    struct MockTracker {
        changes: Mutex<VecDeque<(ServerDetails, ServerChangeEvent)>>,
    }

    impl MockTracker {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                changes: Mutex::new(VecDeque::new()),
            })
        }

        fn pop(&self) -> Option<(ServerDetails, ServerChangeEvent)> {
            self.changes.lock().unwrap().pop_front()
        }
    }

    impl ServerTracker for MockTracker {
        fn server_changed(&self, server: &ServerDetails, event: ServerChangeEvent) {
            self.changes
                .lock()
                .unwrap()
                .push_back((server.clone(), event));
        }
    }

    fn new_list() -> (ServerList, Arc<CollectSink>) {
        let sink = CollectSink::new();
        (ServerList::new(sink.clone()), sink)
    }

    fn entry_matches(
        wire: &proto::server_list::Entry,
        entry: &ServerEntry,
        status: ServerStatus,
    ) -> bool {
        wire.services == entry.services.serialize()
            && wire.server_id == entry.server_id.as_u64()
            && wire.service_locator == entry.service_locator
            && wire.expected_read_mbytes_per_sec == entry.expected_read_mbytes_per_sec
            && wire.status == status as i32
    }

    #[test]
    fn test_add() {
        let (mut sl, sink) = new_list();
        assert_eq!(sl.number_of_masters(), 0);
        assert_eq!(sl.number_of_backups(), 0);

        let m = sl.add("mock:host=server1", ServiceMask::MASTER, 100);
        assert_eq!(m, ServerId::new(1, 0));
        assert_eq!(sl.number_of_masters(), 1);
        assert_eq!(sl.number_of_backups(), 0);
        let entry = sl.entry(m).unwrap().clone();
        assert_eq!(entry.service_locator, "mock:host=server1");
        assert!(entry.is_master());
        assert!(!entry.is_backup());
        // Not a backup, so the read estimate is dropped.
        assert_eq!(entry.expected_read_mbytes_per_sec, 0);
        assert!(entry.will.is_some());

        assert_eq!(sl.version(), 0);
        sl.push_updates(None);
        assert_eq!(sl.version(), 1);
        let update = sink.pop().unwrap();
        assert_eq!(update.version, 1);
        assert_eq!(update.delta.version_number, 1);
        assert_eq!(update.delta.server.len(), 1);
        assert!(entry_matches(&update.delta.server[0], &entry, ServerStatus::Up));

        let b = sl.add("mock:host=server2", ServiceMask::BACKUP, 100);
        assert_eq!(b, ServerId::new(2, 0));
        let entry = sl.entry(b).unwrap();
        assert!(entry.is_backup());
        assert_eq!(entry.expected_read_mbytes_per_sec, 100);
        assert!(entry.will.is_none());
        assert_eq!(sl.number_of_masters(), 1);
        assert_eq!(sl.number_of_backups(), 1);

        sl.push_updates(None);
        assert_eq!(sl.version(), 2);
        assert_eq!(sink.pop().unwrap().delta.server.len(), 1);
    }

    #[test]
    fn test_push_updates_empty_batch_is_noop() {
        let (mut sl, sink) = new_list();
        sl.push_updates(None);
        assert_eq!(sl.version(), 0);
        assert!(sink.pop().is_none());
    }

    #[test]
    fn test_crashed() {
        let (mut sl, _sink) = new_list();
        assert!(matches!(
            sl.crashed(ServerId::INVALID),
            Err(Error::InvalidServerId(_))
        ));

        let m = sl.add("mock:host=m1", ServiceMask::MASTER, 0);
        let before = sl.entry(m).unwrap().clone();
        sl.updates = proto::ServerList::default();

        sl.crashed(m).unwrap();
        assert_eq!(sl.entry(m).unwrap().status, ServerStatus::Crashed);
        assert_eq!(sl.pending_updates().server.len(), 1);
        assert!(entry_matches(
            &sl.pending_updates().server[0],
            &before,
            ServerStatus::Crashed
        ));
        assert_eq!(sl.number_of_masters(), 0);

        // Already crashed: no-op, no delta.
        sl.updates = proto::ServerList::default();
        sl.crashed(m).unwrap();
        assert!(sl.pending_updates().server.is_empty());
        assert_eq!(sl.number_of_masters(), 0);
    }

    #[test]
    fn test_remove() {
        let (mut sl, _sink) = new_list();
        assert!(sl.remove(ServerId::INVALID).is_err());

        let m = sl.add("mock:host=m1", ServiceMask::MASTER, 0);
        let before = sl.entry(m).unwrap().clone();
        sl.updates = proto::ServerList::default();

        // Removing an UP server implies the crash first.
        sl.remove(m).unwrap();
        assert!(sl.entry(m).is_err());
        assert_eq!(sl.pending_updates().server.len(), 2);
        assert!(entry_matches(
            &sl.pending_updates().server[0],
            &before,
            ServerStatus::Crashed
        ));
        assert!(entry_matches(
            &sl.pending_updates().server[1],
            &before,
            ServerStatus::Down
        ));
        assert_eq!(sl.number_of_masters(), 0);
        assert!(sl.remove(m).is_err());

        // Slot reuse bumps the generation.
        let b = sl.add("mock:host=b1", ServiceMask::BACKUP, 100);
        assert_eq!(b, ServerId::new(1, 1));
        sl.crashed(b).unwrap();
        sl.updates = proto::ServerList::default();
        assert!(sl.remove(ServerId::new(1, 2)).is_err());
        sl.remove(b).unwrap();
        // Crashed already: only the DOWN delta.
        assert_eq!(sl.pending_updates().server.len(), 1);
        assert_eq!(
            sl.pending_updates().server[0].status,
            ServerStatus::Down as i32
        );
        assert_eq!(sl.number_of_backups(), 0);
    }

    #[test]
    fn test_entry_lookup() {
        let (mut sl, _sink) = new_list();
        assert!(sl.entry(ServerId::INVALID).is_err());

        let m = sl.add("mock:host=m1", ServiceMask::MASTER, 0);
        assert_eq!(sl.entry(m).unwrap().server_id, m);
        assert!(sl.entry(ServerId::new(1, 1)).is_err());
        assert!(sl.entry(ServerId::new(2, 0)).is_err());

        sl.remove(m).unwrap();
        assert!(sl.entry(m).is_err());
    }

    #[test]
    fn test_next_master_index() {
        let (mut sl, _sink) = new_list();
        assert_eq!(sl.next_master_index(0), None);

        sl.add("", ServiceMask::BACKUP, 0);
        sl.add("", ServiceMask::MASTER, 0);
        sl.add("", ServiceMask::BACKUP, 0);
        sl.add("", ServiceMask::BACKUP, 0);
        sl.add("", ServiceMask::MASTER, 0);
        sl.add("", ServiceMask::BACKUP, 0);

        assert_eq!(sl.next_master_index(0), Some(2));
        assert_eq!(sl.next_master_index(2), Some(2));
        assert_eq!(sl.next_master_index(3), Some(5));
        assert_eq!(sl.next_master_index(6), None);
    }

    #[test]
    fn test_next_backup_index() {
        let (mut sl, _sink) = new_list();
        assert_eq!(sl.next_backup_index(0), None);

        sl.add("", ServiceMask::MASTER, 0);
        sl.add("", ServiceMask::BACKUP, 0);
        sl.add("", ServiceMask::MASTER, 0);

        assert_eq!(sl.next_backup_index(0), Some(2));
        assert_eq!(sl.next_backup_index(2), Some(2));
        assert_eq!(sl.next_backup_index(3), None);
    }

    #[test]
    fn test_crashed_master_not_selectable() {
        let (mut sl, _sink) = new_list();
        let m = sl.add("", ServiceMask::MASTER, 0);
        assert_eq!(sl.next_master_index(0), Some(1));
        sl.crashed(m).unwrap();
        assert_eq!(sl.next_master_index(0), None);
    }

    #[test]
    fn test_serialize_filters() {
        let (mut sl, _sink) = new_list();
        assert!(sl.serialize(ServiceMask::ALL).server.is_empty());

        let first = sl.add("", ServiceMask::MASTER, 100);
        sl.add("", ServiceMask::MASTER, 100);
        sl.add("", ServiceMask::MASTER, 100);
        sl.add("", ServiceMask::BACKUP, 100);
        let last = sl.add("", ServiceMask::MASTER | ServiceMask::BACKUP, 100);
        sl.remove(first).unwrap(); // freed slots are skipped
        sl.crashed(last).unwrap(); // crashed entries are included

        assert!(sl.serialize(ServiceMask::EMPTY).server.is_empty());

        let masters = sl.serialize(ServiceMask::MASTER);
        assert_eq!(masters.server.len(), 3);
        assert_eq!(masters.server[2].status, ServerStatus::Crashed as i32);

        let backups = sl.serialize(ServiceMask::BACKUP);
        assert_eq!(backups.server.len(), 2);
        assert_eq!(backups.server[1].status, ServerStatus::Crashed as i32);

        let both = sl.serialize(ServiceMask::MASTER | ServiceMask::BACKUP);
        assert_eq!(both.server.len(), 4);
    }

    #[test]
    fn test_first_free_index_reuses_lowest() {
        let (mut sl, _sink) = new_list();
        let a = sl.add("a", ServiceMask::MASTER, 0);
        let b = sl.add("b", ServiceMask::MASTER, 0);
        let c = sl.add("c", ServiceMask::MASTER, 0);
        assert_eq!((a.index(), b.index(), c.index()), (1, 2, 3));

        sl.remove(b).unwrap();
        let d = sl.add("d", ServiceMask::MASTER, 0);
        assert_eq!(d, ServerId::new(2, 1));

        let e = sl.add("e", ServiceMask::MASTER, 0);
        assert_eq!(e.index(), 4);
    }

    #[test]
    fn test_push_updates_recipients() {
        let (mut sl, sink) = new_list();
        let subscribed = sl.add("mock:host=s1", ServiceMask::MEMBERSHIP, 0);
        let crashed = sl.add("mock:host=s2", ServiceMask::MEMBERSHIP, 0);
        sl.add("mock:host=s3", ServiceMask::MASTER, 0);
        let excluded = sl.add("mock:host=s4", ServiceMask::MEMBERSHIP, 0);
        sl.crashed(crashed).unwrap();

        sl.push_updates(Some(excluded));
        let update = sink.pop().unwrap();
        assert_eq!(update.recipients.len(), 1);
        assert_eq!(update.recipients[0].server_id, subscribed);
        assert_eq!(update.full.version_number, update.version);
        // The full snapshot covers every live entry, crashed included.
        assert_eq!(update.full.server.len(), 4);
    }

    #[test]
    fn test_tracker_events() {
        let (mut sl, _sink) = new_list();
        let tracker = MockTracker::new();
        sl.register_tracker(tracker.clone());

        let m = sl.add("mock:host=m1", ServiceMask::MASTER, 100);
        let (details, event) = tracker.pop().unwrap();
        assert_eq!(event, ServerChangeEvent::Added);
        assert_eq!(details.server_id, m);
        assert_eq!(details.service_locator, "mock:host=m1");
        assert_eq!(details.services, ServiceMask::MASTER);
        assert_eq!(details.expected_read_mbytes_per_sec, 0);
        assert_eq!(details.status, ServerStatus::Up);

        sl.crashed(m).unwrap();
        let (details, event) = tracker.pop().unwrap();
        assert_eq!(event, ServerChangeEvent::Crashed);
        assert_eq!(details.status, ServerStatus::Crashed);

        sl.remove(m).unwrap();
        let (details, event) = tracker.pop().unwrap();
        assert_eq!(event, ServerChangeEvent::Removed);
        assert_eq!(details.status, ServerStatus::Down);
        assert!(tracker.pop().is_none());
    }

    #[test]
    fn test_tracker_backfill() {
        let (mut sl, _sink) = new_list();
        let m = sl.add("m", ServiceMask::MASTER, 0);
        let b = sl.add("b", ServiceMask::BACKUP, 0);

        let tracker = MockTracker::new();
        sl.register_tracker(tracker.clone());

        let (details, event) = tracker.pop().unwrap();
        assert_eq!((details.server_id, event), (m, ServerChangeEvent::Added));
        let (details, event) = tracker.pop().unwrap();
        assert_eq!((details.server_id, event), (b, ServerChangeEvent::Added));
        assert!(tracker.pop().is_none());

        sl.unregister_tracker(&(tracker.clone() as Arc<dyn ServerTracker>));
        sl.add("c", ServiceMask::MASTER, 0);
        assert!(tracker.pop().is_none());
    }

    #[test]
    fn test_log_id() {
        let (mut sl, _sink) = new_list();
        let m = sl.add("", ServiceMask::MASTER, 0);
        assert_eq!(sl.log_id(m).unwrap(), 0);
        sl.set_log_id(m, 10).unwrap();
        assert_eq!(sl.log_id(m).unwrap(), 10);
        assert!(sl.set_log_id(ServerId::new(1, 1), 11).is_err());
    }
}
