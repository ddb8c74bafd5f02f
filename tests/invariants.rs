//! Invariant checks over scripted operation sequences
//!
//! These drive the server list and tablet map through long deterministic
//! op sequences and assert the structural invariants hold at every
//! quiescent point.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tabletkv::coordinator::ids::{ServerId, ServerStatus, ServiceMask};
use tabletkv::coordinator::server_list::ServerList;
use tabletkv::coordinator::tablet_map::{Tablet, TabletMap, TabletState};
use tabletkv::coordinator::updater::{MembershipUpdate, UpdateSink};
use tabletkv::proto;

/// Collects committed updates instead of dispatching them.
#[derive(Default)]
struct CollectSink {
    updates: Mutex<Vec<MembershipUpdate>>,
}

impl CollectSink {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn updates(&self) -> Vec<MembershipUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

impl UpdateSink for CollectSink {
    fn enqueue(&self, update: MembershipUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}

/// Small deterministic generator so the op mix is reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 16
    }
}

#[test]
fn test_server_ids_never_repeat() {
    let sink = CollectSink::new();
    let mut sl = ServerList::new(sink.clone());
    let mut rng = Lcg(42);

    let mut issued: HashSet<ServerId> = HashSet::new();
    let mut live: Vec<ServerId> = Vec::new();

    for _ in 0..500 {
        match rng.next() % 3 {
            0 => {
                let services = match rng.next() % 3 {
                    0 => ServiceMask::MASTER,
                    1 => ServiceMask::BACKUP,
                    _ => ServiceMask::MASTER | ServiceMask::BACKUP,
                };
                let id = sl.add("mock:host=x", services, 100);
                assert!(issued.insert(id), "server id {id} issued twice");
                live.push(id);
            }
            1 if !live.is_empty() => {
                let id = live[(rng.next() as usize) % live.len()];
                sl.crashed(id).unwrap();
            }
            2 if !live.is_empty() => {
                let idx = (rng.next() as usize) % live.len();
                let id = live.swap_remove(idx);
                sl.remove(id).unwrap();
            }
            _ => {}
        }
        sl.push_updates(None);

        // No two live entries share a slot index.
        let mut slots = HashSet::new();
        for id in &live {
            assert!(slots.insert(id.index()));
            assert_eq!(sl.entry(*id).unwrap().server_id, *id);
        }
    }
}

#[test]
fn test_counters_match_recount() {
    let sink = CollectSink::new();
    let mut sl = ServerList::new(sink);
    let mut rng = Lcg(7);
    let mut live: Vec<ServerId> = Vec::new();

    for _ in 0..300 {
        match rng.next() % 4 {
            0 | 1 => {
                let services = match rng.next() % 3 {
                    0 => ServiceMask::MASTER,
                    1 => ServiceMask::BACKUP,
                    _ => ServiceMask::MASTER | ServiceMask::BACKUP,
                };
                live.push(sl.add("", services, 0));
            }
            2 if !live.is_empty() => {
                let id = live[(rng.next() as usize) % live.len()];
                sl.crashed(id).unwrap();
            }
            3 if !live.is_empty() => {
                let idx = (rng.next() as usize) % live.len();
                sl.remove(live.swap_remove(idx)).unwrap();
            }
            _ => {}
        }

        let all = sl.serialize(ServiceMask::ALL);
        let masters = all
            .server
            .iter()
            .filter(|e| {
                e.status == ServerStatus::Up as i32
                    && ServiceMask::deserialize(e.services).intersects(ServiceMask::MASTER)
            })
            .count() as u32;
        let backups = all
            .server
            .iter()
            .filter(|e| {
                e.status == ServerStatus::Up as i32
                    && ServiceMask::deserialize(e.services).intersects(ServiceMask::BACKUP)
            })
            .count() as u32;
        assert_eq!(sl.number_of_masters(), masters);
        assert_eq!(sl.number_of_backups(), backups);
    }
}

#[test]
fn test_delta_stream_is_ordered_and_monotone() {
    let sink = CollectSink::new();
    let mut sl = ServerList::new(sink.clone());
    let mut rng = Lcg(1234);
    let mut live: Vec<ServerId> = Vec::new();

    for _ in 0..200 {
        match rng.next() % 3 {
            0 => live.push(sl.add("", ServiceMask::MASTER, 0)),
            1 if !live.is_empty() => {
                let id = live[(rng.next() as usize) % live.len()];
                sl.crashed(id).unwrap();
            }
            2 if !live.is_empty() => {
                let idx = (rng.next() as usize) % live.len();
                sl.remove(live.swap_remove(idx)).unwrap();
            }
            _ => {}
        }
        if rng.next() % 2 == 0 {
            sl.push_updates(None);
        }
    }
    sl.push_updates(None);

    let updates = sink.updates();
    assert!(!updates.is_empty());

    // Versions are strictly monotone over the committed stream.
    let mut last_version = 0;
    for update in &updates {
        assert!(update.version > last_version);
        assert_eq!(update.delta.version_number, update.version);
        last_version = update.version;
    }

    // Per server id, statuses only ever move forward: UP, CRASHED, DOWN.
    let mut last_status: HashMap<u64, i32> = HashMap::new();
    for update in &updates {
        for entry in &update.delta.server {
            if let Some(prev) = last_status.get(&entry.server_id) {
                assert!(
                    entry.status > *prev,
                    "status went backwards for server {}",
                    entry.server_id
                );
            }
            last_status.insert(entry.server_id, entry.status);
        }
    }
}

#[test]
fn test_crash_is_idempotent_in_delta_stream() {
    let sink = CollectSink::new();
    let mut sl = ServerList::new(sink.clone());

    let id = sl.add("", ServiceMask::MASTER, 0);
    sl.crashed(id).unwrap();
    sl.crashed(id).unwrap();
    sl.push_updates(None);

    let updates = sink.updates();
    assert_eq!(updates.len(), 1);
    let crashed: Vec<_> = updates[0]
        .delta
        .server
        .iter()
        .filter(|e| e.status == ServerStatus::Crashed as i32)
        .collect();
    assert_eq!(crashed.len(), 1);
}

fn assert_full_coverage(map: &TabletMap, table_id: u64) {
    let mut ranges: Vec<(u64, u64)> = map
        .tablets()
        .iter()
        .filter(|t| t.table_id == table_id)
        .map(|t| (t.start_key, t.end_key))
        .collect();
    assert!(!ranges.is_empty(), "table {table_id} has no tablets");
    ranges.sort_unstable();

    assert_eq!(ranges[0].0, 0);
    for window in ranges.windows(2) {
        assert_eq!(
            window[1].0,
            window[0].1.wrapping_add(1),
            "gap or overlap in table {table_id}"
        );
    }
    assert_eq!(ranges.last().unwrap().1, u64::MAX);
}

#[test]
fn test_tablet_coverage_through_recovery() {
    let mut map = TabletMap::new();
    let dead = ServerId::new(1, 0);
    let m2 = ServerId::new(2, 0);
    let m3 = ServerId::new(3, 0);

    map.add_tablet(Tablet {
        table_id: 0,
        start_key: 0,
        end_key: u64::MAX,
        state: TabletState::Normal,
        server_id: dead,
        service_locator: "mock:host=m1".to_string(),
        user_data: 0,
    });
    map.add_tablet(Tablet {
        table_id: 1,
        start_key: 0,
        end_key: (1 << 63) - 1,
        state: TabletState::Normal,
        server_id: dead,
        service_locator: "mock:host=m1".to_string(),
        user_data: 0,
    });
    map.add_tablet(Tablet {
        table_id: 1,
        start_key: 1 << 63,
        end_key: u64::MAX,
        state: TabletState::Normal,
        server_id: m2,
        service_locator: "mock:host=m2".to_string(),
        user_data: 1,
    });
    assert_full_coverage(&map, 0);
    assert_full_coverage(&map, 1);

    assert_eq!(map.set_recovering(dead), 2);
    assert_full_coverage(&map, 0);
    assert_full_coverage(&map, 1);

    // Recovery reassigns the dead ranges across the survivors.
    let recovered = proto::Tablets {
        tablet: vec![
            proto::tablets::Tablet {
                table_id: 0,
                start_key: 0,
                end_key: u64::MAX,
                state: proto::tablets::State::Normal as i32,
                server_id: m2.as_u64(),
                service_locator: "mock:host=m2".to_string(),
                user_data: 0,
            },
            proto::tablets::Tablet {
                table_id: 1,
                start_key: 0,
                end_key: (1 << 63) - 1,
                state: proto::tablets::State::Normal as i32,
                server_id: m3.as_u64(),
                service_locator: "mock:host=m3".to_string(),
                user_data: 0,
            },
        ],
    };
    map.tablets_recovered(dead, &recovered).unwrap();

    assert_full_coverage(&map, 0);
    assert_full_coverage(&map, 1);
    assert!(map
        .tablets()
        .iter()
        .all(|t| t.state == TabletState::Normal && t.server_id != dead));
}

#[test]
fn test_will_partitions_match_owned_tablets() {
    // Mirrors what the service maintains: every tablet a master owns has
    // exactly one will entry, and the last will entry carries the highest
    // partition id in use.
    let sink = CollectSink::new();
    let mut sl = ServerList::new(sink);
    let master = sl.add("mock:host=m1", ServiceMask::MASTER, 0);

    let will = sl.will_mut(master).unwrap();
    for table_id in 0..4 {
        let partition_id = will.tablet.last().map(|t| t.user_data).unwrap_or(0);
        will.tablet.push(proto::tablets::Tablet {
            table_id,
            start_key: 0,
            end_key: u64::MAX,
            state: proto::tablets::State::Normal as i32,
            server_id: master.as_u64(),
            service_locator: "mock:host=m1".to_string(),
            user_data: partition_id,
        });
    }

    let will = sl.will(master).unwrap();
    assert_eq!(will.tablet.len(), 4);
    let max_partition = will.tablet.iter().map(|t| t.user_data).max().unwrap();
    assert_eq!(will.tablet.last().unwrap().user_data, max_partition);
}
