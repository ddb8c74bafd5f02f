//! Tablet map and table name index
//!
//! Tracks which master owns each key range of each table. Ranges use
//! inclusive 64-bit bounds; a single-tablet table covers
//! `[0, u64::MAX]`. Tablets of a crashed master sit in `Recovering`
//! until a recovery acknowledgement replaces them.

use std::collections::{BTreeSet, HashMap};

use crate::common::{Error, Result};
use crate::coordinator::ids::ServerId;
use crate::proto;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabletState {
    Normal,
    Recovering,
}

impl TabletState {
    fn to_wire(self) -> proto::tablets::State {
        match self {
            TabletState::Normal => proto::tablets::State::Normal,
            TabletState::Recovering => proto::tablets::State::Recovering,
        }
    }
}

/// One contiguous key range of a table, owned by one master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tablet {
    pub table_id: u64,
    pub start_key: u64,
    pub end_key: u64,
    pub state: TabletState,
    pub server_id: ServerId,
    pub service_locator: String,
    pub user_data: u64,
}

impl Tablet {
    pub fn serialize(&self) -> proto::tablets::Tablet {
        proto::tablets::Tablet {
            table_id: self.table_id,
            start_key: self.start_key,
            end_key: self.end_key,
            state: self.state.to_wire() as i32,
            server_id: self.server_id.as_u64(),
            service_locator: self.service_locator.clone(),
            user_data: self.user_data,
        }
    }
}

/// Ordered collection of every tablet in the cluster.
#[derive(Default)]
pub struct TabletMap {
    tablets: Vec<Tablet>,
}

impl TabletMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tablets(&self) -> &[Tablet] {
        &self.tablets
    }

    pub fn len(&self) -> usize {
        self.tablets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tablets.is_empty()
    }

    pub fn add_tablet(&mut self, tablet: Tablet) {
        self.tablets.push(tablet);
    }

    /// Delete every tablet of a table, returning the removed entries.
    pub fn remove_table(&mut self, table_id: u64) -> Vec<Tablet> {
        let (removed, kept) = std::mem::take(&mut self.tablets)
            .into_iter()
            .partition(|t| t.table_id == table_id);
        self.tablets = kept;
        removed
    }

    /// Masters currently owning at least one tablet of a table.
    pub fn table_owners(&self, table_id: u64) -> Vec<(ServerId, String)> {
        let mut seen = BTreeSet::new();
        self.tablets
            .iter()
            .filter(|t| t.table_id == table_id)
            .filter(|t| seen.insert(t.server_id))
            .map(|t| (t.server_id, t.service_locator.clone()))
            .collect()
    }

    /// Move every tablet of a master into `Recovering`. Returns how many
    /// tablets changed.
    pub fn set_recovering(&mut self, server_id: ServerId) -> usize {
        let mut count = 0;
        for tablet in &mut self.tablets {
            if tablet.server_id == server_id && tablet.state == TabletState::Normal {
                tablet.state = TabletState::Recovering;
                count += 1;
            }
        }
        count
    }

    /// Replace the recovering tablets of a dead master with recovered
    /// entries pointing at their new owners.
    ///
    /// The new set must cover exactly the ranges that were recovering for
    /// `dead`; anything else fails with `RecoveryMismatch` and leaves the
    /// map untouched.
    pub fn tablets_recovered(&mut self, dead: ServerId, recovered: &proto::Tablets) -> Result<()> {
        let old_ranges: BTreeSet<(u64, u64, u64)> = self
            .tablets
            .iter()
            .filter(|t| t.server_id == dead && t.state == TabletState::Recovering)
            .map(|t| (t.table_id, t.start_key, t.end_key))
            .collect();
        let new_ranges: BTreeSet<(u64, u64, u64)> = recovered
            .tablet
            .iter()
            .map(|t| (t.table_id, t.start_key, t.end_key))
            .collect();

        if old_ranges != new_ranges || recovered.tablet.len() != new_ranges.len() {
            return Err(Error::RecoveryMismatch(format!(
                "{} recovering ranges for server {}, got {} recovered",
                old_ranges.len(),
                dead,
                recovered.tablet.len()
            )));
        }

        self.tablets
            .retain(|t| !(t.server_id == dead && t.state == TabletState::Recovering));
        for t in &recovered.tablet {
            self.tablets.push(Tablet {
                table_id: t.table_id,
                start_key: t.start_key,
                end_key: t.end_key,
                state: TabletState::Normal,
                server_id: ServerId::from_u64(t.server_id),
                service_locator: t.service_locator.clone(),
                user_data: t.user_data,
            });
        }
        Ok(())
    }

    pub fn serialize(&self) -> proto::Tablets {
        proto::Tablets {
            tablet: self.tablets.iter().map(Tablet::serialize).collect(),
        }
    }
}

/// Name index over tables.
#[derive(Default)]
pub struct Tables {
    by_name: HashMap<String, u64>,
    next_table_id: u64,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id for a new table name; `None` if the name exists.
    pub fn allocate(&mut self, name: &str) -> Option<u64> {
        if self.by_name.contains_key(name) {
            return None;
        }
        let table_id = self.next_table_id;
        self.next_table_id += 1;
        self.by_name.insert(name.to_string(), table_id);
        Some(table_id)
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.by_name.get(name).copied()
    }

    pub fn remove(&mut self, name: &str) -> Option<u64> {
        self.by_name.remove(name)
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
