// Trunkline: a VLAN service broker over composite switch/aggregator fabrics
// Copyright (C) 2026  The Trunkline Authors
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! # Trunk (§4.4)
//!
//! An undirected edge between two internal terminals of two inferior
//! networks, carrying a pool of VLAN labels and a bidirectional bandwidth
//! budget. All mutation here is expected to happen while the enclosing
//! aggregator's lock is held — `Trunk` itself does no locking.

use std::collections::{BTreeSet, HashMap};

use crate::error::Error;
use crate::ids::{Label, NetworkId, ServiceId, TerminalId, TrunkId};

/// One allocated pair of labels plus the bandwidth reserved alongside them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Allocation {
    /// The label on side A.
    pub label_a: Label,
    /// The label on side B, per the deterministic correspondence rule.
    pub label_b: Label,
    /// Reserved upstream bandwidth.
    pub bandwidth_up: f64,
    /// Reserved downstream bandwidth.
    pub bandwidth_down: f64,
    /// The (aggregator-local) service this allocation belongs to.
    pub service: ServiceId,
}

/// A bidirectional link between two internal terminals of two inferior
/// networks.
#[derive(Debug)]
pub struct Trunk {
    id: TrunkId,
    side_a: (NetworkId, TerminalId),
    side_b: (NetworkId, TerminalId),
    delay: f64,
    capacity_up: f64,
    capacity_down: f64,
    remaining_up: f64,
    remaining_down: f64,
    declared: BTreeSet<u32>,
    free_a: BTreeSet<u32>,
    free_b: BTreeSet<u32>,
    allocations: HashMap<u32, Allocation>,
}

impl Trunk {
    /// Declares a new trunk with a full label range and initial capacity.
    pub fn new(
        id: TrunkId,
        side_a: (NetworkId, TerminalId),
        side_b: (NetworkId, TerminalId),
        delay: f64,
        capacity_up: f64,
        capacity_down: f64,
        labels: impl IntoIterator<Item = u32>,
    ) -> Self {
        let declared: BTreeSet<u32> = labels.into_iter().collect();
        Self {
            id,
            side_a,
            side_b,
            delay,
            capacity_up,
            capacity_down,
            remaining_up: capacity_up,
            remaining_down: capacity_down,
            free_a: declared.clone(),
            free_b: declared.clone(),
            declared,
            allocations: HashMap::new(),
        }
    }

    /// The trunk's id.
    pub fn id(&self) -> TrunkId {
        self.id
    }

    /// The two internal terminals this trunk connects.
    pub fn sides(&self) -> ((NetworkId, TerminalId), (NetworkId, TerminalId)) {
        (self.side_a, self.side_b)
    }

    /// The additive routing cost of crossing this trunk.
    pub fn delay(&self) -> f64 {
        self.delay
    }

    /// Remaining bandwidth available in both directions (the smaller of the
    /// two, since a service needs the floor satisfied in each direction).
    pub fn remaining_capacity(&self) -> f64 {
        self.remaining_up.min(self.remaining_down)
    }

    /// True if a label is allocated to a specific service (I3).
    pub fn allocation_for(&self, label_a: Label) -> Option<&Allocation> {
        self.allocations.get(&label_a.0)
    }

    /// All current allocations, for invariant checks and persistence.
    pub fn allocations(&self) -> impl Iterator<Item = &Allocation> {
        self.allocations.values()
    }

    /// The full declared label range (allocated and free alike), for persistence.
    pub fn declared_labels(&self) -> Vec<u32> {
        self.declared.iter().copied().collect()
    }

    /// The upstream bandwidth budget, for persistence.
    pub fn capacity_up(&self) -> f64 {
        self.capacity_up
    }

    /// The downstream bandwidth budget, for persistence.
    pub fn capacity_down(&self) -> f64 {
        self.capacity_down
    }

    /// True if nothing is currently allocated on this trunk.
    pub fn is_idle(&self) -> bool {
        self.allocations.is_empty()
    }

    /// Allocates one label pair and reserves `bandwidth_{up,down}` for
    /// `service`. Label correspondence: lowest free label on side A, then
    /// the same numeric label on side B if free, else lowest free on side B
    /// (§4.4).
    pub fn allocate(&mut self, bandwidth_up: f64, bandwidth_down: f64, service: ServiceId) -> Result<(Label, Label), Error> {
        if bandwidth_up > self.remaining_up || bandwidth_down > self.remaining_down {
            return Err(Error::OutOfBandwidth(self.id));
        }
        let Some(&label_a) = self.free_a.iter().next() else {
            return Err(Error::OutOfLabels(self.id));
        };
        let label_b = if self.free_b.contains(&label_a) {
            label_a
        } else {
            match self.free_b.iter().next() {
                Some(&l) => l,
                None => return Err(Error::OutOfLabels(self.id)),
            }
        };

        self.free_a.remove(&label_a);
        self.free_b.remove(&label_b);
        self.remaining_up -= bandwidth_up;
        self.remaining_down -= bandwidth_down;
        self.allocations.insert(
            label_a,
            Allocation { label_a: Label(label_a), label_b: Label(label_b), bandwidth_up, bandwidth_down, service },
        );
        Ok((Label(label_a), Label(label_b)))
    }

    /// Returns a previously allocated label pair and its bandwidth to the
    /// free pools. Idempotent: releasing an unknown label is a no-op (§4.4).
    pub fn release(&mut self, label_a: Label) {
        if let Some(alloc) = self.allocations.remove(&label_a.0) {
            self.free_a.insert(alloc.label_a.0);
            self.free_b.insert(alloc.label_b.0);
            self.remaining_up += alloc.bandwidth_up;
            self.remaining_down += alloc.bandwidth_down;
        }
    }

    /// Releases every allocation belonging to `service`, returning the sum
    /// of freed bandwidth. Used to roll back a failed composite service.
    pub fn release_service(&mut self, service: ServiceId) {
        let labels: Vec<u32> = self
            .allocations
            .values()
            .filter(|a| a.service == service)
            .map(|a| a.label_a.0)
            .collect();
        for label in labels {
            self.release(Label(label));
        }
    }

    /// Re-establishes one exact allocation as persisted, without applying
    /// the lowest-free-label rule. Used only when reconstructing a trunk
    /// from a [`crate::persistence::TrunkRecord`] after a broker restart,
    /// where the label pair was already decided by the original `allocate`
    /// call and must not be re-chosen.
    pub fn restore_allocation(&mut self, label_a: Label, label_b: Label, bandwidth_up: f64, bandwidth_down: f64, service: ServiceId) -> Result<(), Error> {
        if bandwidth_up > self.remaining_up || bandwidth_down > self.remaining_down {
            return Err(Error::OutOfBandwidth(self.id));
        }
        if !self.free_a.contains(&label_a.0) || !self.free_b.contains(&label_b.0) {
            return Err(Error::OutOfLabels(self.id));
        }
        self.free_a.remove(&label_a.0);
        self.free_b.remove(&label_b.0);
        self.remaining_up -= bandwidth_up;
        self.remaining_down -= bandwidth_down;
        self.allocations.insert(label_a.0, Allocation { label_a, label_b, bandwidth_up, bandwidth_down, service });
        Ok(())
    }

    /// Operator action: updates the routing cost.
    pub fn set_delay(&mut self, delay: f64) {
        self.delay = delay;
    }

    /// Operator action: updates the bandwidth budgets. The new capacity may
    /// not be set below what is currently allocated.
    pub fn set_bandwidth(&mut self, up: f64, down: f64) -> Result<(), Error> {
        let allocated_up = self.capacity_up - self.remaining_up;
        let allocated_down = self.capacity_down - self.remaining_down;
        if up < allocated_up || down < allocated_down {
            return Err(Error::OutOfBandwidth(self.id));
        }
        self.capacity_up = up;
        self.capacity_down = down;
        self.remaining_up = up - allocated_up;
        self.remaining_down = down - allocated_down;
        Ok(())
    }

    /// Operator action: adds labels to the declared range (and to both free
    /// pools, unless already declared).
    pub fn provide_labels(&mut self, labels: impl IntoIterator<Item = u32>) {
        for label in labels {
            if self.declared.insert(label) {
                self.free_a.insert(label);
                self.free_b.insert(label);
            }
        }
    }

    /// Operator action: removes labels from the declared range. Only labels
    /// currently free on *both* sides are actually removed — a label in use
    /// by a live allocation is left untouched rather than forcibly revoked.
    pub fn revoke_labels(&mut self, labels: impl IntoIterator<Item = u32>) {
        for label in labels {
            if self.free_a.contains(&label) && self.free_b.contains(&label) {
                self.declared.remove(&label);
                self.free_a.remove(&label);
                self.free_b.remove(&label);
            }
        }
    }

    /// Operator action: decommissions the trunk. Refused while any
    /// allocation is live (§9 "refuses to remove a trunk with live
    /// allocations").
    pub fn decommission(&mut self) -> Result<(), Error> {
        if !self.is_idle() {
            return Err(Error::TerminalInUse(self.side_a.1));
        }
        self.declared.clear();
        self.free_a.clear();
        self.free_b.clear();
        self.remaining_up = 0.0;
        self.remaining_down = 0.0;
        self.capacity_up = 0.0;
        self.capacity_down = 0.0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trunk() -> Trunk {
        Trunk::new(TrunkId(0), (NetworkId(0), TerminalId(0)), (NetworkId(1), TerminalId(0)), 1.0, 1000.0, 1000.0, 1..=100)
    }

    #[test]
    fn allocate_then_release_restores_pools() {
        let mut t = trunk();
        let (a, b) = t.allocate(200.0, 200.0, ServiceId(1)).unwrap();
        assert_eq!(a, Label(1));
        assert_eq!(b, Label(1));
        assert_eq!(t.remaining_capacity(), 800.0);
        t.release(a);
        assert_eq!(t.remaining_capacity(), 1000.0);
        assert!(t.is_idle());
    }

    #[test]
    fn label_correspondence_falls_back_when_same_number_taken() {
        let mut t = trunk();
        // consume label 1 on side B only, by allocating and releasing on A
        // a scenario that leaves side B's "1" taken: simulate directly.
        t.free_b.remove(&1);
        let (a, b) = t.allocate(1.0, 1.0, ServiceId(0)).unwrap();
        assert_eq!(a, Label(1));
        assert_eq!(b, Label(2));
    }

    #[test]
    fn release_is_idempotent_on_unknown_label() {
        let mut t = trunk();
        t.release(Label(77));
        assert_eq!(t.remaining_capacity(), 1000.0);
    }

    #[test]
    fn out_of_bandwidth_when_exceeding_capacity() {
        let mut t = trunk();
        let err = t.allocate(2000.0, 1.0, ServiceId(0)).unwrap_err();
        assert_eq!(err, Error::OutOfBandwidth(TrunkId(0)));
    }

    #[test]
    fn out_of_labels_when_range_exhausted() {
        let mut t = Trunk::new(TrunkId(1), (NetworkId(0), TerminalId(0)), (NetworkId(1), TerminalId(0)), 1.0, 1000.0, 1000.0, 1..=1);
        t.allocate(1.0, 1.0, ServiceId(0)).unwrap();
        let err = t.allocate(1.0, 1.0, ServiceId(1)).unwrap_err();
        assert_eq!(err, Error::OutOfLabels(TrunkId(1)));
    }

    #[test]
    fn restore_allocation_reclaims_exact_labels() {
        let mut t = trunk();
        t.restore_allocation(Label(5), Label(7), 50.0, 50.0, ServiceId(3)).unwrap();
        assert_eq!(t.remaining_capacity(), 950.0);
        assert_eq!(t.allocation_for(Label(5)).unwrap().service, ServiceId(3));
        assert!(t.allocate(1.0, 1.0, ServiceId(0)).unwrap().0 != Label(5));
    }

    #[test]
    fn restore_allocation_rejects_already_taken_label() {
        let mut t = trunk();
        t.allocate(1.0, 1.0, ServiceId(0)).unwrap();
        let err = t.restore_allocation(Label(1), Label(2), 1.0, 1.0, ServiceId(1)).unwrap_err();
        assert_eq!(err, Error::OutOfLabels(TrunkId(0)));
    }

    #[test]
    fn decommission_refused_while_in_use() {
        let mut t = trunk();
        t.allocate(1.0, 1.0, ServiceId(0)).unwrap();
        assert!(t.decommission().is_err());
    }
}
