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

//! # Persistence surface (§6, component 11)
//!
//! A broker restart must reconstruct terminals, trunks, label allocations,
//! external terminal mappings, and live service plans before replaying any
//! user-requested state transition (§4.6). This module specifies the
//! *opaque but required* upsert/reconstruct contract a real store (a
//! relational database, per §1's non-goals on persistence internals) would
//! implement, plus an in-memory reference implementation exercised by the
//! restart-reconciliation tests.
//!
//! The four record shapes are the atomic upsert unit named in the
//! specification; each is `Serialize`/`Deserialize` so a real backend needs
//! no core-side changes to slot in.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::ids::{Label, NetworkId, ServiceId, TerminalId, TrunkId};
use crate::network::NetworkKind;
use crate::request::ConnectionRequest;

/// A network, as persisted: just enough to recreate the empty
/// switch/aggregator shell before its terminals and trunks are replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRecord {
    /// The network's broker-scoped id.
    pub id: NetworkId,
    /// Whether to reconstruct a switch or an aggregator.
    pub kind: NetworkKind,
    /// The network's operator-assigned name.
    pub name: String,
}

/// A switch terminal, as persisted. `backing` is the fabric interface
/// description passed back to `Fabric::interfaces_of` on reconstruction — an
/// aggregator's external terminal is persisted separately, as an
/// [`ExternalMappingRecord`], since its backing is a same-broker
/// `(network, terminal)` pair rather than a fabric-opaque string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalRecord {
    /// The owning network.
    pub network: NetworkId,
    /// The terminal's id within that network.
    pub terminal: TerminalId,
    /// The terminal's name.
    pub name: String,
    /// Opaque backing description.
    pub backing: String,
}

/// A trunk, as persisted: capacity, delay, declared label range, and every
/// current allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrunkRecord {
    /// The owning aggregator.
    pub aggregator: NetworkId,
    /// The trunk's id within that aggregator.
    pub trunk: TrunkId,
    /// Side A: `(network, terminal)`.
    pub side_a: (NetworkId, TerminalId),
    /// Side B: `(network, terminal)`.
    pub side_b: (NetworkId, TerminalId),
    /// Additive routing cost.
    pub delay: f64,
    /// Upstream bandwidth budget.
    pub capacity_up: f64,
    /// Downstream bandwidth budget.
    pub capacity_down: f64,
    /// The full declared label range.
    pub declared_labels: Vec<u32>,
    /// Every current allocation: `(label_a, label_b, bandwidth_up, bandwidth_down, service)`.
    pub allocations: Vec<(Label, Label, f64, f64, ServiceId)>,
}

/// An aggregator's external terminal -> inferior terminal mapping, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalMappingRecord {
    /// The aggregator.
    pub aggregator: NetworkId,
    /// The external terminal.
    pub external: TerminalId,
    /// The external terminal's name.
    pub name: String,
    /// The inferior network it aliases.
    pub inferior_network: NetworkId,
    /// The inferior terminal it aliases.
    pub inferior_terminal: TerminalId,
}

/// A live service's plan, as persisted: the original request, the computed
/// sub-request plan, and the last known lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePlanRecord {
    /// The owning network.
    pub network: NetworkId,
    /// The service's id within that network.
    pub service: ServiceId,
    /// The original tenant request.
    pub request: ConnectionRequest,
    /// One `(inferior network, sub-service id)` pair per planned sub-service.
    pub sub_services: Vec<(NetworkId, ServiceId)>,
    /// The trunk crossings this service's plan reserved: `(trunk, label_a)`.
    pub crossings: Vec<(TrunkId, Label)>,
    /// The last lifecycle state observed before persisting.
    pub last_state: String,
}

/// The upsert/reconstruct contract a durable store implements. Idempotent
/// upserts; atomic per-service commit (§6).
pub trait PersistenceStore: Send + Sync {
    /// Upserts a network record.
    fn upsert_network(&self, record: NetworkRecord);
    /// Upserts a terminal record.
    fn upsert_terminal(&self, record: TerminalRecord);
    /// Upserts a trunk record (replacing any prior record for the same trunk).
    fn upsert_trunk(&self, record: TrunkRecord);
    /// Upserts an external terminal mapping.
    fn upsert_external_mapping(&self, record: ExternalMappingRecord);
    /// Upserts a service plan record, atomically, as a unit (§6 "atomic
    /// per-service commit").
    fn upsert_service_plan(&self, record: ServicePlanRecord);
    /// Removes a service plan record (the service reached RELEASED).
    fn remove_service_plan(&self, network: NetworkId, service: ServiceId);
    /// All persisted network records.
    fn all_networks(&self) -> Vec<NetworkRecord>;
    /// All persisted terminal records.
    fn all_terminals(&self) -> Vec<TerminalRecord>;
    /// All persisted trunk records.
    fn all_trunks(&self) -> Vec<TrunkRecord>;
    /// All persisted external mapping records.
    fn all_external_mappings(&self) -> Vec<ExternalMappingRecord>;
    /// All persisted, still-live service plan records.
    fn all_service_plans(&self) -> Vec<ServicePlanRecord>;
}

/// A reference, in-memory [`PersistenceStore`] used by tests and by the
/// loopback/dev agent configuration. Not durable across process restarts on
/// its own — a real deployment slots in a store backed by a relational
/// database instead, per §1's "persistence of state to a relational store"
/// non-goal on the *backend*, not the *contract*.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    networks: Mutex<HashMap<NetworkId, NetworkRecord>>,
    terminals: Mutex<HashMap<(NetworkId, TerminalId), TerminalRecord>>,
    trunks: Mutex<HashMap<(NetworkId, TrunkId), TrunkRecord>>,
    external_mappings: Mutex<HashMap<(NetworkId, TerminalId), ExternalMappingRecord>>,
    service_plans: Mutex<HashMap<(NetworkId, ServiceId), ServicePlanRecord>>,
}

impl InMemoryStore {
    /// Builds an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceStore for InMemoryStore {
    fn upsert_network(&self, record: NetworkRecord) {
        self.networks.lock().expect("store lock poisoned").insert(record.id, record);
    }

    fn upsert_terminal(&self, record: TerminalRecord) {
        self.terminals.lock().expect("store lock poisoned").insert((record.network, record.terminal), record);
    }

    fn upsert_trunk(&self, record: TrunkRecord) {
        self.trunks.lock().expect("store lock poisoned").insert((record.aggregator, record.trunk), record);
    }

    fn upsert_external_mapping(&self, record: ExternalMappingRecord) {
        self.external_mappings.lock().expect("store lock poisoned").insert((record.aggregator, record.external), record);
    }

    fn upsert_service_plan(&self, record: ServicePlanRecord) {
        self.service_plans.lock().expect("store lock poisoned").insert((record.network, record.service), record);
    }

    fn remove_service_plan(&self, network: NetworkId, service: ServiceId) {
        self.service_plans.lock().expect("store lock poisoned").remove(&(network, service));
    }

    fn all_networks(&self) -> Vec<NetworkRecord> {
        self.networks.lock().expect("store lock poisoned").values().cloned().collect()
    }

    fn all_terminals(&self) -> Vec<TerminalRecord> {
        self.terminals.lock().expect("store lock poisoned").values().cloned().collect()
    }

    fn all_trunks(&self) -> Vec<TrunkRecord> {
        self.trunks.lock().expect("store lock poisoned").values().cloned().collect()
    }

    fn all_external_mappings(&self) -> Vec<ExternalMappingRecord> {
        self.external_mappings.lock().expect("store lock poisoned").values().cloned().collect()
    }

    fn all_service_plans(&self) -> Vec<ServicePlanRecord> {
        self.service_plans.lock().expect("store lock poisoned").values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TerminalId as Tid;

    #[test]
    fn upsert_is_idempotent() {
        let store = InMemoryStore::new();
        let record = TerminalRecord { network: NetworkId(0), terminal: Tid(0), name: "a".into(), backing: "eth0".into() };
        store.upsert_terminal(record.clone());
        store.upsert_terminal(record.clone());
        assert_eq!(store.all_terminals(), vec![record]);
    }

    #[test]
    fn removing_a_service_plan_drops_it() {
        let store = InMemoryStore::new();
        let record = ServicePlanRecord {
            network: NetworkId(0),
            service: ServiceId(0),
            request: ConnectionRequest::new(Vec::new(), 0.0),
            sub_services: Vec::new(),
            crossings: Vec::new(),
            last_state: "RELEASING".into(),
        };
        store.upsert_service_plan(record);
        store.remove_service_plan(NetworkId(0), ServiceId(0));
        assert!(store.all_service_plans().is_empty());
    }
}
