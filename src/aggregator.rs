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

//! # Aggregator — planner (§4.5, §4.6)
//!
//! A composite network built from inferior networks plus trunks. On
//! `initiate`, rewrites external endpoints onto their backing inferior
//! terminals, plans a spanning tree over the trunk topology, allocates
//! labels, decomposes the request into one sub-request per inferior
//! network, and folds the sub-services' states into its own.

use std::collections::HashMap;

use log::{debug, warn};
use petgraph::graph::EdgeIndex;
use slab::Slab;

use crate::error::Error;
use crate::event::ServiceEvent;
use crate::graph::{EdgeWeight, Graph};
use crate::ids::{Label, NetworkId, ServiceId, TerminalId, TrunkId};
use crate::registry::Registry;
use crate::request::{ConnectionRequest, EndPoint};
use crate::service::{validate_request, ServiceCore, ServiceState};
use crate::terminal::{Backing, TerminalTable};
use crate::trunk::Trunk;
use crossbeam_channel::Receiver;

/// Retry bound for the allocation race described in §4.5 step 5.
const MAX_REPLAN: usize = 3;

/// Claims a terminal for a trunk endpoint, tolerating a trunk side whose
/// network isn't (yet) registered — config loading may declare trunks
/// before every referenced switch exists; a genuinely conflicting claim
/// (`TERMINAL_IN_USE`) is still reported.
fn claim_if_known(registry: &Registry, network: NetworkId, terminal: TerminalId) -> Result<(), Error> {
    match registry.claim_terminal_for_trunk(network, terminal) {
        Ok(()) | Err(Error::UnknownNetwork(_)) => Ok(()),
        Err(err) => Err(err),
    }
}

/// A single trunk crossing used by a service's plan, recorded so `release`
/// can return exactly what `initiate` reserved.
#[derive(Debug, Clone, Copy)]
struct PlannedCrossing {
    trunk: TrunkId,
    label_a: Label,
}

struct AggregatorService {
    core: ServiceCore,
    sub_services: Vec<(NetworkId, ServiceId)>,
    crossings: Vec<PlannedCrossing>,
}

/// A composite network: external terminals (aliases onto inferior
/// terminals), trunks between inferior terminals, and the services built by
/// planning across them.
pub struct Aggregator {
    name: String,
    externals: TerminalTable,
    trunks: Slab<Trunk>,
    services: Slab<AggregatorService>,
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Aggregator {
    /// Builds a new, empty aggregator.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), externals: TerminalTable::new(), trunks: Slab::new(), services: Slab::new() }
    }

    /// The aggregator's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers an external terminal aliasing `(network, terminal)` of an
    /// inferior network. Fails `OWN_TERMINAL` if `network` is this
    /// aggregator's own id (§9 Open-question: the aggregator cannot alias
    /// one of its own terminals).
    pub fn add_terminal(
        &mut self,
        self_id: NetworkId,
        name: impl Into<String>,
        network: NetworkId,
        terminal: TerminalId,
    ) -> Result<TerminalId, Error> {
        if network == self_id {
            return Err(Error::OwnTerminal(terminal));
        }
        self.externals.add(name, Backing::Inferior(network, terminal))
    }

    /// Looks up an external terminal by name.
    pub fn get_terminal(&self, name: &str) -> Result<TerminalId, Error> {
        self.externals.get_by_name(name)
    }

    /// Lists every external terminal id.
    pub fn list_terminals(&self) -> Vec<TerminalId> {
        self.externals.list()
    }

    /// A terminal's name and the `(network, terminal)` it aliases, for
    /// persistence snapshots (an aggregator's external terminal is always
    /// inferior-backed).
    pub fn terminal_record(&self, id: TerminalId) -> Result<(String, NetworkId, TerminalId), Error> {
        let terminal = self.externals.get(id)?;
        let Backing::Inferior(network, internal) = *terminal.backing() else {
            return Err(Error::UnknownTerminal(id.to_string()));
        };
        Ok((terminal.name().to_string(), network, internal))
    }

    /// Removes an external terminal (fails `TERMINAL_IN_USE` if any live
    /// service still references it).
    pub fn remove_terminal(&mut self, id: TerminalId) -> Result<(), Error> {
        let busy = self.services.iter().any(|(_, s)| {
            !matches!(s.core.state(), ServiceState::Dormant | ServiceState::Released)
                && s.core.request().map(|r| r.endpoints.iter().any(|e| e.terminal == id)).unwrap_or(false)
        });
        if busy {
            return Err(Error::TerminalInUse(id));
        }
        self.externals.remove(id)
    }

    /// Declares a new trunk between two inferior terminals. Fails
    /// `OWN_TERMINAL` if either side names this aggregator's own id.
    #[allow(clippy::too_many_arguments)]
    pub fn add_trunk(
        &mut self,
        registry: &Registry,
        self_id: NetworkId,
        side_a: (NetworkId, TerminalId),
        side_b: (NetworkId, TerminalId),
        delay: f64,
        capacity_up: f64,
        capacity_down: f64,
        labels: impl IntoIterator<Item = u32>,
    ) -> Result<TrunkId, Error> {
        if side_a.0 == self_id {
            return Err(Error::OwnTerminal(side_a.1));
        }
        if side_b.0 == self_id {
            return Err(Error::OwnTerminal(side_b.1));
        }
        claim_if_known(registry, side_a.0, side_a.1)?;
        if let Err(err) = claim_if_known(registry, side_b.0, side_b.1) {
            registry.release_terminal_trunk_claim(side_a.0, side_a.1);
            return Err(err);
        }
        let entry = self.trunks.vacant_entry();
        let id = TrunkId(entry.key());
        entry.insert(Trunk::new(id, side_a, side_b, delay, capacity_up, capacity_down, labels));
        Ok(id)
    }

    /// Looks up a trunk by id.
    pub fn trunk(&self, id: TrunkId) -> Result<&Trunk, Error> {
        self.trunks.get(id.0).ok_or(Error::UnknownTrunk(id))
    }

    /// Looks up a trunk by id, mutably (for the Management API's
    /// `set_delay`/`set_bandwidth`/`provide_labels`/`revoke_labels`).
    pub fn trunk_mut(&mut self, id: TrunkId) -> Result<&mut Trunk, Error> {
        self.trunks.get_mut(id.0).ok_or(Error::UnknownTrunk(id))
    }

    /// Lists every trunk id declared on this aggregator, for persistence
    /// snapshots.
    pub fn list_trunks(&self) -> Vec<TrunkId> {
        let mut ids: Vec<TrunkId> = self.trunks.iter().map(|(k, _)| TrunkId(k)).collect();
        ids.sort();
        ids
    }

    /// Finds the trunk incident on `(network, terminal)`, if any.
    pub fn find_trunk(&self, network: NetworkId, terminal: TerminalId) -> Option<TrunkId> {
        self.trunks.iter().find_map(|(k, t)| {
            let (a, b) = t.sides();
            if a == (network, terminal) || b == (network, terminal) {
                Some(TrunkId(k))
            } else {
                None
            }
        })
    }

    /// Decommissions a trunk (fails `TERMINAL_IN_USE` while any allocation
    /// is live, per §9's open-question resolution).
    pub fn remove_trunk(&mut self, registry: &Registry, id: TrunkId) -> Result<(), Error> {
        let trunk = self.trunks.get_mut(id.0).ok_or(Error::UnknownTrunk(id))?;
        trunk.decommission()?;
        let (side_a, side_b) = trunk.sides();
        self.trunks.remove(id.0);
        registry.release_terminal_trunk_claim(side_a.0, side_a.1);
        registry.release_terminal_trunk_claim(side_b.0, side_b.1);
        Ok(())
    }

    /// Allocates a fresh, `DORMANT` service.
    pub fn new_service(&mut self) -> ServiceId {
        let key = self.services.insert(AggregatorService {
            core: ServiceCore::new(ServiceId(0)),
            sub_services: Vec::new(),
            crossings: Vec::new(),
        });
        let id = ServiceId(key);
        self.services[key].core = ServiceCore::new(id);
        id
    }

    /// Lists every service id known to this aggregator.
    pub fn list_services(&self) -> Vec<ServiceId> {
        let mut ids: Vec<ServiceId> = self.services.iter().map(|(k, _)| ServiceId(k)).collect();
        ids.sort();
        ids
    }

    /// The current state of a service.
    pub fn status(&self, service: ServiceId) -> Result<ServiceState, Error> {
        Ok(self.services.get(service.0).ok_or(Error::UnknownService(service))?.core.state())
    }

    /// Registers a listener on a service.
    pub fn add_listener(&mut self, service: ServiceId) -> Result<Receiver<ServiceEvent>, Error> {
        Ok(self
            .services
            .get_mut(service.0)
            .ok_or(Error::UnknownService(service))?
            .core
            .add_listener())
    }

    /// The request, state, sub-services and trunk crossings of a composite
    /// service, for persistence snapshots.
    pub fn service_snapshot(
        &self,
        service: ServiceId,
    ) -> Result<(ConnectionRequest, ServiceState, Vec<(NetworkId, ServiceId)>, Vec<(TrunkId, Label)>), Error> {
        let entry = self.services.get(service.0).ok_or(Error::UnknownService(service))?;
        let request = entry.core.request().cloned().ok_or(Error::InvalidState)?;
        let crossings = entry.crossings.iter().map(|c| (c.trunk, c.label_a)).collect();
        Ok((request, entry.core.state(), entry.sub_services.clone(), crossings))
    }

    /// Reconstructs a composite service directly from persisted bookkeeping
    /// rather than re-running the planner: used only when rebuilding an
    /// `Aggregator` from a [`crate::persistence::PersistenceStore`] after a
    /// restart, where `sub_services` and `crossings` have already been
    /// translated to this process's ids and the underlying trunk
    /// allocations are restored separately (via [`Trunk::restore_allocation`])
    /// and must not be re-planned. The service lands at `INACTIVE`
    /// regardless of which live sub-state it was persisted in; any further
    /// transition is left for the caller to replay (§4.6).
    pub fn restore_service(
        &mut self,
        request: ConnectionRequest,
        sub_services: Vec<(NetworkId, ServiceId)>,
        crossings: Vec<(TrunkId, Label)>,
    ) -> ServiceId {
        let id = self.new_service();
        let entry = &mut self.services[id.0];
        entry.core.begin_establishing(request);
        entry.sub_services = sub_services;
        entry.crossings = crossings.into_iter().map(|(trunk, label_a)| PlannedCrossing { trunk, label_a }).collect();
        entry.core.transition(ServiceState::Inactive, ServiceEvent::Ready);
        debug!("aggregator {:?}: restored service {id} from persisted plan, -> INACTIVE", self.name);
        id
    }

    /// Resolves each external endpoint to its backing `(network, terminal)`,
    /// failing `UNKNOWN_TERMINAL` if the external terminal is unknown
    /// (§4.5 step 1).
    fn resolve_endpoints(&self, request: &ConnectionRequest) -> Result<Vec<(NetworkId, TerminalId, Label)>, Error> {
        let mut rewritten = Vec::with_capacity(request.endpoints.len());
        for endpoint in &request.endpoints {
            let terminal = self.externals.get(endpoint.terminal)?;
            let Backing::Inferior(network, internal) = *terminal.backing() else {
                return Err(Error::UnknownTerminal(endpoint.terminal.to_string()));
            };
            rewritten.push((network, internal, endpoint.label));
        }
        Ok(rewritten)
    }

    /// Builds the planning graph (§4.5 step 2): one vertex per inferior
    /// network in `terminals`, one edge per trunk connecting two of them
    /// with remaining capacity (in both directions) at least `bandwidth`.
    /// Loop-edges (a trunk whose both sides sit in the same inferior
    /// network) are skipped — resolved locally by that network instead.
    fn planning_graph(&self, bandwidth: f64) -> (Graph<NetworkId>, HashMap<EdgeIndex, TrunkId>) {
        let mut graph = Graph::new();
        let mut edge_trunk = HashMap::new();
        let mut trunk_ids: Vec<TrunkId> = self.trunks.iter().map(|(k, _)| TrunkId(k)).collect();
        trunk_ids.sort();
        for id in trunk_ids {
            let trunk = &self.trunks[id.0];
            let (a, b) = trunk.sides();
            if a.0 == b.0 {
                continue;
            }
            if trunk.remaining_capacity() < bandwidth {
                continue;
            }
            let edge = graph.add_edge(a.0, b.0, EdgeWeight { cost: trunk.delay(), capacity: trunk.remaining_capacity() });
            edge_trunk.insert(edge, id);
        }
        (graph, edge_trunk)
    }

    /// Releases every trunk reservation `service` holds, returning labels
    /// and bandwidth to the free pools (used both by `release()` and by
    /// rollback on failure).
    fn release_crossings(&mut self, service: ServiceId) {
        if let Some(entry) = self.services.get_mut(service.0) {
            let crossings = std::mem::take(&mut entry.crossings);
            for crossing in crossings {
                if let Some(trunk) = self.trunks.get_mut(crossing.trunk.0) {
                    trunk.release(crossing.label_a);
                }
            }
        }
    }

    /// `service.initiate(request)` (§4.5 steps 1-7).
    pub fn initiate(
        &mut self,
        registry: &Registry,
        self_id: NetworkId,
        service: ServiceId,
        request: ConnectionRequest,
    ) -> Result<(), Error> {
        debug!("aggregator {:?}: initiating service {service}", self.name);
        validate_request(&request)?;
        {
            let entry = self.services.get_mut(service.0).ok_or(Error::UnknownService(service))?;
            entry.core.require_state(&[ServiceState::Dormant, ServiceState::Released])?;
        }

        let rewritten = self.resolve_endpoints(&request)?;
        let mut terminals: Vec<NetworkId> = rewritten.iter().map(|(n, _, _)| *n).collect();
        terminals.sort();
        terminals.dedup();

        {
            let entry = self.services.get_mut(service.0).ok_or(Error::UnknownService(service))?;
            entry.core.begin_establishing(request.clone());
        }

        if terminals.len() == 1 {
            let network = terminals[0];
            let sub_request = ConnectionRequest::new(
                rewritten.iter().map(|(_, t, l)| EndPoint { terminal: *t, label: *l }).collect(),
                request.bandwidth,
            );
            return self.run_plan(registry, self_id, service, vec![(network, sub_request)]);
        }

        let mut per_network_endpoints: HashMap<NetworkId, Vec<EndPoint>> = HashMap::new();
        for (network, terminal, label) in &rewritten {
            per_network_endpoints.entry(*network).or_default().push(EndPoint { terminal: *terminal, label: *label });
        }

        let mut attempt = 0;
        loop {
            let (graph, edge_trunk) = self.planning_graph(request.bandwidth);
            let tree = match graph.goal_set_spanning_tree(&terminals, request.bandwidth) {
                Ok(tree) => tree,
                Err(err) => {
                    self.fail_establishing(service, &request, err.to_string());
                    return Err(err);
                }
            };

            let mut crossings: Vec<PlannedCrossing> = Vec::new();
            let mut per_network_crossing_endpoints: HashMap<NetworkId, Vec<EndPoint>> = HashMap::new();
            let mut race_lost = false;
            for edge in &tree {
                let trunk_id = edge_trunk[edge];
                let (side_a, side_b, _) = graph.edge_endpoints(*edge).expect("tree edge exists");
                let trunk = self.trunks.get_mut(trunk_id.0).expect("planning graph only names live trunks");
                match trunk.allocate(request.bandwidth, request.bandwidth, service) {
                    Ok((label_a, label_b)) => {
                        crossings.push(PlannedCrossing { trunk: trunk_id, label_a });
                        let (a_side, b_side) = trunk.sides();
                        let (a_label, b_label) = if a_side.0 == side_a { (label_a, label_b) } else { (label_b, label_a) };
                        per_network_crossing_endpoints
                            .entry(a_side.0)
                            .or_default()
                            .push(EndPoint { terminal: a_side.1, label: a_label });
                        per_network_crossing_endpoints
                            .entry(b_side.0)
                            .or_default()
                            .push(EndPoint { terminal: b_side.1, label: b_label });
                    }
                    Err(_) => {
                        race_lost = true;
                        break;
                    }
                }
            }

            if race_lost {
                for crossing in &crossings {
                    if let Some(trunk) = self.trunks.get_mut(crossing.trunk.0) {
                        trunk.release(crossing.label_a);
                    }
                }
                attempt += 1;
                warn!("aggregator {:?}: service {service} lost the allocation race, replan attempt {attempt}", self.name);
                if attempt > MAX_REPLAN {
                    self.fail_establishing(service, &request, Error::Unroutable.to_string());
                    return Err(Error::Unroutable);
                }
                continue;
            }

            {
                let entry = self.services.get_mut(service.0).ok_or(Error::UnknownService(service))?;
                entry.crossings = crossings;
            }

            // The tree may pass through inferior networks that carry no
            // external terminal of their own (pure Steiner waypoints,
            // relaying between two trunk crossings) — those still need a
            // sub-request or their forwarding state is never configured.
            let mut networks_in_plan: Vec<NetworkId> = terminals.clone();
            networks_in_plan.extend(per_network_crossing_endpoints.keys().copied());
            networks_in_plan.sort();
            networks_in_plan.dedup();

            let mut plan: Vec<(NetworkId, ConnectionRequest)> = Vec::new();
            for network in &networks_in_plan {
                let mut endpoints = per_network_endpoints.remove(network).unwrap_or_default();
                if let Some(extra) = per_network_crossing_endpoints.remove(network) {
                    endpoints.extend(extra);
                }
                plan.push((*network, ConnectionRequest::new(endpoints, request.bandwidth)));
            }
            return self.run_plan(registry, self_id, service, plan);
        }
    }

    /// Submits the per-network sub-requests synthesized by `initiate`
    /// (§4.5 steps 6-7), aggregating their outcome into the composite
    /// service's state. Rolls back every already-succeeded sub-service and
    /// every trunk reservation on first failure (§4.6).
    fn run_plan(
        &mut self,
        registry: &Registry,
        self_id: NetworkId,
        service: ServiceId,
        plan: Vec<(NetworkId, ConnectionRequest)>,
    ) -> Result<(), Error> {
        let mut established: Vec<(NetworkId, ServiceId)> = Vec::new();
        let mut failure: Option<Error> = None;

        for (network, sub_request) in plan {
            let sub_service = match registry.new_service_on(network) {
                Ok(id) => id,
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            };
            match registry.initiate_on(network, sub_service, sub_request) {
                Ok(()) => established.push((network, sub_service)),
                Err(err) => {
                    established.push((network, sub_service));
                    failure = Some(err);
                    break;
                }
            }
        }

        if let Some(err) = failure {
            warn!("aggregator {:?}: service {service} plan failed ({err}), rolling back {} sub-service(s)", self.name, established.len());
            for (network, sub_service) in &established {
                let _ = registry.release_on(*network, *sub_service);
            }
            self.release_crossings(service);
            let request = self
                .services
                .get(service.0)
                .and_then(|e| e.core.request().cloned())
                .unwrap_or_else(|| ConnectionRequest::new(Vec::new(), 0.0));
            self.fail_establishing(service, &request, err.to_string());
            return Err(err);
        }

        let entry = self.services.get_mut(service.0).ok_or(Error::UnknownService(service))?;
        entry.sub_services = established;
        entry.core.transition(ServiceState::Inactive, ServiceEvent::Ready);
        debug!("aggregator {:?}: service {service} plan established, -> INACTIVE", self.name);
        let _ = self_id;
        Ok(())
    }

    fn fail_establishing(&mut self, service: ServiceId, request: &ConnectionRequest, cause: String) {
        if let Some(entry) = self.services.get_mut(service.0) {
            entry.core.transition(ServiceState::Failed, ServiceEvent::Failed { endpoints: request.endpoints.clone(), cause });
        }
    }

    /// `activate()`: forwards to every sub-service (§4.5 step 7).
    pub fn activate(&mut self, registry: &Registry, service: ServiceId) -> Result<(), Error> {
        debug!("aggregator {:?}: activating service {service}", self.name);
        let subs = {
            let entry = self.services.get_mut(service.0).ok_or(Error::UnknownService(service))?;
            entry.core.require_state(&[ServiceState::Inactive])?;
            entry.core.transition(ServiceState::Activating, ServiceEvent::Activating);
            entry.sub_services.clone()
        };
        for (network, sub_service) in &subs {
            registry.activate_on(*network, *sub_service)?;
        }
        let entry = self.services.get_mut(service.0).ok_or(Error::UnknownService(service))?;
        entry.core.transition(ServiceState::Active, ServiceEvent::Activated);
        Ok(())
    }

    /// `deactivate()`: forwards to every sub-service.
    pub fn deactivate(&mut self, registry: &Registry, service: ServiceId) -> Result<(), Error> {
        debug!("aggregator {:?}: deactivating service {service}", self.name);
        let subs = {
            let entry = self.services.get_mut(service.0).ok_or(Error::UnknownService(service))?;
            entry.core.require_state(&[ServiceState::Active])?;
            entry.core.transition(ServiceState::Deactivating, ServiceEvent::Deactivating);
            entry.sub_services.clone()
        };
        for (network, sub_service) in &subs {
            registry.deactivate_on(*network, *sub_service)?;
        }
        let entry = self.services.get_mut(service.0).ok_or(Error::UnknownService(service))?;
        entry.core.transition(ServiceState::Inactive, ServiceEvent::Deactivated);
        Ok(())
    }

    /// `release()`: forwards to every sub-service, then returns trunk
    /// reservations. Idempotent (§4.5 step 8, I5).
    pub fn release(&mut self, registry: &Registry, service: ServiceId) -> Result<(), Error> {
        let subs = {
            let entry = self.services.get_mut(service.0).ok_or(Error::UnknownService(service))?;
            if entry.core.state() == ServiceState::Released {
                return Ok(());
            }
            std::mem::take(&mut entry.sub_services)
        };
        debug!("aggregator {:?}: releasing service {service}", self.name);
        for (network, sub_service) in subs {
            let _ = registry.release_on(network, sub_service);
        }
        self.release_crossings(service);
        let entry = self.services.get_mut(service.0).ok_or(Error::UnknownService(service))?;
        entry.core.transition(ServiceState::Released, ServiceEvent::Released);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_trunk_rejects_own_network_as_endpoint() {
        let registry = Registry::new();
        let mut agg = Aggregator::new("a1");
        let self_id = NetworkId(0);
        let err = agg
            .add_trunk(&registry, self_id, (self_id, TerminalId(0)), (NetworkId(1), TerminalId(0)), 1.0, 100.0, 100.0, 1..=10)
            .unwrap_err();
        assert_eq!(err, Error::OwnTerminal(TerminalId(0)));
    }

    #[test]
    fn add_terminal_rejects_own_network() {
        let mut agg = Aggregator::new("a1");
        let self_id = NetworkId(0);
        let err = agg.add_terminal(self_id, "x", self_id, TerminalId(3)).unwrap_err();
        assert_eq!(err, Error::OwnTerminal(TerminalId(3)));
    }

    #[test]
    fn planning_graph_skips_loop_edges_and_low_capacity() {
        let registry = Registry::new();
        let mut agg = Aggregator::new("a1");
        let self_id = NetworkId(0);
        agg.add_trunk(&registry, self_id, (NetworkId(1), TerminalId(0)), (NetworkId(1), TerminalId(1)), 1.0, 100.0, 100.0, 1..=10)
            .unwrap();
        agg.add_trunk(&registry, self_id, (NetworkId(1), TerminalId(2)), (NetworkId(2), TerminalId(0)), 1.0, 5.0, 5.0, 1..=10)
            .unwrap();
        let (graph, edge_trunk) = agg.planning_graph(100.0);
        assert!(edge_trunk.is_empty());
        assert!(graph.vertices().is_empty() || graph.vertices().len() <= 1);
    }
}
