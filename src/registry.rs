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

//! # Registry
//!
//! The broker owns every `Network` (Switch or Aggregator) in one arena,
//! keyed by [`NetworkId`]. An Aggregator references its inferior networks
//! weakly — by id, resolved back through the registry at call time — so the
//! composition tree never needs `Rc`/`Arc` cycles (Design Note "Cyclic
//! ownership"). Each entity is independently locked; lock order is always
//! top-down along the composition tree, which falls out naturally here
//! since a composite's `initiate` holds its own lock for the whole of
//! `run_plan`, only acquiring an inferior's lock from inside that call.

use std::sync::{mpsc, Arc, Mutex, RwLock};

use log::{debug, warn};
use slab::Slab;

use crate::aggregator::Aggregator;
use crate::error::Error;
use crate::event::ServiceEvent;
use crate::fabric::{BridgeEvent, Fabric};
use crate::ids::{NetworkId, ServiceId, TerminalId, TrunkId};
use crate::network::{NetworkKind, NetworkSummary};
use crate::persistence::{ExternalMappingRecord, NetworkRecord, PersistenceStore, ServicePlanRecord, TerminalRecord, TrunkRecord};
use crate::request::{ConnectionRequest, EndPoint};
use crate::service::ServiceState;
use crate::switch::Switch;
use crossbeam_channel::Receiver;

/// A network entity plus the lock that guards it (§5: one mutex per
/// Aggregator/Switch).
enum NetworkEntity {
    Switch(Mutex<Switch>),
    Aggregator(Mutex<Aggregator>),
}

/// The broker's top-level arena of networks.
#[derive(Default)]
pub struct Registry {
    entities: RwLock<Slab<NetworkEntity>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.entities.read().map(|e| e.len()).unwrap_or(0);
        f.debug_struct("Registry").field("networks", &count).finish()
    }
}

impl Registry {
    /// Builds an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self { entities: RwLock::new(Slab::new()) })
    }

    /// Registers a new switch backed by `fabric`.
    pub fn add_switch(&self, name: impl Into<String>, fabric: Arc<dyn Fabric>) -> NetworkId {
        let mut entities = self.entities.write().expect("registry lock poisoned");
        let key = entities.insert(NetworkEntity::Switch(Mutex::new(Switch::new(name, fabric))));
        NetworkId(key)
    }

    /// Registers a new, empty aggregator.
    pub fn add_aggregator(&self, name: impl Into<String>) -> NetworkId {
        let mut entities = self.entities.write().expect("registry lock poisoned");
        let key = entities.insert(NetworkEntity::Aggregator(Mutex::new(Aggregator::new(name))));
        NetworkId(key)
    }

    /// Runs `f` with the switch at `id` locked. Fails `UNKNOWN_NETWORK` if
    /// `id` doesn't name a switch.
    pub fn with_switch<R>(&self, id: NetworkId, f: impl FnOnce(&mut Switch) -> R) -> Result<R, Error> {
        let entities = self.entities.read().expect("registry lock poisoned");
        match entities.get(id.0) {
            Some(NetworkEntity::Switch(m)) => Ok(f(&mut m.lock().expect("switch lock poisoned"))),
            _ => Err(Error::UnknownNetwork(id)),
        }
    }

    /// Runs `f` with the aggregator at `id` locked. Fails `UNKNOWN_NETWORK`
    /// if `id` doesn't name an aggregator.
    pub fn with_aggregator<R>(&self, id: NetworkId, f: impl FnOnce(&mut Aggregator) -> R) -> Result<R, Error> {
        let entities = self.entities.read().expect("registry lock poisoned");
        match entities.get(id.0) {
            Some(NetworkEntity::Aggregator(m)) => Ok(f(&mut m.lock().expect("aggregator lock poisoned"))),
            _ => Err(Error::UnknownNetwork(id)),
        }
    }

    /// Allocates a fresh, `DORMANT` service on `network`.
    pub fn new_service_on(&self, network: NetworkId) -> Result<ServiceId, Error> {
        let entities = self.entities.read().expect("registry lock poisoned");
        match entities.get(network.0) {
            Some(NetworkEntity::Switch(m)) => Ok(m.lock().expect("switch lock poisoned").new_service()),
            Some(NetworkEntity::Aggregator(m)) => Ok(m.lock().expect("aggregator lock poisoned").new_service()),
            None => Err(Error::UnknownNetwork(network)),
        }
    }

    /// Initiates `service` on `network` with `request`, blocking until the
    /// network reaches a stable state (§5 "initiation... block[s] the
    /// caller until all sub-services reach a stable state").
    pub fn initiate_on(&self, network: NetworkId, service: ServiceId, request: ConnectionRequest) -> Result<(), Error> {
        debug!("registry: initiating service {service} on network {network:?}");
        let is_switch = {
            let entities = self.entities.read().expect("registry lock poisoned");
            match entities.get(network.0) {
                Some(NetworkEntity::Switch(_)) => true,
                Some(NetworkEntity::Aggregator(_)) => false,
                None => return Err(Error::UnknownNetwork(network)),
            }
        };
        if is_switch {
            self.initiate_switch(network, service, request)
        } else {
            let entities = self.entities.read().expect("registry lock poisoned");
            match entities.get(network.0) {
                Some(NetworkEntity::Aggregator(m)) => {
                    let mut aggregator = m.lock().expect("aggregator lock poisoned");
                    drop(entities);
                    aggregator.initiate(self, network, service, request)
                }
                _ => Err(Error::UnknownNetwork(network)),
            }
        }
    }

    /// The switch-specific half of `initiate_on`: stage the bridge request
    /// with the switch's lock held, release it, call the fabric, then
    /// re-acquire the lock to record the outcome (§5).
    fn initiate_switch(&self, network: NetworkId, service: ServiceId, request: ConnectionRequest) -> Result<(), Error> {
        let (circuits, fabric) = self.with_switch(network, |sw| -> Result<_, Error> {
            let circuits = sw.prepare_bridge(service, request)?;
            Ok((circuits, sw.fabric_handle()))
        })??;

        debug!("registry: dispatching bridge request for service {service} on network {network:?}");
        let (tx, rx) = mpsc::channel();
        let bridge = match fabric.bridge(
            circuits,
            Box::new(move |event| {
                let _ = tx.send(event);
            }),
        ) {
            Ok(bridge) => bridge,
            Err(err) => {
                warn!("registry: fabric dispatch failed for service {service} on network {network:?}: {err}");
                self.with_switch(network, |sw| sw.handle_bridge_event(service, BridgeEvent::Error(err.to_string())))??;
                return Err(err);
            }
        };

        self.with_switch(network, |sw| sw.record_bridge(service, bridge))??;

        let event = rx
            .recv()
            .unwrap_or_else(|_| BridgeEvent::Error("fabric listener disconnected before reporting".to_string()));
        self.with_switch(network, |sw| sw.handle_bridge_event(service, event.clone()))??;

        match event {
            BridgeEvent::Created => Ok(()),
            BridgeEvent::Error(cause) => Err(Error::FabricError(cause)),
            BridgeEvent::Destroyed => Err(Error::FabricError("bridge destroyed before becoming ready".to_string())),
        }
    }

    /// Forwards `activate()` to `network`/`service`.
    pub fn activate_on(&self, network: NetworkId, service: ServiceId) -> Result<(), Error> {
        let entities = self.entities.read().expect("registry lock poisoned");
        match entities.get(network.0) {
            Some(NetworkEntity::Switch(m)) => m.lock().expect("switch lock poisoned").activate(service),
            Some(NetworkEntity::Aggregator(m)) => {
                let mut aggregator = m.lock().expect("aggregator lock poisoned");
                drop(entities);
                aggregator.activate(self, service)
            }
            None => Err(Error::UnknownNetwork(network)),
        }
    }

    /// Forwards `deactivate()` to `network`/`service`.
    pub fn deactivate_on(&self, network: NetworkId, service: ServiceId) -> Result<(), Error> {
        let entities = self.entities.read().expect("registry lock poisoned");
        match entities.get(network.0) {
            Some(NetworkEntity::Switch(m)) => m.lock().expect("switch lock poisoned").deactivate(service),
            Some(NetworkEntity::Aggregator(m)) => {
                let mut aggregator = m.lock().expect("aggregator lock poisoned");
                drop(entities);
                aggregator.deactivate(self, service)
            }
            None => Err(Error::UnknownNetwork(network)),
        }
    }

    /// Forwards `release()` to `network`/`service`.
    pub fn release_on(&self, network: NetworkId, service: ServiceId) -> Result<(), Error> {
        let entities = self.entities.read().expect("registry lock poisoned");
        match entities.get(network.0) {
            Some(NetworkEntity::Switch(m)) => m.lock().expect("switch lock poisoned").release(service),
            Some(NetworkEntity::Aggregator(m)) => {
                let mut aggregator = m.lock().expect("aggregator lock poisoned");
                drop(entities);
                aggregator.release(self, service)
            }
            None => Err(Error::UnknownNetwork(network)),
        }
    }

    /// Reports the current state of `service` on `network`.
    pub fn status_on(&self, network: NetworkId, service: ServiceId) -> Result<ServiceState, Error> {
        let entities = self.entities.read().expect("registry lock poisoned");
        match entities.get(network.0) {
            Some(NetworkEntity::Switch(m)) => m.lock().expect("switch lock poisoned").status(service),
            Some(NetworkEntity::Aggregator(m)) => m.lock().expect("aggregator lock poisoned").status(service),
            None => Err(Error::UnknownNetwork(network)),
        }
    }

    /// Registers a listener on `service` on `network`.
    pub fn add_listener_on(&self, network: NetworkId, service: ServiceId) -> Result<Receiver<ServiceEvent>, Error> {
        let entities = self.entities.read().expect("registry lock poisoned");
        match entities.get(network.0) {
            Some(NetworkEntity::Switch(m)) => m.lock().expect("switch lock poisoned").add_listener(service),
            Some(NetworkEntity::Aggregator(m)) => m.lock().expect("aggregator lock poisoned").add_listener(service),
            None => Err(Error::UnknownNetwork(network)),
        }
    }

    /// Claims a terminal of `network` for a trunk endpoint. Only a
    /// `Switch`'s internal terminals can be trunk endpoints; an aggregator
    /// given here is an operator configuration error.
    pub fn claim_terminal_for_trunk(&self, network: NetworkId, terminal: TerminalId) -> Result<(), Error> {
        self.with_switch(network, |sw| sw.claim_terminal_for_trunk(terminal))?
    }

    /// Releases a previously claimed terminal. Best-effort: a network that
    /// has since vanished has nothing left to release.
    pub fn release_terminal_trunk_claim(&self, network: NetworkId, terminal: TerminalId) {
        let _ = self.with_switch(network, |sw| sw.release_terminal_trunk_claim(terminal));
    }

    /// Looks up a network's name and [`NetworkKind`] by id, without locking
    /// the entity's own mutex.
    pub fn summary_of(&self, id: NetworkId) -> Result<NetworkSummary, Error> {
        let entities = self.entities.read().expect("registry lock poisoned");
        match entities.get(id.0) {
            Some(NetworkEntity::Switch(m)) => Ok(NetworkSummary {
                id,
                kind: NetworkKind::Switch,
                name: m.lock().expect("switch lock poisoned").name().to_string(),
            }),
            Some(NetworkEntity::Aggregator(m)) => Ok(NetworkSummary {
                id,
                kind: NetworkKind::Aggregator,
                name: m.lock().expect("aggregator lock poisoned").name().to_string(),
            }),
            None => Err(Error::UnknownNetwork(id)),
        }
    }

    /// Every network the broker currently knows about, in id order.
    pub fn list_networks(&self) -> Vec<NetworkSummary> {
        let entities = self.entities.read().expect("registry lock poisoned");
        let mut out: Vec<NetworkSummary> = entities
            .iter()
            .map(|(k, entity)| {
                let id = NetworkId(k);
                match entity {
                    NetworkEntity::Switch(m) => {
                        NetworkSummary { id, kind: NetworkKind::Switch, name: m.lock().expect("switch lock poisoned").name().to_string() }
                    }
                    NetworkEntity::Aggregator(m) => NetworkSummary {
                        id,
                        kind: NetworkKind::Aggregator,
                        name: m.lock().expect("aggregator lock poisoned").name().to_string(),
                    },
                }
            })
            .collect();
        out.sort_by_key(|s| s.id);
        out
    }

    /// Lists the terminals of `network`, whichever kind it is.
    pub fn list_terminals_on(&self, network: NetworkId) -> Result<Vec<TerminalId>, Error> {
        let entities = self.entities.read().expect("registry lock poisoned");
        match entities.get(network.0) {
            Some(NetworkEntity::Switch(m)) => Ok(m.lock().expect("switch lock poisoned").list_terminals()),
            Some(NetworkEntity::Aggregator(m)) => Ok(m.lock().expect("aggregator lock poisoned").list_terminals()),
            None => Err(Error::UnknownNetwork(network)),
        }
    }

    /// Looks up a terminal by name on `network`, whichever kind it is.
    pub fn get_terminal_on(&self, network: NetworkId, name: &str) -> Result<TerminalId, Error> {
        let entities = self.entities.read().expect("registry lock poisoned");
        match entities.get(network.0) {
            Some(NetworkEntity::Switch(m)) => m.lock().expect("switch lock poisoned").get_terminal(name),
            Some(NetworkEntity::Aggregator(m)) => m.lock().expect("aggregator lock poisoned").get_terminal(name),
            None => Err(Error::UnknownNetwork(network)),
        }
    }

    /// Runs `f` with the aggregator at `id` locked and a reference to `self`,
    /// *without* holding the registry's own read lock for the duration of
    /// `f` — needed wherever `f` itself calls back into the registry (e.g.
    /// `Aggregator::add_trunk`'s terminal claim), mirroring the
    /// lock-then-drop-then-recurse pattern [`Self::initiate_on`] uses.
    fn with_aggregator_and_registry<R>(&self, id: NetworkId, f: impl FnOnce(&Registry, &mut Aggregator) -> R) -> Result<R, Error> {
        let entities = self.entities.read().expect("registry lock poisoned");
        match entities.get(id.0) {
            Some(NetworkEntity::Aggregator(m)) => {
                let mut aggregator = m.lock().expect("aggregator lock poisoned");
                drop(entities);
                Ok(f(self, &mut aggregator))
            }
            _ => Err(Error::UnknownNetwork(id)),
        }
    }

    /// Declares a trunk on the aggregator `network`, between two inferior
    /// terminals (§6 `add_trunk`). Handles the lock-then-drop-then-recurse
    /// pattern `Aggregator::add_trunk` requires, since it claims its
    /// endpoints on whichever switches own them via the registry itself.
    #[allow(clippy::too_many_arguments)]
    pub fn add_trunk_on(
        &self,
        network: NetworkId,
        side_a: (NetworkId, TerminalId),
        side_b: (NetworkId, TerminalId),
        delay: f64,
        capacity_up: f64,
        capacity_down: f64,
        labels: impl IntoIterator<Item = u32>,
    ) -> Result<crate::ids::TrunkId, Error> {
        self.with_aggregator_and_registry(network, |registry, agg| {
            agg.add_trunk(registry, network, side_a, side_b, delay, capacity_up, capacity_down, labels)
        })?
    }

    /// Decommissions a trunk on the aggregator `network` (§6 `remove_trunk`).
    pub fn remove_trunk_on(&self, network: NetworkId, trunk: crate::ids::TrunkId) -> Result<(), Error> {
        self.with_aggregator_and_registry(network, |registry, agg| agg.remove_trunk(registry, trunk))?
    }

    /// Finds the trunk on `network` incident on `(inferior_network,
    /// inferior_terminal)`, if any (§6 `find_trunk`).
    pub fn find_trunk_on(&self, network: NetworkId, inferior_network: NetworkId, inferior_terminal: TerminalId) -> Result<Option<crate::ids::TrunkId>, Error> {
        self.with_aggregator(network, |agg| agg.find_trunk(inferior_network, inferior_terminal))
    }

    /// Runs `f` with a read-only view of one of `network`'s trunks; used by
    /// tests and operator tooling to inspect remaining capacity/labels
    /// without duplicating `Trunk`'s accessors on `Registry`.
    pub fn with_trunk<R>(&self, network: NetworkId, trunk: crate::ids::TrunkId, f: impl FnOnce(&crate::trunk::Trunk) -> R) -> Result<R, Error> {
        self.with_aggregator(network, |agg| agg.trunk(trunk).map(f))?
    }

    /// Reconciles every switch's live bridges against its services after a
    /// broker restart (§4.6): calls `fabric.retain(live_bridges)` per
    /// switch so abandoned bridges are garbage-collected.
    pub fn reconcile_after_restart(&self) {
        let entities = self.entities.read().expect("registry lock poisoned");
        for (_, entity) in entities.iter() {
            if let NetworkEntity::Switch(m) = entity {
                m.lock().expect("switch lock poisoned").reconcile_bridges();
            }
        }
    }

    /// Walks every network, upserting its terminals/trunks/external mappings
    /// and every still-live service's plan into `store`, and dropping the
    /// plan record for anything that has reached `DORMANT`/`RELEASED` (§6).
    pub fn snapshot_to(&self, store: &dyn PersistenceStore) {
        let entities = self.entities.read().expect("registry lock poisoned");
        for (key, entity) in entities.iter() {
            let id = NetworkId(key);
            match entity {
                NetworkEntity::Switch(m) => {
                    let sw = m.lock().expect("switch lock poisoned");
                    store.upsert_network(NetworkRecord { id, kind: NetworkKind::Switch, name: sw.name().to_string() });
                    for terminal in sw.list_terminals() {
                        if let Ok((name, backing)) = sw.terminal_record(terminal) {
                            store.upsert_terminal(TerminalRecord { network: id, terminal, name, backing });
                        }
                    }
                    for service in sw.list_services() {
                        match sw.status(service) {
                            Ok(ServiceState::Dormant) | Ok(ServiceState::Released) | Err(_) => {
                                store.remove_service_plan(id, service);
                            }
                            Ok(state) => {
                                if let Ok((request, _)) = sw.service_snapshot(service) {
                                    store.upsert_service_plan(ServicePlanRecord {
                                        network: id,
                                        service,
                                        request,
                                        sub_services: Vec::new(),
                                        crossings: Vec::new(),
                                        last_state: format!("{state:?}"),
                                    });
                                }
                            }
                        }
                    }
                }
                NetworkEntity::Aggregator(m) => {
                    let agg = m.lock().expect("aggregator lock poisoned");
                    store.upsert_network(NetworkRecord { id, kind: NetworkKind::Aggregator, name: agg.name().to_string() });
                    for terminal in agg.list_terminals() {
                        if let Ok((name, inferior_network, inferior_terminal)) = agg.terminal_record(terminal) {
                            store.upsert_external_mapping(ExternalMappingRecord {
                                aggregator: id,
                                external: terminal,
                                name,
                                inferior_network,
                                inferior_terminal,
                            });
                        }
                    }
                    for trunk in agg.list_trunks() {
                        if let Ok(t) = agg.trunk(trunk) {
                            let (side_a, side_b) = t.sides();
                            store.upsert_trunk(TrunkRecord {
                                aggregator: id,
                                trunk,
                                side_a,
                                side_b,
                                delay: t.delay(),
                                capacity_up: t.capacity_up(),
                                capacity_down: t.capacity_down(),
                                declared_labels: t.declared_labels(),
                                allocations: t.allocations().map(|a| (a.label_a, a.label_b, a.bandwidth_up, a.bandwidth_down, a.service)).collect(),
                            });
                        }
                    }
                    for service in agg.list_services() {
                        match agg.status(service) {
                            Ok(ServiceState::Dormant) | Ok(ServiceState::Released) | Err(_) => {
                                store.remove_service_plan(id, service);
                            }
                            Ok(state) => {
                                if let Ok((request, _, sub_services, crossings)) = agg.service_snapshot(service) {
                                    store.upsert_service_plan(ServicePlanRecord {
                                        network: id,
                                        service,
                                        request,
                                        sub_services,
                                        crossings,
                                        last_state: format!("{state:?}"),
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Rewrites a persisted request's endpoints from their original
/// broker-scoped terminal ids to the ids assigned during reconstruction.
fn translate_request(
    request: &ConnectionRequest,
    network: NetworkId,
    term_map: &std::collections::HashMap<(NetworkId, TerminalId), TerminalId>,
) -> Result<ConnectionRequest, Error> {
    let mut endpoints = Vec::with_capacity(request.endpoints.len());
    for endpoint in &request.endpoints {
        let new_terminal = *term_map
            .get(&(network, endpoint.terminal))
            .ok_or_else(|| Error::UnknownTerminal(endpoint.terminal.to_string()))?;
        endpoints.push(EndPoint { terminal: new_terminal, label: endpoint.label });
    }
    Ok(ConnectionRequest::new(endpoints, request.bandwidth))
}

/// Reconstructs a [`Registry`] from everything `store` has persisted (§4.6,
/// §6): networks, then terminals, then trunk shells, then services (switch
/// services replayed through the fabric via [`Registry::initiate_on`],
/// composite services rebuilt directly via [`Aggregator::restore_service`]
/// once every sub-service they reference has itself been restored), then
/// trunk label allocations, finishing with [`Registry::reconcile_after_restart`].
///
/// Ids are never assumed to survive the round trip — every entity kind gets
/// its own old-id -> new-id map, since the [`slab::Slab`] arenas backing
/// each network do not guarantee key reuse once anything has been removed.
pub fn restore_from(store: &dyn PersistenceStore, fabric_for: impl Fn(&str) -> Arc<dyn Fabric>) -> Result<Arc<Registry>, Error> {
    use std::collections::HashMap;

    let registry = Registry::new();
    let mut net_map: HashMap<NetworkId, NetworkId> = HashMap::new();

    let mut networks = store.all_networks();
    networks.sort_by_key(|n| n.id);
    for record in &networks {
        let new_id = match record.kind {
            NetworkKind::Switch => registry.add_switch(record.name.clone(), fabric_for(&record.name)),
            NetworkKind::Aggregator => registry.add_aggregator(record.name.clone()),
        };
        debug!("registry: restored network {:?} ({}) as {new_id}", record.name, record.kind);
        net_map.insert(record.id, new_id);
    }
    let resolve_net = |old: NetworkId| -> Result<NetworkId, Error> { net_map.get(&old).copied().ok_or(Error::UnknownNetwork(old)) };

    let mut term_map: HashMap<(NetworkId, TerminalId), TerminalId> = HashMap::new();

    let mut terminals = store.all_terminals();
    terminals.sort_by_key(|t| (t.network, t.terminal));
    for record in &terminals {
        let new_net = resolve_net(record.network)?;
        let new_term = registry.with_switch(new_net, |sw| sw.add_terminal(record.name.clone(), &record.backing))??;
        term_map.insert((record.network, record.terminal), new_term);
    }

    let mut mappings = store.all_external_mappings();
    mappings.sort_by_key(|m| (m.aggregator, m.external));
    for record in &mappings {
        let new_agg = resolve_net(record.aggregator)?;
        let new_inferior_net = resolve_net(record.inferior_network)?;
        let new_inferior_term = *term_map
            .get(&(record.inferior_network, record.inferior_terminal))
            .ok_or_else(|| Error::UnknownTerminal(record.inferior_terminal.to_string()))?;
        let new_term = registry
            .with_aggregator(new_agg, |agg| agg.add_terminal(new_agg, record.name.clone(), new_inferior_net, new_inferior_term))??;
        term_map.insert((record.aggregator, record.external), new_term);
    }

    let mut trunk_map: HashMap<(NetworkId, TrunkId), TrunkId> = HashMap::new();
    let mut trunks = store.all_trunks();
    trunks.sort_by_key(|t| (t.aggregator, t.trunk));
    for record in &trunks {
        let new_agg = resolve_net(record.aggregator)?;
        let new_side_a = (
            resolve_net(record.side_a.0)?,
            *term_map.get(&record.side_a).ok_or_else(|| Error::UnknownTerminal(record.side_a.1.to_string()))?,
        );
        let new_side_b = (
            resolve_net(record.side_b.0)?,
            *term_map.get(&record.side_b).ok_or_else(|| Error::UnknownTerminal(record.side_b.1.to_string()))?,
        );
        let new_trunk = registry.with_aggregator_and_registry(new_agg, |registry, agg| {
            agg.add_trunk(registry, new_agg, new_side_a, new_side_b, record.delay, record.capacity_up, record.capacity_down, record.declared_labels.clone())
        })??;
        trunk_map.insert((record.aggregator, record.trunk), new_trunk);
    }

    let mut service_map: HashMap<(NetworkId, ServiceId), ServiceId> = HashMap::new();
    let mut plans = store.all_service_plans();
    plans.sort_by_key(|p| (p.network, p.service));
    let mut pending = plans;
    loop {
        let mut next_round = Vec::new();
        let mut progress = false;
        for plan in pending {
            let new_net = resolve_net(plan.network)?;
            let is_switch = registry.summary_of(new_net)?.kind == NetworkKind::Switch;
            if is_switch {
                let translated = translate_request(&plan.request, plan.network, &term_map)?;
                let new_service = registry.new_service_on(new_net)?;
                if let Err(err) = registry.initiate_on(new_net, new_service, translated) {
                    warn!("registry: restored switch service {:?}/{:?} failed to re-establish: {err}", plan.network, plan.service);
                }
                service_map.insert((plan.network, plan.service), new_service);
                progress = true;
                continue;
            }

            let mut ready = true;
            let mut sub_services_new = Vec::with_capacity(plan.sub_services.len());
            for (sub_net, sub_service) in &plan.sub_services {
                match service_map.get(&(*sub_net, *sub_service)) {
                    Some(&new_id) => sub_services_new.push((resolve_net(*sub_net)?, new_id)),
                    None => {
                        ready = false;
                        break;
                    }
                }
            }
            if !ready {
                next_round.push(plan);
                continue;
            }

            let translated = translate_request(&plan.request, plan.network, &term_map)?;
            let mut crossings_new = Vec::with_capacity(plan.crossings.len());
            for (old_trunk, label) in &plan.crossings {
                let new_trunk = *trunk_map.get(&(plan.network, *old_trunk)).ok_or(Error::UnknownTrunk(*old_trunk))?;
                crossings_new.push((new_trunk, *label));
            }
            let new_service = registry.with_aggregator(new_net, |agg| agg.restore_service(translated, sub_services_new, crossings_new))?;
            service_map.insert((plan.network, plan.service), new_service);
            progress = true;
        }
        if next_round.is_empty() {
            break;
        }
        if !progress {
            warn!("registry: {} composite service plan(s) could not be restored (unresolved sub-service dependency)", next_round.len());
            break;
        }
        pending = next_round;
    }

    for record in &trunks {
        let new_agg = resolve_net(record.aggregator)?;
        let new_trunk = trunk_map[&(record.aggregator, record.trunk)];
        for (label_a, label_b, up, down, old_service) in &record.allocations {
            let Some(&new_service) = service_map.get(&(record.aggregator, *old_service)) else {
                warn!("registry: trunk {:?} allocation for unrestored service {:?} dropped", record.trunk, old_service);
                continue;
            };
            registry.with_aggregator(new_agg, |agg| {
                agg.trunk_mut(new_trunk).and_then(|t| t.restore_allocation(*label_a, *label_b, *up, *down, new_service))
            })??;
        }
    }

    registry.reconcile_after_restart();
    Ok(registry)
}

/// Agent/factory registry (component 10, Design Note "Agent/factory
/// registry"): turns a [`crate::config::Settings`] into a populated
/// [`Registry`]. Dependency wiring — which concrete [`Fabric`] backs which
/// switch — is supplied by the caller via `fabric_for`, keeping the core
/// ignorant of how a real driver is constructed; only the typed `Fabric`
/// interface crosses this boundary.
///
/// Networks are built in three passes so that forward references (an
/// aggregator's external terminal naming a not-yet-declared inferior
/// network, a trunk naming either side) resolve regardless of the order
/// `networks` iterates in: (1) every network is registered under its name;
/// (2) every switch's terminals, and every aggregator's external terminals,
/// are added; (3) every aggregator's trunks are declared.
pub fn build_from_config(
    settings: &crate::config::Settings,
    fabric_for: impl Fn(&str) -> Arc<dyn Fabric>,
) -> Result<Arc<Registry>, Error> {
    use crate::config::NetworkAgentConfig;

    let registry = Registry::new();
    let mut by_name: std::collections::HashMap<String, NetworkId> = std::collections::HashMap::new();

    for (name, agent) in &settings.networks {
        let id = match agent {
            NetworkAgentConfig::Switch(_) => registry.add_switch(name.clone(), fabric_for(name)),
            NetworkAgentConfig::Aggregator(_) => registry.add_aggregator(name.clone()),
        };
        by_name.insert(name.clone(), id);
    }

    let resolve = |name: &str| -> Result<NetworkId, Error> { by_name.get(name).copied().ok_or_else(|| Error::UnknownSubnetwork(name.to_string())) };

    for (name, agent) in &settings.networks {
        let self_id = resolve(name)?;
        match agent {
            NetworkAgentConfig::Switch(cfg) => {
                for (term_name, term_cfg) in &cfg.terminals {
                    registry.with_switch(self_id, |sw| sw.add_terminal(term_name.clone(), &term_cfg.interface))??;
                }
            }
            NetworkAgentConfig::Aggregator(cfg) => {
                for (term_name, term_cfg) in &cfg.terminals {
                    let inferior = resolve(&term_cfg.network)?;
                    let inferior_terminal = registry.get_terminal_on(inferior, &term_cfg.subterm)?;
                    registry.with_aggregator(self_id, |agg| agg.add_terminal(self_id, term_name.clone(), inferior, inferior_terminal))??;
                }
            }
        }
    }

    for (name, agent) in &settings.networks {
        let self_id = resolve(name)?;
        if let NetworkAgentConfig::Aggregator(cfg) = agent {
            for trunk_cfg in cfg.trunks.values() {
                let net1 = resolve(&trunk_cfg.end1.network)?;
                let term1 = registry.get_terminal_on(net1, &trunk_cfg.end1.terminal)?;
                let net2 = resolve(&trunk_cfg.end2.network)?;
                let term2 = registry.get_terminal_on(net2, &trunk_cfg.end2.terminal)?;
                let labels = trunk_cfg
                    .label_range()
                    .map_err(|e| Error::ConfigError(e.to_string()))?;
                registry.with_aggregator_and_registry(self_id, |registry, agg| {
                    agg.add_trunk(registry, self_id, (net1, term1), (net2, term2), trunk_cfg.delay, trunk_cfg.up, trunk_cfg.down, labels)
                })??;
            }
        }
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fabric::LoopbackFabric;
    use crate::request::EndPoint;

    #[test]
    fn single_switch_service_reaches_inactive() {
        let registry = Registry::new();
        let net = registry.add_switch("s1", Arc::new(LoopbackFabric::new()));
        let a = registry.with_switch(net, |sw| sw.add_terminal("a", "eth0").unwrap()).unwrap();
        let b = registry.with_switch(net, |sw| sw.add_terminal("b", "eth1").unwrap()).unwrap();
        let service = registry.new_service_on(net).unwrap();
        let request = ConnectionRequest::new(vec![EndPoint::new(a, 10), EndPoint::new(b, 20)], 100.0);
        registry.initiate_on(net, service, request).unwrap();
        assert_eq!(registry.status_on(net, service).unwrap(), ServiceState::Inactive);
    }

    #[test]
    fn fabric_error_fails_the_service() {
        let registry = Registry::new();
        let fabric = Arc::new(LoopbackFabric::new());
        fabric.fail_next_bridge();
        let net = registry.add_switch("s1", fabric);
        let a = registry.with_switch(net, |sw| sw.add_terminal("a", "eth0").unwrap()).unwrap();
        let b = registry.with_switch(net, |sw| sw.add_terminal("b", "eth1").unwrap()).unwrap();
        let service = registry.new_service_on(net).unwrap();
        let request = ConnectionRequest::new(vec![EndPoint::new(a, 10), EndPoint::new(b, 20)], 100.0);
        assert!(registry.initiate_on(net, service, request).is_err());
        assert_eq!(registry.status_on(net, service).unwrap(), ServiceState::Failed);
    }
}
