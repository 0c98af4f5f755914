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

//! # Switch (§4.3)
//!
//! Holds a set of fabric-backed terminals. A service on a switch
//! corresponds to exactly one fabric bridge.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, warn};
use slab::Slab;

use crate::error::Error;
use crate::event::ServiceEvent;
use crate::fabric::{Bridge, BridgeId, Circuit, Fabric, TrafficFlow};
use crate::ids::{ServiceId, TerminalId};
use crate::request::ConnectionRequest;
use crate::service::{validate_request, ServiceCore, ServiceState};
use crate::terminal::{Backing, TerminalTable};
use crossbeam_channel::Receiver;

struct SwitchService {
    core: ServiceCore,
    bridge: Option<Bridge>,
}

/// A switch: a registry of fabric-backed terminals plus the services built
/// on top of them.
pub struct Switch {
    name: String,
    fabric: Arc<dyn Fabric>,
    terminals: TerminalTable,
    services: Slab<SwitchService>,
}

impl std::fmt::Debug for Switch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Switch").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Switch {
    /// Builds a new, empty switch backed by `fabric`.
    pub fn new(name: impl Into<String>, fabric: Arc<dyn Fabric>) -> Self {
        Self { name: name.into(), fabric, terminals: TerminalTable::new(), services: Slab::new() }
    }

    /// The switch's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Clones the switch's fabric handle, for the registry to call
    /// `bridge()` on once this switch's lock has been released (§5).
    pub(crate) fn fabric_handle(&self) -> Arc<dyn Fabric> {
        Arc::clone(&self.fabric)
    }

    /// Registers a new terminal, resolving `interface_desc` through the
    /// fabric (`UNKNOWN_INTERFACE` on rejection).
    pub fn add_terminal(&mut self, name: impl Into<String>, interface_desc: &str) -> Result<TerminalId, Error> {
        let interface = self.fabric.interfaces_of(interface_desc)?;
        self.terminals.add(name, Backing::Fabric(interface))
    }

    /// Looks up a terminal by name.
    pub fn get_terminal(&self, name: &str) -> Result<TerminalId, Error> {
        self.terminals.get_by_name(name)
    }

    /// Removes a terminal (fails if claimed by a trunk or a live service
    /// references it).
    pub fn remove_terminal(&mut self, id: TerminalId) -> Result<(), Error> {
        if self.services.iter().any(|(_, s)| {
            !matches!(s.core.state(), ServiceState::Dormant | ServiceState::Released)
                && s.core.request().map(|r| r.endpoints.iter().any(|e| e.terminal == id)).unwrap_or(false)
        }) {
            return Err(Error::TerminalInUse(id));
        }
        self.terminals.remove(id)
    }

    /// Lists every terminal registered on this switch.
    pub fn list_terminals(&self) -> Vec<TerminalId> {
        self.terminals.list()
    }

    /// A terminal's name and interface description, for persistence
    /// snapshots (a switch terminal is always fabric-backed).
    pub fn terminal_record(&self, id: TerminalId) -> Result<(String, String), Error> {
        let terminal = self.terminals.get(id)?;
        let Backing::Fabric(interface) = terminal.backing() else {
            return Err(Error::UnknownTerminal(id.to_string()));
        };
        Ok((terminal.name().to_string(), interface.0.clone()))
    }

    /// Allocates a fresh, `DORMANT` service.
    pub fn new_service(&mut self) -> ServiceId {
        let key = self.services.insert(SwitchService { core: ServiceCore::new(ServiceId(0)), bridge: None });
        let id = ServiceId(key);
        self.services[key].core = ServiceCore::new(id);
        id
    }

    /// Lists every service id known to this switch.
    pub fn list_services(&self) -> Vec<ServiceId> {
        let mut ids: Vec<ServiceId> = self.services.iter().map(|(k, _)| ServiceId(k)).collect();
        ids.sort();
        ids
    }

    /// The current state of a service.
    pub fn status(&self, service: ServiceId) -> Result<ServiceState, Error> {
        Ok(self.services.get(service.0).ok_or(Error::UnknownService(service))?.core.state())
    }

    /// The request and current state of a service, for persistence snapshots.
    pub fn service_snapshot(&self, service: ServiceId) -> Result<(ConnectionRequest, ServiceState), Error> {
        let entry = self.services.get(service.0).ok_or(Error::UnknownService(service))?;
        let request = entry.core.request().cloned().ok_or(Error::InvalidState)?;
        Ok((request, entry.core.state()))
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

    /// Validates and stages a request, returning the circuit set to bridge.
    /// Does not touch the fabric — the caller does that with the switch's
    /// lock released, per §5.
    pub fn prepare_bridge(&mut self, service: ServiceId, request: ConnectionRequest) -> Result<BTreeMap<Circuit, TrafficFlow>, Error> {
        validate_request(&request)?;
        let entry = self.services.get_mut(service.0).ok_or(Error::UnknownService(service))?;
        entry.core.require_state(&[ServiceState::Dormant, ServiceState::Released])?;

        let mut circuits = BTreeMap::new();
        for endpoint in &request.endpoints {
            let terminal = self.terminals.get(endpoint.terminal)?;
            let Backing::Fabric(interface) = terminal.backing() else {
                return Err(Error::UnknownTerminal(endpoint.terminal.to_string()));
            };
            circuits.insert(
                Circuit { interface: interface.clone(), label: endpoint.label },
                TrafficFlow { upstream: request.bandwidth, downstream: request.bandwidth },
            );
        }

        entry.core.begin_establishing(request);
        Ok(circuits)
    }

    /// Records the bridge returned synchronously by `fabric.bridge(...)`.
    /// The bridge is not yet `created` — that arrives later via
    /// [`Self::handle_bridge_event`].
    pub fn record_bridge(&mut self, service: ServiceId, bridge: Bridge) -> Result<(), Error> {
        let entry = self.services.get_mut(service.0).ok_or(Error::UnknownService(service))?;
        entry.bridge = Some(bridge);
        Ok(())
    }

    /// Handles an asynchronous bridge event, folding it into the owning
    /// service's state (§4.3: `created` -> INACTIVE/`ready`; `error` ->
    /// FAILED with the offending endpoints attached).
    pub fn handle_bridge_event(&mut self, service: ServiceId, event: crate::fabric::BridgeEvent) -> Result<(), Error> {
        let entry = self.services.get_mut(service.0).ok_or(Error::UnknownService(service))?;
        match event {
            crate::fabric::BridgeEvent::Created => {
                debug!("switch {:?}: service {service} bridge ready, -> INACTIVE", self.name);
                entry.core.transition(ServiceState::Inactive, ServiceEvent::Ready);
            }
            crate::fabric::BridgeEvent::Error(cause) => {
                warn!("switch {:?}: service {service} bridge failed: {cause}", self.name);
                let endpoints = entry.core.request().map(|r| r.endpoints.clone()).unwrap_or_default();
                entry.core.transition(ServiceState::Failed, ServiceEvent::Failed { endpoints, cause });
            }
            crate::fabric::BridgeEvent::Destroyed => {
                debug!("switch {:?}: service {service} bridge destroyed, -> RELEASED", self.name);
                entry.core.transition(ServiceState::Released, ServiceEvent::Released);
            }
        }
        Ok(())
    }

    /// `activate()`: pure state transition, no fabric action (§4.3).
    pub fn activate(&mut self, service: ServiceId) -> Result<(), Error> {
        let entry = self.services.get_mut(service.0).ok_or(Error::UnknownService(service))?;
        entry.core.require_state(&[ServiceState::Inactive])?;
        debug!("switch {:?}: activating service {service}", self.name);
        entry.core.transition(ServiceState::Activating, ServiceEvent::Activating);
        entry.core.transition(ServiceState::Active, ServiceEvent::Activated);
        Ok(())
    }

    /// `deactivate()`: pure state transition, no fabric action (§4.3).
    pub fn deactivate(&mut self, service: ServiceId) -> Result<(), Error> {
        let entry = self.services.get_mut(service.0).ok_or(Error::UnknownService(service))?;
        entry.core.require_state(&[ServiceState::Active])?;
        debug!("switch {:?}: deactivating service {service}", self.name);
        entry.core.transition(ServiceState::Deactivating, ServiceEvent::Deactivating);
        entry.core.transition(ServiceState::Inactive, ServiceEvent::Deactivated);
        Ok(())
    }

    /// `release()`: tears down the bridge; idempotent (§4.3, I5).
    pub fn release(&mut self, service: ServiceId) -> Result<(), Error> {
        let entry = self.services.get_mut(service.0).ok_or(Error::UnknownService(service))?;
        if entry.core.state() == ServiceState::Released {
            return Ok(());
        }
        debug!("switch {:?}: releasing service {service}", self.name);
        entry.bridge = None;
        let live: Vec<BridgeId> = self
            .services
            .iter()
            .filter(|(k, s)| *k != service.0 && s.bridge.is_some())
            .filter_map(|(_, s)| s.bridge.as_ref().map(|b| b.id))
            .collect();
        self.fabric.retain(&live);
        let entry = self.services.get_mut(service.0).ok_or(Error::UnknownService(service))?;
        entry.core.transition(ServiceState::Released, ServiceEvent::Released);
        Ok(())
    }

    /// All bridges still claimed by a live service, for restart reconciliation.
    pub fn live_bridges(&self) -> Vec<BridgeId> {
        self.services.iter().filter_map(|(_, s)| s.bridge.as_ref().map(|b| b.id)).collect()
    }

    /// Declares the switch's currently live bridges to the fabric, letting
    /// it garbage-collect anything else (§4.6 restart reconciliation).
    pub fn reconcile_bridges(&self) {
        let live = self.live_bridges();
        debug!("switch {:?}: reconciling {} live bridge(s) after restart", self.name, live.len());
        self.fabric.retain(&live);
    }

    /// Claims one of this switch's terminals for a trunk endpoint. Used by
    /// the registry when an aggregator declares a trunk onto this switch.
    pub fn claim_terminal_for_trunk(&mut self, terminal: TerminalId) -> Result<(), Error> {
        self.terminals.claim_for_trunk(terminal)
    }

    /// Releases a terminal's trunk claim (trunk decommissioned).
    pub fn release_terminal_trunk_claim(&mut self, terminal: TerminalId) {
        self.terminals.release_trunk_claim(terminal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fabric::LoopbackFabric;
    use crate::ids::TerminalId as Tid;
    use crate::request::EndPoint;

    fn new_switch() -> Switch {
        Switch::new("s1", Arc::new(LoopbackFabric::new()))
    }

    #[test]
    fn add_terminal_rejects_duplicate_name() {
        let mut s = new_switch();
        s.add_terminal("a", "eth0").unwrap();
        assert!(matches!(s.add_terminal("a", "eth1"), Err(Error::TerminalExists(_))));
    }

    #[test]
    fn prepare_bridge_validates_boundary_rule() {
        let mut s = new_switch();
        let a = s.add_terminal("a", "eth0").unwrap();
        let svc = s.new_service();
        let req = ConnectionRequest::new(vec![EndPoint::new(a, 1)], 10.0);
        assert_eq!(s.prepare_bridge(svc, req), Err(Error::InvalidState));
    }

    #[test]
    fn prepare_bridge_builds_expected_circuits() {
        let mut s = new_switch();
        let a = s.add_terminal("a", "eth0").unwrap();
        let b = s.add_terminal("b", "eth1").unwrap();
        let svc = s.new_service();
        let req = ConnectionRequest::new(vec![EndPoint::new(a, 10), EndPoint::new(b, 20)], 100.0);
        let circuits = s.prepare_bridge(svc, req).unwrap();
        assert_eq!(circuits.len(), 2);
        for flow in circuits.values() {
            assert_eq!(flow.upstream, 100.0);
            assert_eq!(flow.downstream, 100.0);
        }
        let _ = Tid(0);
    }
}
