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

//! # Service lifecycle (§3, §4.3, §4.5, §4.7)
//!
//! `ServiceState` and `ServiceCore` are shared by both `Switch` and
//! `Aggregator` — the "service scheduler" row of the component table is
//! this module plus the per-network `Slab` that holds one `ServiceCore`
//! per live service.

pub use crate::request::{ConnectionRequest, EndPoint};
use crate::error::Error;
use crate::event::{ListenerSet, ServiceEvent};
use crate::ids::ServiceId;
use crossbeam_channel::Receiver;

/// A service's position in its lifecycle (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Constructed, not yet given a request.
    Dormant,
    /// `initiate()` accepted; waiting for bridge(s)/sub-service(s) to come up.
    Establishing,
    /// Provisioned but not carrying traffic.
    Inactive,
    /// `activate()` accepted; waiting for sub-services to confirm.
    Activating,
    /// Carrying traffic.
    Active,
    /// `deactivate()` accepted; waiting for sub-services to confirm.
    Deactivating,
    /// `release()` accepted; waiting for teardown to complete.
    Releasing,
    /// Torn down. Terminal.
    Released,
    /// Establishment or an in-flight sub-service failed; rollback in
    /// progress or complete. Not terminal — may be re-initiated once
    /// rollback reaches `Released`.
    Failed,
}

/// Validates a request against the boundary rules in §8: at least two
/// endpoints are required (bandwidth may legitimately be zero).
pub fn validate_request(request: &ConnectionRequest) -> Result<(), Error> {
    if request.endpoints.len() < 2 {
        return Err(Error::InvalidState);
    }
    Ok(())
}

/// The state shared by every service, regardless of which kind of network
/// owns it.
#[derive(Debug)]
pub struct ServiceCore {
    id: ServiceId,
    state: ServiceState,
    request: Option<ConnectionRequest>,
    listeners: ListenerSet,
}

impl ServiceCore {
    /// A brand new, `DORMANT` service.
    pub fn new(id: ServiceId) -> Self {
        Self { id, state: ServiceState::Dormant, request: None, listeners: ListenerSet::new() }
    }

    /// The service's id.
    pub fn id(&self) -> ServiceId {
        self.id
    }

    /// The service's current state.
    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// The request this service was initiated with, if any.
    pub fn request(&self) -> Option<&ConnectionRequest> {
        self.request.as_ref()
    }

    /// Registers a new listener, returning its receiving end.
    pub fn add_listener(&mut self) -> Receiver<ServiceEvent> {
        self.listeners.add_listener()
    }

    /// Delivers `event` to every registered listener and moves `state`
    /// forward to match (state-machine order is guaranteed per service,
    /// §5, because both happen together here under the owning network's
    /// lock).
    pub fn transition(&mut self, state: ServiceState, event: ServiceEvent) {
        self.state = state;
        self.listeners.emit(event);
    }

    /// Records the request a service is being initiated with and moves it
    /// to `ESTABLISHING`.
    pub fn begin_establishing(&mut self, request: ConnectionRequest) {
        self.request = Some(request);
        self.state = ServiceState::Establishing;
    }

    /// True if `op` is valid to call given the current state. Each op
    /// documents its own precondition inline at the call site; this is a
    /// small helper for the common "must be in one of these states" checks.
    pub fn require_state(&self, allowed: &[ServiceState]) -> Result<(), Error> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidState)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Label;

    #[test]
    fn single_endpoint_request_is_invalid() {
        let req = ConnectionRequest::new(vec![EndPoint::new(crate::ids::TerminalId(0), 1)], 10.0);
        assert_eq!(validate_request(&req), Err(Error::InvalidState));
    }

    #[test]
    fn zero_bandwidth_request_is_valid() {
        let req = ConnectionRequest::new(
            vec![EndPoint::new(crate::ids::TerminalId(0), 1), EndPoint::new(crate::ids::TerminalId(1), 2)],
            0.0,
        );
        assert!(validate_request(&req).is_ok());
        let _ = Label(0);
    }

    #[test]
    fn transition_updates_state_and_emits() {
        let mut core = ServiceCore::new(ServiceId(0));
        let rx = core.add_listener();
        core.transition(ServiceState::Inactive, ServiceEvent::Ready);
        assert_eq!(core.state(), ServiceState::Inactive);
        assert_eq!(rx.try_recv().unwrap(), ServiceEvent::Ready);
    }
}
