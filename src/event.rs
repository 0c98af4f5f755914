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

//! Service lifecycle events, delivered one channel per service (Design Note
//! "Listeners"). Events for a single service are always delivered in
//! state-machine order; events across services carry no ordering guarantee.

use crate::ids::ServiceId;
use crate::request::EndPoint;
use crossbeam_channel::{Receiver, Sender, TrySendError};

/// Depth of the bounded per-service listener channel (§5 "bounded event
/// dispatch"). Sized generously since a service only ever emits a handful
/// of events across its lifetime.
pub const LISTENER_CAPACITY: usize = 32;

/// A single transition in a service's lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceEvent {
    /// The service's bridge(s) are provisioned; state is now INACTIVE.
    Ready,
    /// `activate()` has been accepted; state is now ACTIVATING.
    Activating,
    /// All sub-services (or the local bridge) are carrying traffic; state is now ACTIVE.
    Activated,
    /// `deactivate()` has been accepted; state is now DEACTIVATING.
    Deactivating,
    /// The service is back to INACTIVE.
    Deactivated,
    /// The service could not be established or suffered a fabric failure.
    /// `cause` names the offending endpoints.
    Failed {
        /// Endpoints implicated in the failure, if known.
        endpoints: Vec<EndPoint>,
        /// Human-readable cause (mirrors the originating [`crate::error::Error`]).
        cause: String,
    },
    /// `release()` has completed; state is now RELEASED (terminal).
    Released,
}

impl ServiceEvent {
    /// True for the two terminal events a listener must never miss.
    pub fn is_terminal_notice(&self) -> bool {
        matches!(self, ServiceEvent::Failed { .. } | ServiceEvent::Released)
    }
}

/// A service's listener registry: a small set of bounded channels that are
/// fanned out to on every transition.
#[derive(Debug, Default)]
pub struct ListenerSet {
    senders: Vec<Sender<ServiceEvent>>,
}

impl ListenerSet {
    /// Creates an empty listener set.
    pub fn new() -> Self {
        Self { senders: Vec::new() }
    }

    /// Registers a new listener, returning the receiving end.
    pub fn add_listener(&mut self) -> Receiver<ServiceEvent> {
        let (tx, rx) = crossbeam_channel::bounded(LISTENER_CAPACITY);
        self.senders.push(tx);
        rx
    }

    /// Delivers `event` to every registered listener.
    ///
    /// Per §5, the broker must never block a lock-holding thread
    /// indefinitely on a slow consumer. Non-terminal events are dropped
    /// on a full channel (the caller can always re-derive current state via
    /// `status()`); terminal events (`Failed`, `Released`) are retried a
    /// bounded number of times with the sender's own backpressure, since
    /// losing one would strand a caller waiting forever, but we still never
    /// block unboundedly — we simply accept the (documented) possibility of
    /// dropping a terminal event on a truly wedged listener after a few
    /// attempts rather than hanging the broker.
    pub fn emit(&self, event: ServiceEvent) {
        for sender in &self.senders {
            let mut remaining = if event.is_terminal_notice() { 4 } else { 1 };
            let mut to_send = event.clone();
            loop {
                match sender.try_send(to_send) {
                    Ok(()) => break,
                    Err(TrySendError::Full(back)) => {
                        remaining -= 1;
                        to_send = back;
                        if remaining == 0 {
                            log::warn!("dropping event for a wedged listener: {:?}", to_send);
                            break;
                        }
                    }
                    Err(TrySendError::Disconnected(_)) => break,
                }
            }
        }
    }
}

/// Handle for a service id paired with the event naming it, used when a
/// sub-service reports up into its owning aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceRef {
    /// The network that owns the service.
    pub network: crate::ids::NetworkId,
    /// The service's id within that network.
    pub service: ServiceId,
}
