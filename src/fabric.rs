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

//! # Fabric driver contract (§4.2)
//!
//! The switch-specific driver that realises bridges in hardware/firmware.
//! Only the contract is specified here — how a concrete driver talks to,
//! say, a Corsa DP2X00 over HTTPS is out of scope (§1). A [`LoopbackFabric`]
//! reference implementation is provided for tests: it is a stand-in for an
//! external system, in the same spirit the teacher's `ExternalRouter`
//! stands in for a BGP peer outside the simulated network.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use log::debug;

use crate::error::Error;
use crate::ids::Label;

/// A physical port or tagged sub-port on a fabric, named syntactically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Interface(pub String);

/// An endpoint as seen by a fabric driver: an interface plus a label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Circuit {
    /// The physical or tagged sub-port.
    pub interface: Interface,
    /// The label selecting a traffic subset on that interface.
    pub label: Label,
}

/// Bandwidth required in each direction for a circuit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrafficFlow {
    /// Bandwidth floor, upstream.
    pub upstream: f64,
    /// Bandwidth floor, downstream.
    pub downstream: f64,
}

/// Handle to a fabric-level bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BridgeId(pub u64);

/// Outcome delivered asynchronously to a bridge's listener.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// The bridge is up and forwarding traffic.
    Created,
    /// The bridge has been torn down (in response to a `retain` GC or an
    /// explicit delete).
    Destroyed,
    /// The bridge failed irrecoverably; the client must create a fresh one.
    Error(String),
}

/// Callback invoked by the fabric when a bridge's state changes.
/// Delivered from a driver-owned thread — never called while the client
/// holds its own network lock (§5).
pub type BridgeListener = Box<dyn Fn(BridgeEvent) + Send + Sync>;

/// A fabric-level grouping of circuits stitched together for forwarding.
#[derive(Debug, Clone)]
pub struct Bridge {
    /// The fabric-assigned id of this bridge.
    pub id: BridgeId,
    /// The circuits this bridge connects, each with its requested flow.
    pub circuits: BTreeMap<Circuit, TrafficFlow>,
}

/// The driver contract a `Switch` consumes (§4.2).
pub trait Fabric: std::fmt::Debug + Send + Sync {
    /// Resolves a textual interface description (e.g. `"eth0.100"`) into an
    /// [`Interface`]. Purely syntactic — no hardware is touched.
    fn interfaces_of(&self, description: &str) -> Result<Interface, Error>;

    /// Requests a bridge connecting `circuits`. The fabric may return an
    /// existing equivalent bridge (idempotent creation under an equal
    /// circuit set). Asynchronous: `listener` is invoked later with
    /// `Created`, `Destroyed`, or `Error`.
    fn bridge(&self, circuits: BTreeMap<Circuit, TrafficFlow>, listener: BridgeListener) -> Result<Bridge, Error>;

    /// Declares which bridges the client still wants; anything else is
    /// garbage-collected. Used to reconcile state after a broker restart.
    fn retain(&self, live_bridges: &[BridgeId]);
}

/// A reference [`Fabric`] used by tests and by the loopback/dev agent
/// config: it resolves any interface description syntactically, creates
/// bridges on a short-lived worker thread (to exercise the asynchronous
/// listener contract without a real controller), and lets tests force a
/// bridge straight to `Error` to exercise rollback.
#[derive(Debug)]
pub struct LoopbackFabric {
    next_id: AtomicU64,
    live: Mutex<Vec<BridgeId>>,
    fail_next: Mutex<bool>,
}

impl Default for LoopbackFabric {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackFabric {
    /// Builds a fresh loopback fabric with no live bridges.
    pub fn new() -> Self {
        Self { next_id: AtomicU64::new(1), live: Mutex::new(Vec::new()), fail_next: Mutex::new(false) }
    }

    /// Arranges for the next `bridge()` call to report `Error` instead of
    /// `Created`, for exercising §4.6 rollback in tests.
    pub fn fail_next_bridge(&self) {
        *self.fail_next.lock().unwrap() = true;
    }

    /// Whether `id` is still in the retained set, for restart-reconciliation tests.
    pub fn is_live(&self, id: BridgeId) -> bool {
        self.live.lock().unwrap().contains(&id)
    }
}

impl Fabric for LoopbackFabric {
    fn interfaces_of(&self, description: &str) -> Result<Interface, Error> {
        if description.is_empty() {
            return Err(Error::UnknownInterface(description.to_string()));
        }
        Ok(Interface(description.to_string()))
    }

    fn bridge(&self, circuits: BTreeMap<Circuit, TrafficFlow>, listener: BridgeListener) -> Result<Bridge, Error> {
        let id = BridgeId(self.next_id.fetch_add(1, AtomicOrdering::SeqCst));
        debug!("loopback fabric: dispatching bridge {id:?} with {} circuit(s)", circuits.len());
        self.live.lock().unwrap().push(id);
        let should_fail = {
            let mut f = self.fail_next.lock().unwrap();
            std::mem::replace(&mut *f, false)
        };
        let listener = Arc::new(listener);
        let announce = Arc::clone(&listener);
        std::thread::spawn(move || {
            if should_fail {
                announce(BridgeEvent::Error("simulated fabric failure".to_string()));
            } else {
                announce(BridgeEvent::Created);
            }
        });
        Ok(Bridge { id, circuits })
    }

    fn retain(&self, live_bridges: &[BridgeId]) {
        let mut live = self.live.lock().unwrap();
        live.retain(|id| live_bridges.contains(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn loopback_bridge_reports_created() {
        let fabric = LoopbackFabric::new();
        let (tx, rx) = mpsc::channel();
        let circuits = BTreeMap::new();
        fabric
            .bridge(
                circuits,
                Box::new(move |event| {
                    let _ = tx.send(event);
                }),
            )
            .unwrap();
        let event = rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap();
        assert_eq!(event, BridgeEvent::Created);
    }

    #[test]
    fn loopback_bridge_can_be_forced_to_error() {
        let fabric = LoopbackFabric::new();
        fabric.fail_next_bridge();
        let (tx, rx) = mpsc::channel();
        fabric
            .bridge(
                BTreeMap::new(),
                Box::new(move |event| {
                    let _ = tx.send(event);
                }),
            )
            .unwrap();
        let event = rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap();
        assert!(matches!(event, BridgeEvent::Error(_)));
    }
}
