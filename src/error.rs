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

//! Crate-wide error type.
//!
//! Every failure mode named in the design (management, planning, lifecycle)
//! is a variant here, each carrying the offending entity so the caller can
//! report it without re-deriving context.

use crate::ids::{NetworkId, ServiceId, TerminalId, TrunkId};
use thiserror::Error;

/// Errors returned by the broker's management and service APIs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // --- Management errors (§7) ---
    /// A terminal with this name already exists on the network.
    #[error("terminal {0:?} already exists")]
    TerminalExists(String),
    /// No terminal by this name/id is known to the network.
    #[error("unknown terminal {0}")]
    UnknownTerminal(String),
    /// An aggregator was handed one of its own terminals where an inferior
    /// network's terminal was expected (e.g. as a trunk endpoint).
    #[error("terminal {0} belongs to the aggregator itself, not an inferior network")]
    OwnTerminal(TerminalId),
    /// No trunk with this id is known to the aggregator.
    #[error("unknown trunk {0}")]
    UnknownTrunk(TrunkId),
    /// No inferior network by this name/id is known to the aggregator.
    #[error("unknown inferior network {0}")]
    UnknownSubnetwork(String),
    /// The terminal cannot be removed/repurposed while something still uses it.
    #[error("terminal {0} is in use")]
    TerminalInUse(TerminalId),
    /// The fabric driver rejected an interface description.
    #[error("fabric rejected interface description {0:?}")]
    UnknownInterface(String),

    // --- Planning errors (§7) ---
    /// No spanning tree could be found connecting the requested terminal set
    /// at the requested bandwidth, even after retrying.
    #[error("no route at the requested bandwidth connects the requested endpoints")]
    Unroutable,
    /// A trunk has no free VLAN label left in its declared range.
    #[error("trunk {0} has no free label")]
    OutOfLabels(TrunkId),
    /// A trunk cannot accommodate the requested bandwidth in one direction.
    #[error("trunk {0} has insufficient bandwidth")]
    OutOfBandwidth(TrunkId),

    // --- Lifecycle errors (§7) ---
    /// The requested operation is not valid for the service's current state.
    #[error("invalid operation for current service state")]
    InvalidState,
    /// The fabric driver reported an error while (de)provisioning a bridge.
    #[error("fabric error: {0}")]
    FabricError(String),
    /// The operator-declared configuration was malformed or inconsistent.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// No service with this id is known to the network.
    #[error("unknown service {0}")]
    UnknownService(ServiceId),
    /// No network with this id is registered with the broker.
    #[error("unknown network {0}")]
    UnknownNetwork(NetworkId),
}
