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

//! Request-shaped data passed across the Service API (§3, §6).

use crate::ids::{Label, TerminalId};
use serde::{Deserialize, Serialize};

/// A terminal paired with a label that selects a traffic subset.
///
/// `terminal` is always scoped to whichever network received the
/// [`ConnectionRequest`] this endpoint is part of — a `Switch` resolves it
/// against its own terminal table; an `Aggregator` resolves it against its
/// external terminal table before rewriting it onto an inferior network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndPoint {
    /// The terminal this endpoint names.
    pub terminal: TerminalId,
    /// The label subdividing traffic on that terminal.
    pub label: Label,
}

impl EndPoint {
    /// Convenience constructor.
    pub fn new(terminal: TerminalId, label: u32) -> Self {
        Self { terminal, label: Label(label) }
    }
}

/// A tenant's request for a point-to-multipoint circuit: a set of endpoints
/// plus a minimum bidirectional bandwidth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRequest {
    /// The endpoints to connect (at least two, enforced at `initiate`).
    pub endpoints: Vec<EndPoint>,
    /// Minimum bandwidth required in both directions.
    pub bandwidth: f64,
}

impl ConnectionRequest {
    /// Builds a new request.
    pub fn new(endpoints: Vec<EndPoint>, bandwidth: f64) -> Self {
        Self { endpoints, bandwidth }
    }
}
