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

//! # Network (§3, Design Note "Deep inheritance -> tagged variant")
//!
//! The source models switches and aggregators as a class hierarchy under a
//! common `Network` base. Here that collapses to a plain two-variant sum:
//! every addressable network is *either* a [`crate::switch::Switch`] *or* an
//! [`crate::aggregator::Aggregator`], distinguished by [`NetworkKind`].
//! Dynamic dispatch over the hierarchy becomes a `match` on the kind, done
//! once at the [`crate::registry::Registry`] boundary; neither `Switch` nor
//! `Aggregator` needs to know the other variant exists.
//!
//! This module carries the kind tag and the read-only summary used by
//! configuration loading, persistence, and operator tooling to enumerate
//! the broker's networks without locking each one in turn.

use serde::{Deserialize, Serialize};

use crate::ids::NetworkId;

/// Which concrete kind a [`NetworkId`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkKind {
    /// A leaf network: terminals backed directly by fabric interfaces.
    Switch,
    /// A composite network: external terminals, inferior networks, and trunks.
    Aggregator,
}

impl std::fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkKind::Switch => write!(f, "switch"),
            NetworkKind::Aggregator => write!(f, "aggregator"),
        }
    }
}

/// A read-only description of one registered network, returned by
/// [`crate::registry::Registry::list_networks`] for operator tooling and
/// config/persistence round-tripping — cheap to collect since it never
/// locks the entity itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSummary {
    /// The network's broker-scoped id.
    pub id: NetworkId,
    /// Whether this id names a switch or an aggregator.
    pub kind: NetworkKind,
    /// The network's operator-assigned name.
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_displays_lowercase() {
        assert_eq!(NetworkKind::Switch.to_string(), "switch");
        assert_eq!(NetworkKind::Aggregator.to_string(), "aggregator");
    }
}
