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

#![deny(missing_docs)]

//! # Trunkline
//!
//! A data-plane broker that provisions and maintains point-to-multipoint
//! Layer-2 circuits ("services") across a heterogeneous set of programmable
//! switches interconnected by operator-declared trunks. Tenants request a
//! service by naming a set of terminal/label endpoints and a minimum
//! bidirectional bandwidth; the broker picks a path across the trunk
//! topology, allocates VLAN labels, commands the underlying fabric hardware
//! to install forwarding rules, and reports lifecycle transitions.
//!
//! ## Structure
//!
//! - **[`graph`]**: the undirected weighted multigraph, distance-vector
//!   shortest paths, Prim minimum spanning tree, and the goal-set
//!   Steiner-approximation spanning tree the planner routes services over.
//! - **[`fabric`]**: the driver contract a [`switch::Switch`] consumes to
//!   realise bridges in hardware, plus a [`fabric::LoopbackFabric`]
//!   reference double for tests.
//! - **[`terminal`]**: the per-network terminal arena ([`terminal::TerminalTable`]).
//! - **[`trunk`]**: the VLAN label pool and bandwidth budget of a single
//!   trunk between two inferior networks.
//! - **[`switch`]**: a leaf network — terminals backed by fabric interfaces,
//!   one fabric bridge per service.
//! - **[`aggregator`]**: a composite network — the planner that rewrites,
//!   routes, allocates, and decomposes a tenant request into sub-requests
//!   over inferior networks.
//! - **[`service`]**: the lifecycle state machine shared by every network kind.
//! - **[`event`]**: the per-service listener channel and event taxonomy.
//! - **[`network`]**: the two-variant `Switch | Aggregator` sum type and the
//!   kind-dispatching summary used by configuration and persistence.
//! - **[`registry`]**: the broker's top-level arena of networks, and the
//!   lock-ordering, fabric-call, and restart-reconciliation plumbing around
//!   them (§5).
//! - **[`config`]**: layered configuration loading (component 9).
//! - **[`persistence`]**: the upsert/reconstruct contract for durable
//!   storage of terminals, trunks, and service plans (component 11).
//! - **[`error`]**: the crate-wide error type.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod event;
pub mod fabric;
pub mod graph;
pub mod ids;
pub mod network;
pub mod persistence;
pub mod registry;
pub mod request;
pub mod service;
pub mod switch;
pub mod terminal;
pub mod trunk;

pub use error::Error;
pub use ids::{Label, NetworkId, ServiceId, TerminalId, TrunkId};
pub use registry::Registry;
pub use request::{ConnectionRequest, EndPoint};
