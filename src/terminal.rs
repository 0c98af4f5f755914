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

//! Terminals: named access points owned by exactly one network (§3).

use std::collections::HashMap;

use slab::Slab;

use crate::error::Error;
use crate::fabric::Interface;
use crate::ids::{NetworkId, TerminalId};

/// What a terminal is backed by, depending on the kind of network that owns it.
#[derive(Debug, Clone, PartialEq)]
pub enum Backing {
    /// A `Switch` terminal: backed by a fabric interface.
    Fabric(Interface),
    /// An `Aggregator`'s external terminal: a forwarding alias onto exactly
    /// one internal terminal of an inferior network.
    Inferior(NetworkId, TerminalId),
}

/// A named access point.
#[derive(Debug, Clone)]
pub struct Terminal {
    name: String,
    backing: Backing,
    /// Set when some ancestor aggregator has claimed this terminal as one
    /// end of a trunk (§3 "a terminal may participate in at most one
    /// trunk"). Not the same as the terminal being "used" by a live
    /// service — a terminal may serve many services over its lifetime.
    trunked: bool,
}

impl Terminal {
    /// The terminal's name, unique within its owning network.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// What the terminal is backed by.
    pub fn backing(&self) -> &Backing {
        &self.backing
    }

    /// Whether a trunk currently claims this terminal.
    pub fn is_trunked(&self) -> bool {
        self.trunked
    }
}

/// A network's terminal table: an arena of [`Terminal`]s plus a name index.
#[derive(Debug, Default)]
pub struct TerminalTable {
    slab: Slab<Terminal>,
    by_name: HashMap<String, TerminalId>,
}

impl TerminalTable {
    /// An empty table.
    pub fn new() -> Self {
        Self { slab: Slab::new(), by_name: HashMap::new() }
    }

    /// Registers a new terminal. Fails `TerminalExists` if the name is
    /// already taken.
    pub fn add(&mut self, name: impl Into<String>, backing: Backing) -> Result<TerminalId, Error> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(Error::TerminalExists(name));
        }
        let key = self.slab.insert(Terminal { name: name.clone(), backing, trunked: false });
        let id = TerminalId(key);
        self.by_name.insert(name, id);
        Ok(id)
    }

    /// Looks up a terminal by name.
    pub fn get_by_name(&self, name: &str) -> Result<TerminalId, Error> {
        self.by_name.get(name).copied().ok_or_else(|| Error::UnknownTerminal(name.to_string()))
    }

    /// Looks up a terminal by id.
    pub fn get(&self, id: TerminalId) -> Result<&Terminal, Error> {
        self.slab.get(id.0).ok_or_else(|| Error::UnknownTerminal(id.to_string()))
    }

    fn get_mut(&mut self, id: TerminalId) -> Result<&mut Terminal, Error> {
        self.slab.get_mut(id.0).ok_or_else(|| Error::UnknownTerminal(id.to_string()))
    }

    /// Removes a terminal, failing `TerminalInUse` if it is currently
    /// claimed by a trunk. Callers are additionally responsible for
    /// checking that no live service still references it.
    pub fn remove(&mut self, id: TerminalId) -> Result<(), Error> {
        let terminal = self.get(id)?;
        if terminal.is_trunked() {
            return Err(Error::TerminalInUse(id));
        }
        let name = terminal.name().to_string();
        self.slab.remove(id.0);
        self.by_name.remove(&name);
        Ok(())
    }

    /// Lists every registered terminal id, in a stable order.
    pub fn list(&self) -> Vec<TerminalId> {
        let mut ids: Vec<TerminalId> = self.slab.iter().map(|(k, _)| TerminalId(k)).collect();
        ids.sort();
        ids
    }

    /// Marks a terminal as claimed by a trunk. Fails `TerminalInUse` if it
    /// is already claimed.
    pub fn claim_for_trunk(&mut self, id: TerminalId) -> Result<(), Error> {
        let terminal = self.get_mut(id)?;
        if terminal.trunked {
            return Err(Error::TerminalInUse(id));
        }
        terminal.trunked = true;
        Ok(())
    }

    /// Releases a terminal's trunk claim (used when a trunk is decommissioned).
    pub fn release_trunk_claim(&mut self, id: TerminalId) {
        if let Ok(terminal) = self.get_mut(id) {
            terminal.trunked = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_name_is_rejected() {
        let mut table = TerminalTable::new();
        table.add("a", Backing::Fabric(Interface("eth0".into()))).unwrap();
        let err = table.add("a", Backing::Fabric(Interface("eth1".into()))).unwrap_err();
        assert_eq!(err, Error::TerminalExists("a".into()));
    }

    #[test]
    fn trunked_terminal_cannot_be_removed() {
        let mut table = TerminalTable::new();
        let id = table.add("a", Backing::Fabric(Interface("eth0".into()))).unwrap();
        table.claim_for_trunk(id).unwrap();
        assert_eq!(table.remove(id), Err(Error::TerminalInUse(id)));
    }
}
