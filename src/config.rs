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

//! # Configuration (§6, component 9)
//!
//! Layered settings loading: a system-wide `Default.toml` under
//! `/etc/trunkline`, a user override under `~/.config/trunkline`, a
//! `RUN_MODE`-named override file layered on top of each, and finally
//! `TRUNKLINE_`-prefixed environment variables. Recognised keys mirror §6
//! exactly: `name`, `type`, `terminals.<name>.network`,
//! `terminals.<name>.subterm` (aggregator-only), and
//! `trunks.<tag>.{end1,end2}.{network,terminal}`, `delay`, `up`, `down`,
//! `labels`.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Standard system-wide search location for configuration files.
static SYS_CONF_DIR: &str = "/etc/trunkline";

fn user_conf_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|mut p| {
        p.push(".config");
        p.push("trunkline");
        p
    })
}

/// A single switch terminal: the fabric interface description it's backed by.
#[derive(Debug, Clone, Deserialize)]
pub struct SwitchTerminalConfig {
    /// Passed verbatim to `Fabric::interfaces_of`.
    pub interface: String,
}

/// A switch agent's recognised configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SwitchConfig {
    /// Terminal name -> fabric interface description.
    #[serde(default)]
    pub terminals: HashMap<String, SwitchTerminalConfig>,
}

/// A single aggregator external terminal: which inferior network/terminal it aliases.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorTerminalConfig {
    /// Name of the inferior network this external terminal aliases.
    pub network: String,
    /// Name of the terminal on that inferior network.
    pub subterm: String,
}

/// One side of a trunk declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct TrunkEndConfig {
    /// Name of the inferior network this side sits on.
    pub network: String,
    /// Name of the terminal on that network.
    pub terminal: String,
}

/// A single trunk declaration (§6).
#[derive(Debug, Clone, Deserialize)]
pub struct TrunkConfig {
    /// The first side of the trunk.
    pub end1: TrunkEndConfig,
    /// The second side of the trunk.
    pub end2: TrunkEndConfig,
    /// Additive routing cost.
    pub delay: f64,
    /// Upstream bandwidth budget.
    pub up: f64,
    /// Downstream bandwidth budget.
    pub down: f64,
    /// The declared label range, as `"<low>-<high>"` (e.g. `"1-4094"`).
    pub labels: String,
}

impl TrunkConfig {
    /// Parses [`Self::labels`] into the inclusive range of label integers it declares.
    pub fn label_range(&self) -> Result<std::ops::RangeInclusive<u32>, ConfigError> {
        let (low, high) = self
            .labels
            .split_once('-')
            .ok_or_else(|| ConfigError::Message(format!("malformed label range {:?}", self.labels)))?;
        let low: u32 = low.trim().parse().map_err(|_| ConfigError::Message(format!("malformed label range {:?}", self.labels)))?;
        let high: u32 = high.trim().parse().map_err(|_| ConfigError::Message(format!("malformed label range {:?}", self.labels)))?;
        Ok(low..=high)
    }
}

/// An aggregator agent's recognised configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AggregatorConfig {
    /// External terminal name -> the inferior terminal it aliases.
    #[serde(default)]
    pub terminals: HashMap<String, AggregatorTerminalConfig>,
    /// Trunk tag -> declaration.
    #[serde(default)]
    pub trunks: HashMap<String, TrunkConfig>,
}

/// One network agent stanza, discriminated by its `type` key (component 10:
/// the agent/factory registry dispatches on this tag).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NetworkAgentConfig {
    /// `type = "switch"`.
    Switch(SwitchConfig),
    /// `type = "aggregator"`.
    Aggregator(AggregatorConfig),
}

/// The broker's full recognised configuration: a named set of network agents.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    /// Network name -> its agent configuration.
    #[serde(default)]
    pub networks: HashMap<String, NetworkAgentConfig>,
}

impl Settings {
    /// Loads settings the way the teacher's configuration story in
    /// `witlox-horao` does: system dir, then user dir, each layered under a
    /// `RUN_MODE`-named override, then `TRUNKLINE_`-prefixed environment
    /// variables, highest precedence last.
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let mut builder = Config::builder();

        builder = builder
            .add_source(File::with_name(&format!("{}/default", SYS_CONF_DIR)).required(false))
            .add_source(File::with_name(&format!("{}/{}", SYS_CONF_DIR, run_mode)).required(false));

        if let Some(dir) = user_conf_dir() {
            if let Some(dir) = dir.to_str() {
                builder = builder
                    .add_source(File::with_name(&format!("{}/default", dir)).required(false))
                    .add_source(File::with_name(&format!("{}/{}", dir, run_mode)).required(false));
            }
        }

        builder = builder.add_source(Environment::with_prefix("TRUNKLINE").separator("__"));
        builder.build()?.try_deserialize()
    }

    /// Loads settings from a single file path, bypassing the layered search
    /// (used by the CLI's `--config` flag and by tests).
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("TRUNKLINE").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_range_parses_inclusive_bounds() {
        let cfg = TrunkConfig {
            end1: TrunkEndConfig { network: "s1".into(), terminal: "p".into() },
            end2: TrunkEndConfig { network: "s2".into(), terminal: "q".into() },
            delay: 1.0,
            up: 1000.0,
            down: 1000.0,
            labels: "1-100".into(),
        };
        let range = cfg.label_range().unwrap();
        assert_eq!(*range.start(), 1);
        assert_eq!(*range.end(), 100);
    }

    #[test]
    fn label_range_rejects_malformed_input() {
        let cfg = TrunkConfig {
            end1: TrunkEndConfig { network: "s1".into(), terminal: "p".into() },
            end2: TrunkEndConfig { network: "s2".into(), terminal: "q".into() },
            delay: 1.0,
            up: 1000.0,
            down: 1000.0,
            labels: "nope".into(),
        };
        assert!(cfg.label_range().is_err());
    }
}
