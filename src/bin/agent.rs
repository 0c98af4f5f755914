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

//! The `trunkline-agent` binary: wires a configuration file to a running
//! broker instance. Dependency wiring of concrete fabric drivers happens
//! here, outside the core (Design Note "Agent/factory registry") — this
//! binary uses [`trunkline::fabric::LoopbackFabric`] for every switch,
//! since a production HTTPS driver to a specific controller is out of
//! scope (§1).

use std::error::Error as StdError;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::info;

use trunkline::config::Settings;
use trunkline::fabric::{Fabric, LoopbackFabric};
use trunkline::registry::{self, Registry};

#[derive(Parser, Debug)]
#[command(name = "trunkline-agent", version, about = "VLAN service broker agent")]
struct Cli {
    /// Path to a configuration file, bypassing the layered `/etc` + user
    /// search (defaults to the standard layered lookup when omitted).
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Loads the configuration, builds the broker's networks, and reports
    /// what was registered.
    Status,
    /// Loads the configuration and reports whether it is well-formed,
    /// without registering anything.
    Validate,
}

fn load_settings(path: Option<&str>) -> Result<Settings, Box<dyn StdError>> {
    match path {
        Some(path) => Ok(Settings::load_from(path)?),
        None => Ok(Settings::load()?),
    }
}

fn build_registry(settings: &Settings) -> Result<Arc<Registry>, Box<dyn StdError>> {
    let fabric_factory = |_name: &str| -> Arc<dyn Fabric> { Arc::new(LoopbackFabric::new()) };
    Ok(registry::build_from_config(settings, fabric_factory)?)
}

fn main() -> Result<(), Box<dyn StdError>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Validate => {
            let settings = load_settings(cli.config.as_deref())?;
            info!("configuration is well-formed: {} network(s) declared", settings.networks.len());
        }
        Command::Status => {
            let settings = load_settings(cli.config.as_deref())?;
            let registry = build_registry(&settings)?;
            for summary in registry.list_networks() {
                println!("{}\t{}\t{}", summary.id, summary.kind, summary.name);
            }
        }
    }

    Ok(())
}
