// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Command line arguments.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "fluxion-dedup")]
#[command(author, version, about = "Resolve duplicate energy sensors across integrations")]
#[command(
    long_about = "Loads the energy sensor catalog from Home Assistant, groups sensors that \
measure the same physical device, and lets you decide which of them feed the energy \
dashboard. Every command loads the catalog, applies one change and waits until the \
selection has been saved."
)]
pub struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(long, short, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Work on an in-memory copy of the catalog; nothing is written back
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show duplicate groups with scores and the recommended sensor
    Groups,

    /// Keep the best sensor of every device and deactivate the rest
    AutoSelect,

    /// Keep the best of the given sensors and ignore the others
    KeepBest {
        #[arg(required = true, value_name = "ENTITY_ID")]
        entity_ids: Vec<String>,
    },

    /// Hide sensors from grouping and selection
    Ignore {
        #[arg(required = true, value_name = "ENTITY_ID")]
        entity_ids: Vec<String>,
    },

    /// Bring ignored sensors back
    Unignore {
        #[arg(required = true, value_name = "ENTITY_ID")]
        entity_ids: Vec<String>,
    },

    /// Activate every sensor of an integration that does not conflict
    SelectAll { integration: String },

    /// Deactivate every sensor of an integration
    DeselectAll { integration: String },

    /// Activate one sensor
    Activate { entity_id: String },

    /// Deactivate one sensor
    Deactivate { entity_id: String },
}

impl Commands {
    /// Whether the command changes the selection or ignore list.
    pub fn mutates(&self) -> bool {
        !matches!(self, Self::Groups)
    }
}
