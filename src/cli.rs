// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "otto")]
#[command(about = "Staged, atomic, rollback-able web site releases over SSH")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print final results
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Emit machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter otto.yml configuration file
    Init {
        /// Site name to preset in the template
        #[arg(long)]
        site: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Upload a new version and leave it staged
    Stage {
        /// Revision to stage (git backend); defaults to the configured branch
        revision: Option<String>,

        /// Break an existing release lock
        #[arg(long)]
        force: bool,
    },

    /// Make the staged version live
    Deploy {
        /// Break an existing release lock
        #[arg(long)]
        force: bool,
    },

    /// Undo the last deploy, restoring the previous version
    Rollback {
        /// Explicit version to restore instead of `previous`
        #[arg(long = "to", value_name = "VERSION")]
        target: Option<String>,

        /// Break an existing release lock
        #[arg(long)]
        force: bool,
    },

    /// Remove old versions not referenced by any pointer
    Cleanup {
        /// How many recent versions to keep (default from otto.yml)
        #[arg(long)]
        retain: Option<usize>,

        /// Break an existing release lock
        #[arg(long)]
        force: bool,
    },

    /// Show pointers and version history for each server
    List,
}
