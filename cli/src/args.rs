//! Command-line surface.
//!
//! ```text
//! trellis settings                      # workspace settings session
//! trellis settings project -p Core      # project settings session
//! trellis build [--clean]
//! trellis run Core
//! trellis configuration [Release]
//! trellis projects
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "trellis")]
#[command(about = "Edit Beef workspace and project settings through the language server")]
#[command(version)]
pub struct Cli {
    /// Connect to an already running server over TCP instead of spawning one
    #[arg(long, global = true)]
    pub tcp: bool,

    /// TCP port used with --tcp (defaults to the configured port)
    #[arg(long, global = true, requires = "tcp")]
    pub port: Option<u16>,

    /// Workspace root sent to the server (defaults to the current directory)
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the projects of the workspace
    Projects,

    /// Open an interactive settings session
    Settings {
        /// Which settings to edit
        #[arg(value_enum, default_value_t = SettingsScope::Workspace)]
        scope: SettingsScope,

        /// Project to edit (project scope only)
        #[arg(short, long)]
        project: Option<String>,

        /// Pick the project owning this project file (project scope only)
        #[arg(long, conflicts_with = "project")]
        manifest: Option<PathBuf>,
    },

    /// Build the workspace
    Build {
        /// Rebuild everything from scratch
        #[arg(long)]
        clean: bool,
    },

    /// Resolve how a project would be launched
    Run {
        project: String,
    },

    /// Show or change the active build configuration
    Configuration {
        name: Option<String>,
    },

    /// Restart the language server and report its status
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SettingsScope {
    Workspace,
    Project,
}
