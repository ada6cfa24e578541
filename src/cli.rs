use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "mntx",
    version,
    about = "Declarative FUSE mount reconciler for storage sidecar containers",
    long_about = "mntx keeps a set of remote data sources mounted under a shared target\n\
                  root, driven by a declarative config document.\n\n\
                  Each `mntx sync` invocation is one complete, idempotent reconciliation\n\
                  pass: sources in the config but not active are mounted, active sources\n\
                  no longer in the config are unmounted. An external scheduler triggers\n\
                  passes; mntx holds no state between them."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one reconciliation pass: mount missing sources, unmount removed ones
    Sync {
        /// Path to the desired-state config document (default: /etc/mntx/config.json)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Path to the credential store file (default: /etc/passwd-mntx)
        #[arg(long, value_name = "PATH")]
        passwd_file: Option<PathBuf>,

        /// Print the plan and commands without mounting or unmounting
        #[arg(long)]
        dry_run: bool,

        /// Currently-mounted absolute paths supplied by the caller;
        /// the live mount table is probed when none are given
        #[arg(value_name = "MOUNTED_PATH")]
        mounted: Vec<PathBuf>,
    },

    /// Show desired vs. active mounts without changing anything
    Status {
        /// Path to the desired-state config document (default: /etc/mntx/config.json)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Validate prerequisites (config, FUSE drivers, unmount tool, target root)
    Doctor {
        /// Path to the desired-state config document (default: /etc/mntx/config.json)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Generate shell completion script (bash, zsh, fish, powershell, elvish)
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}
