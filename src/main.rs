mod cli;
mod cmd;
mod completions;
mod config;
mod credentials;
mod diff;
mod doctor;
mod error;
mod exit_codes;
mod format;
mod mount_table;
mod mounter;
mod platform;
mod probe;
mod progress;
mod signals;
mod status;
mod sync;

use clap::Parser;

fn main() {
    let cli = cli::Cli::parse();
    let code = match cli.command {
        cli::Commands::Sync {
            config,
            passwd_file,
            dry_run,
            mounted,
        } => sync::run_sync(config, passwd_file, mounted, dry_run),
        cli::Commands::Status { config } => status::run_status(config),
        cli::Commands::Doctor { config } => doctor::run_doctor(config),
        cli::Commands::Completions { shell } => completions::run_completions(shell),
    };
    std::process::exit(code);
}
