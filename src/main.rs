//! ds9samp - command-line control of DS9 via a SAMP hub.
//!
//! Command layout:
//!   ds9samp get  [options] <command>   send one command, print the reply
//!   ds9samp set  [options] <command>   send one or more commands
//!   ds9samp list                       show the attached DS9 clients
//!
//! Shared flags for get/set:
//!   -n / --name     Target DS9 client when several are registered
//!   -t / --timeout  Seconds to wait per command (0 disables the timeout)
//!   --debug         Trace each step as a `# ...` line on stdout
//!
//! The set command argument may be `@file` (one command per line) or `@-`
//! (read commands from stdin).
//!
//! Failures are reported as a single `# ds9samp_<cmd>: ERROR ...` line on
//! stderr (bold red on a terminal, suppressed by NO_COLOR) and exit code 1.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod cmd;
mod samp;

use cmd::{GetArgs, SetArgs};

#[derive(Parser, Debug)]
#[command(
    name = "ds9samp",
    version,
    author,
    about = "Control the DS9 image viewer over a SAMP hub",
    propagate_version = true,
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a single command to DS9 via SAMP and print out any response
    Get(GetArgs),

    /// Send one or more commands to DS9 via SAMP
    Set(SetArgs),

    /// Display the names of the DS9 clients attached to the SAMP hub
    #[command(after_help = "Examples:

    % ds9samp list
    There is one DS9 client: c1
    % ds9samp list
    There are 2 DS9 clients: c1 c56
")]
    List,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Internal diagnostics only; user-facing tracing is the --debug flag.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Get(args) => cmd::shared::guard("get", || cmd::execute_get(args)),
        Commands::Set(args) => cmd::shared::guard("set", || cmd::execute_set(args)),
        Commands::List => cmd::shared::guard("list", cmd::execute_list),
    }
}
