//! `set`: send one or more commands to DS9.
//!
//! The command argument can be the command text itself (with embedded
//! `\n` escapes separating multiple commands), `@file` for one command
//! per line, or `@-` to read them from stdin.

use anyhow::{Result, bail};
use clap::Args;

use crate::cmd::shared::{interruptible, runtime, trace};
use crate::cmd::source::CommandSource;
use crate::samp::Session;

/// CLI arguments for `ds9samp set <command>`
#[derive(Args, Debug)]
#[command(
    long_about = "Send one or more commands to DS9 via SAMP. If the command begins
with @ then it is assumed to be a text file, with one command per line.

Commands can be read from stdin by specifying @-.

Any command errors will cause screen output but will not stop
running any remaining commands.",
    after_help = "Examples:

    % ds9samp set 'frame frameno 2'
    % ds9samp set @commands
    % ds9samp set 'frame delete all\\nframe new'
"
)]
pub struct SetArgs {
    /// Command to send to DS9 (@file reads commands from a file, @- from stdin)
    pub command: String,

    /// Name of DS9 client in the SAMP hub
    #[arg(short = 'n', long = "name", value_name = "NAME")]
    pub client: Option<String>,

    /// Timeout in seconds (use 0 to disable)
    #[arg(short = 't', long, value_name = "SECONDS", default_value_t = 10)]
    pub timeout: u64,

    /// Provide debugging output
    #[arg(long)]
    pub debug: bool,
}

/// Entry point for the set subcommand.
pub fn execute_set(args: SetArgs) -> Result<()> {
    runtime()?.block_on(run_set(args))
}

async fn run_set(args: SetArgs) -> Result<()> {
    let source = CommandSource::resolve(&args.command);
    let commands = interruptible(source.read(args.debug)).await?;

    let session = interruptible(Session::connect(args.client.as_deref())).await?;
    if args.debug {
        trace(format!("Connected: {session}"));
    }

    let timeout = args.timeout;
    let outcome = interruptible(send_batch(&commands, args.debug, async |command: &str| {
        session.set(command, timeout).await.map_err(anyhow::Error::from)
    }))
    .await;
    session.close().await;
    outcome
}

/// Forward the batch in order, skipping blank entries. A failing command
/// does not stop the remaining ones; the collected failures surface as a
/// single summary error after the loop.
async fn send_batch(
    commands: &[String],
    debug: bool,
    send: impl AsyncFn(&str) -> Result<()>,
) -> Result<()> {
    let mut attempted = 0usize;
    let mut failures: Vec<String> = Vec::new();

    for command in commands {
        if command.trim().is_empty() {
            if debug {
                trace("Skipping blank command");
            }
            continue;
        }
        if debug {
            trace(format!("Command: {command}"));
        }
        attempted += 1;
        if let Err(err) = send(command).await {
            failures.push(format!("'{command}': {err:#}"));
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        bail!(
            "{} of {attempted} commands failed:\n  {}",
            failures.len(),
            failures.join("\n  ")
        )
    }
}
