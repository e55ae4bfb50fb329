//! Shared helpers for the subcommands: the error boundary, interrupt
//! handling, the runtime bridge and the `--debug` trace channel.

use std::future::Future;
use std::process::ExitCode;

use anyhow::{Context, Result};

use crate::cmd::format::{Style, decorate};

/// Marker error for a user-initiated interrupt (ctrl-c).
#[derive(Debug, thiserror::Error)]
#[error("Keyboard interrupt (control c)")]
pub struct Interrupted;

/// Print a `--debug` trace line.
pub fn trace(msg: impl AsRef<str>) {
    println!("# {}", msg.as_ref());
}

/// Current-thread runtime for the blocking entry points.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")
}

/// Race an operation against ctrl-c, so an interrupt during a blocking
/// read or hub call surfaces as the `Interrupted` error value instead of
/// tearing the process down.
pub async fn interruptible<T, E>(op: impl Future<Output = std::result::Result<T, E>>) -> Result<T>
where
    E: Into<anyhow::Error>,
{
    tokio::select! {
        out = op => out.map_err(Into::into),
        sig = tokio::signal::ctrl_c() => {
            sig.context("failed to wait for the interrupt signal")?;
            Err(Interrupted.into())
        }
    }
}

/// Error boundary: the only place a failure becomes a process exit.
/// Everything below returns `Result` and stays testable.
pub fn guard(name: &str, op: impl FnOnce() -> Result<()>) -> ExitCode {
    match op() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", failure_line(name, &err, &Style::detect()));
            ExitCode::FAILURE
        }
    }
}

/// Render the diagnostic line for a failed entry point.
pub fn failure_line(name: &str, err: &anyhow::Error, style: &Style) -> String {
    let prefix = decorate(&format!("# ds9samp_{name}:"), style);
    if err.is::<Interrupted>() {
        format!("{prefix} Keyboard interrupt (control c)\n")
    } else {
        format!("{prefix} ERROR {err:#}\n")
    }
}
