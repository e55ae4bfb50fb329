//! `get`: send a single command to DS9 and print any response.

use anyhow::Result;
use clap::Args;

use crate::cmd::shared::{interruptible, runtime, trace};
use crate::samp::Session;

/// CLI arguments for `ds9samp get <command>`
#[derive(Args, Debug)]
#[command(after_help = "Examples:

    % ds9samp get scale
    linear
    % ds9samp get 'frame all'
    1 3
    % ds9samp get 'frame frameno'
    3
")]
pub struct GetArgs {
    /// Command to send to DS9
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

/// Entry point for the get subcommand.
pub fn execute_get(args: GetArgs) -> Result<()> {
    runtime()?.block_on(run_get(args))
}

async fn run_get(args: GetArgs) -> Result<()> {
    let session = interruptible(Session::connect(args.client.as_deref())).await?;
    if args.debug {
        trace(format!("Connected: {session}"));
        trace(format!("Command: {}", args.command));
    }

    let outcome = interruptible(session.get(&args.command, args.timeout)).await;
    session.close().await;

    match outcome? {
        Some(reply) => println!("{reply}"),
        None => {
            // An empty reply is a valid no-content outcome, not an error.
            if args.debug {
                trace("Command returned nothing.");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(subcommand)]
        cmd: TestSub,
    }

    #[derive(clap::Subcommand, Debug)]
    enum TestSub {
        Get(GetArgs),
    }

    #[test]
    fn clap_parses_get_defaults() {
        let cli = TestCli::try_parse_from(["t", "get", "scale"]).unwrap();
        let TestSub::Get(args) = cli.cmd;
        assert_eq!(args.command, "scale");
        assert_eq!(args.client, None);
        assert_eq!(args.timeout, 10);
        assert!(!args.debug);
    }

    #[test]
    fn clap_parses_get_options() {
        let cli =
            TestCli::try_parse_from(["t", "get", "-n", "c2", "-t", "0", "--debug", "frame all"])
                .unwrap();
        let TestSub::Get(args) = cli.cmd;
        assert_eq!(args.command, "frame all");
        assert_eq!(args.client.as_deref(), Some("c2"));
        assert_eq!(args.timeout, 0);
        assert!(args.debug);
    }

    #[test]
    fn clap_requires_command() {
        assert!(TestCli::try_parse_from(["t", "get"]).is_err());
    }
}
