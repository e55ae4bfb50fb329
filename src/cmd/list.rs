//! `list`: show the DS9 clients attached to the SAMP hub.

use anyhow::{Result, bail};

use crate::cmd::shared::{interruptible, runtime};
use crate::samp;

/// Entry point for the list subcommand.
pub fn execute_list() -> Result<()> {
    runtime()?.block_on(run_list())
}

async fn run_list() -> Result<()> {
    let clients = interruptible(samp::list_clients()).await?;
    println!("{}", describe_clients(&clients)?);
    Ok(())
}

/// Pluralized one-line summary, preserving hub order. Zero clients is a
/// failure, not an empty listing.
fn describe_clients(clients: &[String]) -> Result<String> {
    match clients {
        [] => bail!("There are no DS9 clients connected to the SAMP hub."),
        [only] => Ok(format!("There is one DS9 client: {only}")),
        many => Ok(format!(
            "There are {} DS9 clients: {}",
            many.len(),
            many.join(" ")
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clients(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn no_clients_is_an_error() {
        let err = describe_clients(&[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "There are no DS9 clients connected to the SAMP hub."
        );
    }

    #[test]
    fn one_client_is_singular() {
        assert_eq!(
            describe_clients(&clients(&["c1"])).unwrap(),
            "There is one DS9 client: c1"
        );
    }

    #[test]
    fn several_clients_keep_hub_order() {
        assert_eq!(
            describe_clients(&clients(&["c1", "c56"])).unwrap(),
            "There are 2 DS9 clients: c1 c56"
        );
    }
}
