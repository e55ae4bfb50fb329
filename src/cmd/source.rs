//! Command-source resolution for `set`: literal text, `@file`, or `@-`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;

use crate::cmd::shared::trace;

/// Where the `set` commands come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSource {
    Literal(String),
    File(PathBuf),
    Stdin,
}

impl CommandSource {
    /// Fixed prefix rule: `@-` is stdin, `@path` is a file, anything else
    /// is the command text itself.
    pub fn resolve(raw: &str) -> CommandSource {
        if raw == "@-" {
            CommandSource::Stdin
        } else if let Some(path) = raw.strip_prefix('@') {
            CommandSource::File(PathBuf::from(path))
        } else {
            CommandSource::Literal(raw.to_string())
        }
    }

    /// Materialize the ordered command batch. File and stdin input split on
    /// real newlines. Literal text splits on the two-character `\n` escape,
    /// since the shell layer delivers embedded newlines in escaped form;
    /// `@file` content never has escape sequences reinterpreted. Blank
    /// entries are kept; the batch loop skips them.
    pub async fn read(self, debug: bool) -> Result<Vec<String>> {
        match self {
            CommandSource::Literal(text) => Ok(split_escaped(&text)),
            CommandSource::File(path) => {
                if debug {
                    trace(format!("Reading commands from {}", path.display()));
                }
                let text = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("unable to read commands from {}", path.display()))?;
                Ok(split_lines(&text))
            }
            CommandSource::Stdin => {
                if debug {
                    trace("Reading commands from stdin");
                }
                let mut text = String::new();
                tokio::io::stdin()
                    .read_to_string(&mut text)
                    .await
                    .context("unable to read commands from stdin")?;
                Ok(split_lines(&text))
            }
        }
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.split('\n').map(str::to_string).collect()
}

fn split_escaped(text: &str) -> Vec<String> {
    text.split("\\n").map(str::to_string).collect()
}
