//! Subcommand implementations.
//!
//! Layout:
//!   get.rs      (GetArgs + execute_get)
//!   set.rs      (SetArgs + execute_set, batch loop)
//!   list.rs     (execute_list)
//!   source.rs   (CommandSource: literal / @file / @- resolution)
//!   shared.rs   (error boundary, interrupt race, runtime, --debug trace)
//!   format.rs   (stderr color policy)
//!
//! Each subcommand module exposes exactly one public `execute_*` function
//! returning `anyhow::Result<()>`; only the error boundary in `shared`
//! turns a failure into a process exit.

pub mod format;
pub mod get;
pub mod list;
pub mod set;
pub mod shared;
pub mod source;

pub use get::{GetArgs, execute_get};
pub use list::execute_list;
pub use set::{SetArgs, execute_set};
