//! Implementations of our subcommands.

pub mod cleanup;
pub mod run;
