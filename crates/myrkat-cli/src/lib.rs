//! Myrkat CLI library
//!
//! Argument definitions, logging set-up and the command implementations
//! behind the `myrkat` binary. Every storage command talks to the store
//! through a [`myrkat_core::StorageClient`], so requests take the same bus
//! path as the shell's own components.

pub mod cli;
pub mod commands;
pub mod logging;
