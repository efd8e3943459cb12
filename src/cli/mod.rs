//! Command-line interface
//!
//! Argument parsing for running a node and for the offline key and
//! transaction helpers.

pub mod commands;

pub use commands::{node_settings, Command, Opt};
