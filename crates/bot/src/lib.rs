//! Library half of the `pixelbot` binary: CLI definitions, the channel
//! command table, and the status indicator it drives.

pub mod cli;
pub mod commands;
pub mod indicator;
