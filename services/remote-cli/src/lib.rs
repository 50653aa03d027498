//! Command line front-end for the `groove-remote` library.
//!
//! The binary in `bin/` is a thin wrapper: it parses [`cli::Cli`], installs
//! logging and hands over to [`commands::run`].

pub mod cli;
pub mod commands;
