//! Command-line interface components
//!
//! This module contains CLI-specific code for Catalog Forge, including
//! argument parsing and the command handlers.

pub mod args;
pub mod commands;

pub use args::{
    BuildArgs, CatalogArgs, Cli, Commands, GlobalArgs, InitArgs, ServeArgs,
};
pub use commands::{handle_build, handle_catalog, handle_changes, handle_init, handle_serve};
