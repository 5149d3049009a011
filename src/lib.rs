//! annocfg - Anno 1800 object configs as an editable scene graph
//!
//! The mapping itself lives in `annocfg_core`. This crate adds the layered
//! application configuration and the commands of the `annocfg` binary.

pub mod commands;
pub mod config;

pub use config::AppConfig;
