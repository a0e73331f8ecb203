//! Common components and data for the enterprise certificate proxy crates.

pub mod config;
pub mod logging;
