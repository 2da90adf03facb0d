//! Frontend components
//!
//! Configuration loading and the demonstration CLI.

pub mod cli;
pub mod config;

pub use cli::main as cli_main;
pub use config::{CodecConfig, Config, StoreBackend, StoreConfig};
