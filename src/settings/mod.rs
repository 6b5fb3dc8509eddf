//! Layered settings: a TOML file, then `STREAKBOARD__*` environment variables.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
