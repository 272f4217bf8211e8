pub mod commands;

pub use commands::{AccountCommands, Cli, Commands};
