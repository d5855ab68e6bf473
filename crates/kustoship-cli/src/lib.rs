pub mod cli;
pub mod error;
pub mod init;
pub mod ui;

pub use cli::{exec, Cli, Command};
