mod browser;
mod config;
mod port_finder;
pub mod server;
mod stack;

pub use browser::*;
pub use config::*;
pub use port_finder::*;
pub use server::*;
pub use stack::*;

#[macro_use]
extern crate log;
