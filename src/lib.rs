pub mod archive;
pub mod cache;
pub mod cli;
pub mod config;
pub mod model;
pub mod process;
pub mod resolver;
pub mod search;

mod api;

pub use api::{Ksrc, KsrcBuilder};
