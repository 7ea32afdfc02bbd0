pub mod breaker;
pub mod checksum;
pub mod config;
pub mod engine;
pub mod error;
pub mod gates;
pub mod governor;
pub mod healer;
pub mod io;
pub mod keywords;
pub mod loader;
pub mod paths;
pub mod registry;
pub mod updater;

pub use error::{IdsError, Result};
