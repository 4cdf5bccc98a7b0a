pub mod client;
pub mod config;
pub mod error;
pub mod migrations;
pub mod progress;
pub mod registry;
pub mod settings;
pub mod sync;
pub mod transport;

pub use config::Config;
pub use error::{Error, Result};
