pub mod api;
pub mod bot;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod updater;
pub mod validation;

pub use error::{Error, Result};
