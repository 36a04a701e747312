pub mod cli;
pub mod config;
pub mod error;
pub mod i18n;
pub mod logging;
pub mod market;
pub mod metrics;
pub mod notify;
pub mod tron;
pub mod utils;
pub mod validation;
pub mod wallet;
pub mod web;

pub use error::{Error, Result};

// Declare tests module only when testing
#[cfg(test)]
pub mod tests;
