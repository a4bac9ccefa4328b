//! grid-e2e: operator CLI for persisted GRiD session artifacts.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;
pub mod styles;
