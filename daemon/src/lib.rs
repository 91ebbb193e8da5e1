// Loyalty daemon library
// Exposes the ledger core for the binary and the integration tests

#![allow(clippy::too_many_arguments)]

extern crate log;

pub mod config;
pub mod core;
pub mod logger;
