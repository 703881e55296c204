//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML file the client is started with,
//! creates it with generated defaults on first run, and turns it into the
//! values the network layer needs.

pub mod config;
