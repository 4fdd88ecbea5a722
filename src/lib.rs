//! hookgate library
//!
//! Core functionality for the hookgate webhook intake and relay gateway:
//! hook resolution, provider authentication, streaming field indexing,
//! payload encryption, and the watched definition store.

pub mod cli;
pub mod config;
pub mod hooks;
pub mod logging;
pub mod server;
