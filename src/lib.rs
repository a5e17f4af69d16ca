//! Picforge - Picture storage with on-demand thumbnail generation
//!
//! This library crate exposes the picture service, configuration loading and
//! the HTTP surface for the binary and for integration testing.

pub mod config;
pub mod events;
pub mod pictures;
pub mod server;
