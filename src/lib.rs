//! Azure UpdateSnap library
//!
//! Fetches Azure update announcements, keeps them in a read-through TTL
//! cache and exposes them to the CLI and the HTTP server.

pub mod cache;
pub mod cli;
pub mod clock;
pub mod config;
pub mod data;
pub mod server;
pub mod service;
pub mod view;

#[cfg(test)]
mod test_support;

pub use data::{UpdateId, UpdateRecord};
pub use service::{LookupError, UpdateService};
