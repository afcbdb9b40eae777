//! IPC module for daemon-client communication

pub mod protocol;
mod server;

pub use server::{Server, ServerContext};
