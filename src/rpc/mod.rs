//! RPC plumbing
//!
//! This module handles:
//! - The transport seam every outgoing call goes through
//! - The broker client (persistent connection, request/reply correlation)
//! - The inbound server peers use to reach the scene operations

mod client;
mod server;
mod traits;

#[cfg(test)]
pub mod testing;

pub use client::RpcClient;
pub use server::serve;
pub use traits::RpcTransport;
