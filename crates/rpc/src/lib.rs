//! # wallet-permissions-rpc
//!
//! JSON-RPC 2.0 wire types shared by the wallet permissions middleware.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

/// JSON-RPC request bindings
pub mod request;

/// JSON-RPC response bindings
pub mod response;

/// JSON-RPC error bindings
pub mod error;
