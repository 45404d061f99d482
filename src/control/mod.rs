//! Control plane module - interface schema and capability negotiation.
//!
//! The control plane carries JSON only, on the reserved describe
//! transaction. All calls of the operation set travel as parcels.
//!
//! # Workflow
//!
//! 1. Proxy sends the describe transaction (no interface token)
//! 2. Dispatcher answers with its [`InterfaceSchema`]
//! 3. Proxy checks descriptor and version
//! 4. Proxy keeps the intersection of both capability sets

mod schema;

pub use schema::{InterfaceSchema, PROTOCOL_VERSION};
