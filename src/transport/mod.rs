//! Transport module - the synchronous call mechanism between proxy and
//! dispatcher.
//!
//! Provides:
//! - [`Transport`] - one blocking request/reply exchange per call
//! - [`LocalTransport`] - in-process, calls the dispatcher directly
//! - [`ChannelTransport`] - hands transactions to a tokio serve task
//!
//! Each transport allows a single outstanding call. A second caller waits
//! until the first one has its reply.

mod channel;
mod local;

use std::sync::Arc;

use crate::error::Result;
use crate::protocol::Parcel;

pub use channel::{spawn_dispatcher_task, ChannelConfig, ChannelTransport, DEFAULT_CHANNEL_CAPACITY};
pub use local::LocalTransport;

/// Delivers one transaction and waits for its reply.
///
/// Errors are transaction failures: the peer is gone, or it refused the
/// transaction before running the call (unknown code, token mismatch,
/// undecodable arguments). Call results travel inside the reply.
pub trait Transport: Send + Sync {
    /// Send `data` under `code`. One-way calls (`FLAG_ONEWAY`) return an
    /// empty reply without waiting.
    fn transact(&self, code: u32, data: Parcel, flags: u32) -> Result<Parcel>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn transact(&self, code: u32, data: Parcel, flags: u32) -> Result<Parcel> {
        (**self).transact(code, data, flags)
    }
}
