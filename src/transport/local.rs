//! In-process transport.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::Transport;
use crate::error::Result;
use crate::handler::Dispatcher;
use crate::protocol::{Parcel, FLAG_ONEWAY};
use crate::surface::SurfaceTexture;

/// Runs each transaction on the caller's thread.
pub struct LocalTransport<S: ?Sized> {
    dispatcher: Arc<Dispatcher<S>>,
    /// Serializes callers.
    gate: Mutex<()>,
}

impl<S: SurfaceTexture + ?Sized> LocalTransport<S> {
    pub fn new(dispatcher: Arc<Dispatcher<S>>) -> Self {
        Self {
            dispatcher,
            gate: Mutex::new(()),
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher<S>> {
        &self.dispatcher
    }
}

impl<S: SurfaceTexture + ?Sized> Transport for LocalTransport<S> {
    fn transact(&self, code: u32, mut data: Parcel, flags: u32) -> Result<Parcel> {
        let _call = self.gate.lock();
        data.rewind();
        let result = self.dispatcher.on_transact(code, &mut data, flags);

        if flags & FLAG_ONEWAY != 0 {
            if let Err(e) = result {
                debug!("One-way transaction {} failed: {}", code, e);
            }
            return Ok(Parcel::new());
        }

        let mut reply = result?;
        reply.rewind();
        Ok(reply)
    }
}
