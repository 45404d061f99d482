//! Consumer-side dispatcher.
//!
//! Turns one incoming parcel into one call on a [`SurfaceTexture`]
//! implementation and encodes the reply:
//!
//! ```text
//! decode opcode ─► enforce token ─► decode args ─► call impl ─► encode reply
//! ```
//!
//! The dispatcher holds no slot state. Every field is positional and read
//! in the exact order the proxy writes it.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::codec::QueueBufferInput;
use crate::control::InterfaceSchema;
use crate::error::{Result, SurfaceError};
use crate::handle::{Fence, GraphicBuffer};
use crate::protocol::{
    Capabilities, Opcode, Parcel, DESCRIBE_TRANSACTION, FLAG_ONEWAY, INTERFACE_DESCRIPTOR,
};
use crate::status::Status;
use crate::surface::SurfaceTexture;
use crate::types::{Api, QueryKey};

/// Slot index written when a call produced none.
pub const INVALID_SLOT: i32 = -1;

/// Split an implementation result into its value and the wire status.
fn settle<T>(result: Result<T>) -> (Option<T>, Status) {
    match result {
        Ok(value) => (Some(value), Status::OK),
        Err(e) => (None, e.status()),
    }
}

/// Dispatches transactions to a [`SurfaceTexture`] implementation.
pub struct Dispatcher<S: ?Sized> {
    inner: Arc<S>,
    capabilities: Capabilities,
}

impl<S: SurfaceTexture + ?Sized> Dispatcher<S> {
    /// Dispatcher serving the base opcode set.
    pub fn new(inner: Arc<S>) -> Self {
        Self::with_capabilities(inner, Capabilities::BASE)
    }

    /// Dispatcher serving the opcode set enabled by `capabilities`.
    pub fn with_capabilities(inner: Arc<S>, capabilities: Capabilities) -> Self {
        Self {
            inner,
            capabilities,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// The implementation calls are forwarded to.
    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    /// Schema answered on the describe transaction.
    pub fn schema(&self) -> InterfaceSchema {
        InterfaceSchema::new(self.capabilities)
    }

    /// Handle one transaction and build its reply.
    ///
    /// Errors mean the transaction itself failed (unknown code, token
    /// mismatch, undecodable arguments). Implementation failures are not
    /// errors here; they travel as the status field of the reply.
    pub fn on_transact(&self, code: u32, data: &mut Parcel, flags: u32) -> Result<Parcel> {
        if code == DESCRIBE_TRANSACTION {
            let mut reply = Parcel::new();
            reply.write_string(&self.schema().to_json()?);
            return Ok(reply);
        }

        let op = match Opcode::from_code(code, self.capabilities) {
            Some(op) => op,
            None => {
                warn!("Unknown transaction code {}", code);
                return Err(SurfaceError::UnknownTransaction(code));
            }
        };

        if let Err(e) = data.enforce_interface(INTERFACE_DESCRIPTOR) {
            warn!("Rejected {} call: {}", op.name(), e);
            return Err(e);
        }

        debug!(
            "Dispatching {} ({} bytes, {} descriptors, oneway={})",
            op.name(),
            data.data_size(),
            data.descriptors().len(),
            flags & FLAG_ONEWAY != 0
        );

        let mut reply = Parcel::new();
        match op {
            Opcode::RequestBuffer => {
                let slot = data.read_i32()?;
                let (buffer, status) = settle(self.inner.request_buffer(slot));
                write_optional_buffer(&mut reply, buffer.flatten().as_ref())?;
                reply.write_i32(status.code());
            }

            Opcode::SetBufferCount => {
                let count = data.read_i32()?;
                let (_, status) = settle(self.inner.set_buffer_count(count));
                reply.write_i32(status.code());
            }

            Opcode::DequeueBuffer => {
                let width = data.read_u32()?;
                let height = data.read_u32()?;
                let format = data.read_u32()?;
                let usage = data.read_u32()?;
                match self.inner.dequeue_buffer(width, height, format, usage) {
                    Ok(out) => {
                        reply.write_i32(out.slot);
                        write_optional_fence(&mut reply, &out.fence)?;
                        reply.write_i32(out.flags.bits() as i32);
                    }
                    Err(e) => {
                        reply.write_i32(INVALID_SLOT);
                        reply.write_bool(false);
                        reply.write_i32(e.status().code());
                    }
                }
            }

            Opcode::QueueBuffer => {
                let slot = data.read_i32()?;
                let input: QueueBufferInput = data.read_flattenable()?;
                let (output, status) = settle(self.inner.queue_buffer(slot, input));
                reply.write_fixed(&output.unwrap_or_default().encode());
                reply.write_i32(status.code());
            }

            Opcode::CancelBuffer => {
                let slot = data.read_i32()?;
                let fence = match read_optional_fence(data) {
                    Ok(fence) => fence,
                    Err(e) => {
                        warn!("cancelBuffer({}) dropped: {}", slot, e);
                        return Err(e);
                    }
                };
                if let Err(e) = self.inner.cancel_buffer(slot, fence) {
                    warn!("cancelBuffer({}) rejected: {}", slot, e);
                }
            }

            Opcode::Query => {
                let raw = data.read_i32()?;
                let (value, status) = match QueryKey::from_raw(raw) {
                    Some(key) => settle(self.inner.query(key)),
                    None => (None, Status::BAD_VALUE),
                };
                reply.write_i32(value.unwrap_or(0));
                reply.write_i32(status.code());
            }

            Opcode::SetSynchronousMode => {
                let enabled = data.read_bool()?;
                let (_, status) = settle(self.inner.set_synchronous_mode(enabled));
                reply.write_i32(status.code());
            }

            Opcode::Connect => {
                let raw = data.read_i32()?;
                let (output, status) = match Api::from_raw(raw) {
                    Some(api) => settle(self.inner.connect(api)),
                    None => (None, Status::BAD_VALUE),
                };
                reply.write_fixed(&output.unwrap_or_default().encode());
                reply.write_i32(status.code());
            }

            Opcode::Disconnect => {
                let raw = data.read_i32()?;
                let status = match Api::from_raw(raw) {
                    Some(api) => settle(self.inner.disconnect(api)).1,
                    None => Status::BAD_VALUE,
                };
                reply.write_i32(status.code());
            }

            Opcode::UpdateAndGetCurrent => {
                let (current, status) = settle(self.inner.update_and_get_current());
                match current.flatten() {
                    Some((slot, buffer)) => {
                        reply.write_bool(true);
                        reply.write_flattenable(&buffer)?;
                        reply.write_i32(slot);
                    }
                    None => reply.write_bool(false),
                }
                reply.write_i32(status.code());
            }

            Opcode::AddBufferSlot => {
                let buffer: GraphicBuffer = data.read_flattenable()?;
                let slot = match self.inner.add_buffer_slot(buffer) {
                    Ok(slot) => slot,
                    Err(e) => e.status().code(),
                };
                reply.write_i32(slot);
            }

            Opcode::GetId => {
                let id = self.inner.get_id().unwrap_or_else(|e| {
                    warn!("getId failed: {}", e);
                    String::new()
                });
                reply.write_string(&id);
            }

            Opcode::ReleaseBuffer => {
                let slot = data.read_i32()?;
                let (_, status) = settle(self.inner.release_buffer(slot));
                reply.write_i32(status.code());
            }
        }

        Ok(reply)
    }
}

fn write_optional_buffer(reply: &mut Parcel, buffer: Option<&GraphicBuffer>) -> Result<()> {
    reply.write_bool(buffer.is_some());
    if let Some(buffer) = buffer {
        reply.write_flattenable(buffer)?;
    }
    Ok(())
}

fn write_optional_fence(reply: &mut Parcel, fence: &Fence) -> Result<()> {
    reply.write_bool(fence.is_valid());
    if fence.is_valid() {
        reply.write_flattenable(fence)?;
    }
    Ok(())
}

/// Read a presence flag and, if set, a fence that must be valid.
fn read_optional_fence(data: &mut Parcel) -> Result<Fence> {
    if !data.read_bool()? {
        return Ok(Fence::no_fence());
    }
    let fence: Fence = data.read_flattenable()?;
    if !fence.is_valid() {
        return Err(SurfaceError::Malformed(
            "fence flagged present but has no wait object".to_string(),
        ));
    }
    Ok(fence)
}
