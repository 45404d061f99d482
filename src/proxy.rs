//! Producer-side proxy.
//!
//! [`SurfaceTextureProxy`] implements [`SurfaceTexture`] by turning each
//! call into exactly one transaction:
//!
//! ```text
//! write token ─► write args ─► Transport::transact ─► read reply ─► check status
//! ```
//!
//! The proxy holds no state besides its transport and the capability set
//! it was created with.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use surfacewire::handler::Dispatcher;
//! use surfacewire::queue::BufferQueue;
//! use surfacewire::transport::LocalTransport;
//! use surfacewire::{Api, Capabilities, SurfaceTexture, SurfaceTextureProxy};
//!
//! let queue = Arc::new(
//!     BufferQueue::builder()
//!         .name("demo")
//!         .capabilities(Capabilities::EXTENDED)
//!         .build(),
//! );
//! let dispatcher = Arc::new(Dispatcher::with_capabilities(queue.clone(), queue.capabilities()));
//! let proxy =
//!     SurfaceTextureProxy::negotiate(LocalTransport::new(dispatcher), Capabilities::EXTENDED)
//!         .unwrap();
//!
//! proxy.connect(Api::Cpu).unwrap();
//! assert_eq!(proxy.get_id().unwrap(), "demo");
//! ```

use tracing::debug;

use crate::codec::{QueueBufferInput, QueueBufferOutput, QUEUE_OUTPUT_SIZE};
use crate::control::InterfaceSchema;
use crate::error::{check_status, Result, SurfaceError};
use crate::handle::{Fence, GraphicBuffer};
use crate::protocol::{
    Capabilities, Opcode, Parcel, DESCRIBE_TRANSACTION, FLAG_ONEWAY, INTERFACE_DESCRIPTOR,
};
use crate::status::Status;
use crate::surface::SurfaceTexture;
use crate::transport::Transport;
use crate::types::{Api, DequeueFlags, DequeueOutput, QueryKey};

/// Remote [`SurfaceTexture`] reached through a [`Transport`].
pub struct SurfaceTextureProxy<T> {
    transport: T,
    capabilities: Capabilities,
}

impl<T: Transport> SurfaceTextureProxy<T> {
    /// Proxy limited to the base opcode set.
    pub fn new(transport: T) -> Self {
        Self::with_capabilities(transport, Capabilities::BASE)
    }

    /// Proxy that assumes the peer serves `capabilities`.
    pub fn with_capabilities(transport: T, capabilities: Capabilities) -> Self {
        Self {
            transport,
            capabilities,
        }
    }

    /// Ask the peer for its schema and keep the capabilities both sides
    /// support.
    ///
    /// Fails with `BadInterface` if the peer serves another interface or an
    /// incompatible version.
    pub fn negotiate(transport: T, local: Capabilities) -> Result<Self> {
        let mut reply = transport.transact(DESCRIBE_TRANSACTION, Parcel::new(), 0)?;
        let schema = InterfaceSchema::from_json(&reply.read_string()?)?;

        if !schema.is_compatible() {
            return Err(SurfaceError::BadInterface {
                expected: INTERFACE_DESCRIPTOR.to_string(),
                actual: format!("{} {}", schema.descriptor, schema.version),
            });
        }

        let capabilities = local.intersect(schema.capabilities);
        debug!(
            "Negotiated {} {} (extended={})",
            schema.descriptor, schema.version, capabilities.extended
        );
        Ok(Self::with_capabilities(transport, capabilities))
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Request parcel with the interface token already written.
    fn request(&self) -> Parcel {
        let mut data = Parcel::new();
        data.write_interface_token(INTERFACE_DESCRIPTOR);
        data
    }

    fn call(&self, op: Opcode, data: Parcel) -> Result<Parcel> {
        if op.is_extended() && !self.capabilities.extended {
            return Err(SurfaceError::Unsupported(op.name()));
        }
        self.transport.transact(op.code(), data, 0)
    }

    fn read_status(reply: &mut Parcel) -> Result<()> {
        check_status(Status(reply.read_i32()?)).map(|_| ())
    }

    fn read_output(reply: &mut Parcel) -> Result<QueueBufferOutput> {
        let output = QueueBufferOutput::decode(&reply.read_fixed(QUEUE_OUTPUT_SIZE)?)?;
        Self::read_status(reply)?;
        Ok(output)
    }

    /// Query with a raw key, for keys this crate does not name.
    pub fn query_raw(&self, what: i32) -> Result<i32> {
        let mut data = self.request();
        data.write_i32(what);
        let mut reply = self.call(Opcode::Query, data)?;
        let value = reply.read_i32()?;
        Self::read_status(&mut reply)?;
        Ok(value)
    }
}

impl<T: Transport> SurfaceTexture for SurfaceTextureProxy<T> {
    fn request_buffer(&self, slot: i32) -> Result<Option<GraphicBuffer>> {
        let mut data = self.request();
        data.write_i32(slot);
        let mut reply = self.call(Opcode::RequestBuffer, data)?;

        let buffer = if reply.read_bool()? {
            Some(reply.read_flattenable::<GraphicBuffer>()?)
        } else {
            None
        };
        Self::read_status(&mut reply)?;
        Ok(buffer)
    }

    fn set_buffer_count(&self, count: i32) -> Result<()> {
        let mut data = self.request();
        data.write_i32(count);
        let mut reply = self.call(Opcode::SetBufferCount, data)?;
        Self::read_status(&mut reply)
    }

    fn dequeue_buffer(
        &self,
        width: u32,
        height: u32,
        format: u32,
        usage: u32,
    ) -> Result<DequeueOutput> {
        let mut data = self.request();
        data.write_u32(width);
        data.write_u32(height);
        data.write_u32(format);
        data.write_u32(usage);
        let mut reply = self.call(Opcode::DequeueBuffer, data)?;

        let slot = reply.read_i32()?;
        let fence = if reply.read_bool()? {
            reply.read_flattenable::<Fence>()?
        } else {
            Fence::no_fence()
        };
        let flags = check_status(Status(reply.read_i32()?))?;

        Ok(DequeueOutput {
            slot,
            fence,
            flags: DequeueFlags(flags as u32),
        })
    }

    fn queue_buffer(&self, slot: i32, input: QueueBufferInput) -> Result<QueueBufferOutput> {
        let mut data = self.request();
        data.write_i32(slot);
        data.write_flattenable(&input)?;
        let mut reply = self.call(Opcode::QueueBuffer, data)?;
        Self::read_output(&mut reply)
    }

    fn cancel_buffer(&self, slot: i32, fence: Fence) -> Result<()> {
        let mut data = self.request();
        data.write_i32(slot);
        data.write_bool(fence.is_valid());
        if fence.is_valid() {
            data.write_flattenable(&fence)?;
        }
        self.transport
            .transact(Opcode::CancelBuffer.code(), data, FLAG_ONEWAY)?;
        Ok(())
    }

    fn query(&self, what: QueryKey) -> Result<i32> {
        self.query_raw(what.raw())
    }

    fn set_synchronous_mode(&self, enabled: bool) -> Result<()> {
        let mut data = self.request();
        data.write_bool(enabled);
        let mut reply = self.call(Opcode::SetSynchronousMode, data)?;
        Self::read_status(&mut reply)
    }

    fn connect(&self, api: Api) -> Result<QueueBufferOutput> {
        let mut data = self.request();
        data.write_i32(api.raw());
        let mut reply = self.call(Opcode::Connect, data)?;
        Self::read_output(&mut reply)
    }

    fn disconnect(&self, api: Api) -> Result<()> {
        let mut data = self.request();
        data.write_i32(api.raw());
        let mut reply = self.call(Opcode::Disconnect, data)?;
        Self::read_status(&mut reply)
    }

    fn update_and_get_current(&self) -> Result<Option<(i32, GraphicBuffer)>> {
        let data = self.request();
        let mut reply = self.call(Opcode::UpdateAndGetCurrent, data)?;

        let current = if reply.read_bool()? {
            let buffer = reply.read_flattenable::<GraphicBuffer>()?;
            let slot = reply.read_i32()?;
            Some((slot, buffer))
        } else {
            None
        };
        Self::read_status(&mut reply)?;
        Ok(current)
    }

    fn add_buffer_slot(&self, buffer: GraphicBuffer) -> Result<i32> {
        let mut data = self.request();
        data.write_flattenable(&buffer)?;
        let mut reply = self.call(Opcode::AddBufferSlot, data)?;
        check_status(Status(reply.read_i32()?))
    }

    fn get_id(&self) -> Result<String> {
        let data = self.request();
        let mut reply = self.call(Opcode::GetId, data)?;
        reply.read_string()
    }

    fn release_buffer(&self, slot: i32) -> Result<()> {
        let mut data = self.request();
        data.write_i32(slot);
        let mut reply = self.call(Opcode::ReleaseBuffer, data)?;
        Self::read_status(&mut reply)
    }
}
