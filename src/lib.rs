//! # surfacewire
//!
//! Request/reply protocol for exchanging graphics buffers between a
//! producer and a consumer-side buffer queue.
//!
//! The producer holds a [`SurfaceTextureProxy`]; the consumer serves a
//! [`SurfaceTexture`] implementation (usually a [`BufferQueue`]) through a
//! [`Dispatcher`]. Every call is one synchronous transaction.
//!
//! ## Architecture
//!
//! - **Wire** ([`protocol`]): parcels of aligned little-endian fields plus a
//!   descriptor side channel, prefixed with an interface token
//! - **Control plane** ([`control`]): a reserved describe transaction answers
//!   with a JSON schema used to negotiate the extended opcode set
//! - **Transports** ([`transport`]): in-process, or a tokio serve task
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use surfacewire::handle::{format, usage};
//! use surfacewire::handler::Dispatcher;
//! use surfacewire::transport::LocalTransport;
//! use surfacewire::{
//!     Api, BufferQueue, Fence, QueueBufferInput, Rect, ScalingMode, SurfaceTexture,
//!     SurfaceTextureProxy, Transform,
//! };
//!
//! let queue = Arc::new(BufferQueue::builder().default_size(256, 256).build());
//! let proxy = SurfaceTextureProxy::new(LocalTransport::new(Arc::new(Dispatcher::new(queue))));
//!
//! proxy.connect(Api::Egl).unwrap();
//! let out = proxy.dequeue_buffer(256, 256, format::RGBA_8888, usage::HW_RENDER).unwrap();
//! let buffer = proxy.request_buffer(out.slot).unwrap().unwrap();
//! assert_eq!(buffer.width, 256);
//!
//! let input = QueueBufferInput::new(
//!     1000,
//!     Rect::from_size(256, 256),
//!     ScalingMode::Freeze,
//!     Transform::IDENTITY,
//!     Fence::no_fence(),
//! );
//! proxy.queue_buffer(out.slot, input).unwrap();
//! proxy.disconnect(Api::Egl).unwrap();
//! ```

pub mod codec;
pub mod control;
pub mod error;
pub mod handle;
pub mod handler;
pub mod protocol;
pub mod queue;
pub mod transport;

mod proxy;
mod status;
mod surface;
mod types;

pub use codec::{QueueBufferInput, QueueBufferOutput};
pub use error::{Result, SurfaceError};
pub use handle::{Descriptor, Fence, GraphicBuffer};
pub use handler::Dispatcher;
pub use protocol::{Capabilities, Opcode, Parcel};
pub use proxy::SurfaceTextureProxy;
pub use queue::{BufferQueue, BufferQueueBuilder, QueueConfig};
pub use status::Status;
pub use surface::SurfaceTexture;
pub use types::{Api, DequeueFlags, DequeueOutput, QueryKey, Rect, ScalingMode, Transform};
