//! Handler module - consumer-side transaction dispatch.
//!
//! Provides:
//! - [`Dispatcher`] - decodes a transaction, invokes a [`SurfaceTexture`]
//!   implementation and encodes the reply
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use surfacewire::handler::Dispatcher;
//! use surfacewire::protocol::{Opcode, Parcel, INTERFACE_DESCRIPTOR};
//! use surfacewire::queue::BufferQueue;
//! use surfacewire::QueryKey;
//!
//! let queue = Arc::new(BufferQueue::builder().default_size(320, 240).build());
//! let dispatcher = Dispatcher::new(queue);
//!
//! let mut data = Parcel::new();
//! data.write_interface_token(INTERFACE_DESCRIPTOR);
//! data.write_i32(QueryKey::DefaultWidth.raw());
//! data.rewind();
//!
//! let mut reply = dispatcher.on_transact(Opcode::Query.code(), &mut data, 0).unwrap();
//! reply.rewind();
//! assert_eq!(reply.read_i32().unwrap(), 320);
//! assert_eq!(reply.read_i32().unwrap(), 0);
//! ```
//!
//! [`SurfaceTexture`]: crate::SurfaceTexture

mod dispatcher;

pub use dispatcher::{Dispatcher, INVALID_SLOT};
