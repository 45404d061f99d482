//! Handle module - opaque objects that cross the channel.
//!
//! - [`GraphicBuffer`] - buffer memory bound to a slot
//! - [`Fence`] - synchronization point attached to a transfer
//! - [`Descriptor`] - side-channel token backing both
//!
//! All three are owned values. Handing one to a call moves it.

mod descriptor;
mod fence;
mod graphic_buffer;

pub use descriptor::Descriptor;
pub use fence::{Fence, FENCE_FLATTENED_SIZE};
pub use graphic_buffer::{
    format, usage, GraphicBuffer, GRAPHIC_BUFFER_FLATTENED_SIZE, GRAPHIC_BUFFER_MAGIC,
};
