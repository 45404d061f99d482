//! Codec module - transfer records exchanged with `queue_buffer`.
//!
//! - [`QueueBufferInput`] - variable-size record with an optional fence,
//!   encoded through the [`Flattenable`](crate::protocol::Flattenable) contract
//! - [`QueueBufferOutput`] - fixed 16-byte record
//!
//! # Example
//!
//! ```
//! use surfacewire::codec::QueueBufferInput;
//! use surfacewire::protocol::Flattenable;
//! use surfacewire::{Fence, Rect, ScalingMode, Transform};
//!
//! let input = QueueBufferInput::new(
//!     1000,
//!     Rect::from_size(256, 256),
//!     ScalingMode::Freeze,
//!     Transform::IDENTITY,
//!     Fence::no_fence(),
//! );
//! let (bytes, fds) = input.to_flattened().unwrap();
//! assert_eq!(bytes.len(), input.flattened_size());
//! assert_eq!(QueueBufferInput::unflatten(&bytes, &fds).unwrap(), input);
//! ```

mod queue_input;
mod queue_output;

pub use queue_input::{QueueBufferInput, QUEUE_INPUT_FIXED_SIZE};
pub use queue_output::{QueueBufferOutput, QUEUE_OUTPUT_SIZE};
