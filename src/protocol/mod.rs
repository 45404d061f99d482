//! Protocol module - parcel container, flatten contract, opcode table.
//!
//! This module implements the wire layer shared by both roles:
//! - [`Parcel`] for positional call and reply fields
//! - [`Flattenable`] for objects with a descriptor side channel
//! - [`Opcode`] and [`Capabilities`] for the numbering space

pub mod flatten;
mod opcode;
mod parcel;

pub use flatten::Flattenable;
pub use opcode::{
    Capabilities, Opcode, DESCRIBE_TRANSACTION, FIRST_CALL_TRANSACTION, FLAG_ONEWAY,
    INTERFACE_DESCRIPTOR, LAST_CALL_TRANSACTION,
};
pub use parcel::{pad_size, Parcel, PARCEL_ALIGNMENT, STRICT_MODE_HEADER};
