//! Opcode and capability table.
//!
//! Opcodes are stable small integers starting at [`FIRST_CALL_TRANSACTION`].
//! The extended set is appended after the base set and is only decodable
//! when [`Capabilities::extended`] is on.

use serde::{Deserialize, Serialize};

/// First code of the per-channel call numbering space.
pub const FIRST_CALL_TRANSACTION: u32 = 0x0000_0001;

/// Last code usable for calls.
pub const LAST_CALL_TRANSACTION: u32 = 0x00FF_FFFF;

/// Reserved code answered with the interface schema ("_NTF").
pub const DESCRIBE_TRANSACTION: u32 = u32::from_be_bytes(*b"_NTF");

/// Transaction flag: caller does not wait for a reply.
pub const FLAG_ONEWAY: u32 = 0x0000_0001;

/// Protocol-identity token written at the start of every call.
pub const INTERFACE_DESCRIPTOR: &str = "surfacewire.SurfaceTexture";

/// Capability set negotiated between proxy and dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Enables the extended opcode set.
    #[serde(default)]
    pub extended: bool,
}

impl Capabilities {
    /// Base opcode set only.
    pub const BASE: Capabilities = Capabilities { extended: false };

    /// Base and extended opcode sets.
    pub const EXTENDED: Capabilities = Capabilities { extended: true };

    /// Capabilities both sides support.
    pub fn intersect(self, other: Capabilities) -> Capabilities {
        Capabilities {
            extended: self.extended && other.extended,
        }
    }
}

/// Operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Opcode {
    RequestBuffer = FIRST_CALL_TRANSACTION,
    SetBufferCount,
    DequeueBuffer,
    QueueBuffer,
    CancelBuffer,
    Query,
    SetSynchronousMode,
    Connect,
    Disconnect,
    UpdateAndGetCurrent,
    AddBufferSlot,
    GetId,
    ReleaseBuffer,
}

impl Opcode {
    /// Base opcodes in numbering order.
    pub const BASE: [Opcode; 9] = [
        Opcode::RequestBuffer,
        Opcode::SetBufferCount,
        Opcode::DequeueBuffer,
        Opcode::QueueBuffer,
        Opcode::CancelBuffer,
        Opcode::Query,
        Opcode::SetSynchronousMode,
        Opcode::Connect,
        Opcode::Disconnect,
    ];

    /// Extended opcodes in numbering order.
    pub const EXTENDED: [Opcode; 4] = [
        Opcode::UpdateAndGetCurrent,
        Opcode::AddBufferSlot,
        Opcode::GetId,
        Opcode::ReleaseBuffer,
    ];

    /// Wire code.
    #[inline]
    pub fn code(self) -> u32 {
        self as u32
    }

    /// True for the capability-gated opcodes.
    #[inline]
    pub fn is_extended(self) -> bool {
        self.code() > Opcode::Disconnect.code()
    }

    /// Method name used in the interface schema.
    pub fn name(self) -> &'static str {
        match self {
            Opcode::RequestBuffer => "requestBuffer",
            Opcode::SetBufferCount => "setBufferCount",
            Opcode::DequeueBuffer => "dequeueBuffer",
            Opcode::QueueBuffer => "queueBuffer",
            Opcode::CancelBuffer => "cancelBuffer",
            Opcode::Query => "query",
            Opcode::SetSynchronousMode => "setSynchronousMode",
            Opcode::Connect => "connect",
            Opcode::Disconnect => "disconnect",
            Opcode::UpdateAndGetCurrent => "updateAndGetCurrent",
            Opcode::AddBufferSlot => "addBufferSlot",
            Opcode::GetId => "getId",
            Opcode::ReleaseBuffer => "releaseBuffer",
        }
    }

    /// Decode a wire code under the given capabilities.
    ///
    /// Extended codes decode to `None` when the capability is off.
    pub fn from_code(code: u32, capabilities: Capabilities) -> Option<Opcode> {
        Opcode::table(capabilities).find(|op| op.code() == code)
    }

    /// All opcodes available under the given capabilities, in code order.
    pub fn table(capabilities: Capabilities) -> impl Iterator<Item = Opcode> {
        let base: &'static [Opcode] = &Opcode::BASE;
        let extended: &'static [Opcode] = if capabilities.extended {
            &Opcode::EXTENDED
        } else {
            &[]
        };
        base.iter().chain(extended.iter()).copied()
    }
}
