//! Interface schema exchanged on the describe transaction.
//!
//! The dispatcher answers [`DESCRIBE_TRANSACTION`](crate::protocol::DESCRIBE_TRANSACTION)
//! with a single JSON string:
//!
//! ```json
//! {
//!   "descriptor": "surfacewire.SurfaceTexture",
//!   "version": "1.0.0",
//!   "capabilities": { "extended": true },
//!   "methods": { "requestBuffer": 1, "...": 13 }
//! }
//! ```
//!
//! The proxy uses it to check it is talking to this protocol and to learn
//! whether the extended opcodes are served.
//!
//! # Example
//!
//! ```
//! use surfacewire::control::InterfaceSchema;
//! use surfacewire::protocol::Capabilities;
//!
//! let schema = InterfaceSchema::new(Capabilities::EXTENDED);
//! let json = schema.to_json().unwrap();
//! assert!(json.contains("getId"));
//! assert_eq!(InterfaceSchema::from_json(&json).unwrap(), schema);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::{Capabilities, Opcode, INTERFACE_DESCRIPTOR};

/// Protocol version string.
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Description of the interface a dispatcher serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSchema {
    /// Interface token the dispatcher enforces.
    pub descriptor: String,
    /// Protocol version.
    pub version: String,
    /// Capabilities the dispatcher was built with.
    pub capabilities: Capabilities,
    /// Method name to opcode.
    pub methods: BTreeMap<String, u32>,
}

impl InterfaceSchema {
    /// Schema for this crate's interface under the given capabilities.
    pub fn new(capabilities: Capabilities) -> Self {
        let methods = Opcode::table(capabilities)
            .map(|op| (op.name().to_string(), op.code()))
            .collect();

        Self {
            descriptor: INTERFACE_DESCRIPTOR.to_string(),
            version: PROTOCOL_VERSION.to_string(),
            capabilities,
            methods,
        }
    }

    /// Opcode for a method name, if served.
    pub fn method_code(&self, name: &str) -> Option<u32> {
        self.methods.get(name).copied()
    }

    /// True if the schema describes this crate's interface.
    pub fn is_compatible(&self) -> bool {
        self.descriptor == INTERFACE_DESCRIPTOR
            && self.version.split('.').next() == PROTOCOL_VERSION.split('.').next()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
