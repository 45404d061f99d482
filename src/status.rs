//! Wire status codes.
//!
//! A status is the signed 32-bit value that closes most replies:
//! - `0` means success
//! - negative values are errno-derived error codes
//! - positive values only appear as dequeue flags (see [`DequeueFlags`](crate::DequeueFlags))

use std::fmt;

/// Signed status value as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub i32);

impl Status {
    pub const OK: Status = Status(0);
    pub const PERMISSION_DENIED: Status = Status(-1);
    pub const NAME_NOT_FOUND: Status = Status(-2);
    pub const WOULD_BLOCK: Status = Status(-11);
    pub const NO_MEMORY: Status = Status(-12);
    pub const BUSY: Status = Status(-16);
    pub const NO_INIT: Status = Status(-19);
    pub const BAD_VALUE: Status = Status(-22);
    pub const DEAD_OBJECT: Status = Status(-32);
    pub const INVALID_OPERATION: Status = Status(-38);
    pub const NOT_ENOUGH_DATA: Status = Status(-61);
    pub const UNKNOWN_TRANSACTION: Status = Status(-74);
    pub const TIMED_OUT: Status = Status(-110);
    pub const BAD_TYPE: Status = Status(i32::MIN + 1);
    pub const FAILED_TRANSACTION: Status = Status(i32::MIN + 2);

    /// Raw wire value.
    #[inline]
    pub fn code(self) -> i32 {
        self.0
    }

    /// True for `OK` and for the non-negative flag values returned by dequeue.
    #[inline]
    pub fn is_ok(self) -> bool {
        self.0 >= 0
    }

    /// Symbolic name, if this is one of the known constants.
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Status::OK => "OK",
            Status::PERMISSION_DENIED => "PERMISSION_DENIED",
            Status::NAME_NOT_FOUND => "NAME_NOT_FOUND",
            Status::WOULD_BLOCK => "WOULD_BLOCK",
            Status::NO_MEMORY => "NO_MEMORY",
            Status::BUSY => "BUSY",
            Status::NO_INIT => "NO_INIT",
            Status::BAD_VALUE => "BAD_VALUE",
            Status::DEAD_OBJECT => "DEAD_OBJECT",
            Status::INVALID_OPERATION => "INVALID_OPERATION",
            Status::NOT_ENOUGH_DATA => "NOT_ENOUGH_DATA",
            Status::UNKNOWN_TRANSACTION => "UNKNOWN_TRANSACTION",
            Status::TIMED_OUT => "TIMED_OUT",
            Status::BAD_TYPE => "BAD_TYPE",
            Status::FAILED_TRANSACTION => "FAILED_TRANSACTION",
            _ => return None,
        };
        Some(name)
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Status(code)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "status {}", self.0),
        }
    }
}
