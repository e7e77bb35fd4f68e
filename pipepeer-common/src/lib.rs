#![cfg_attr(not(feature = "std"), no_std)]

/// Process identifier as exposed by the introspection filesystem.
pub type Pid = u32;

/// File descriptor number within a process.
pub type Fd = u32;

/// Exit statuses shared by the pipe-inspection tool family.
///
/// The numeric values are part of the family contract: scripts wrapping
/// several tools can branch on them without knowing which tool ran.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum ExitStatus {
    /// Success, including "descriptor is not a pipe".
    Ok = 0,
    /// Target process or descriptor not found / not readable.
    Error = 1,
    /// Malformed arguments or flags, or help requested.
    Usage = 2,
    /// Host environment lacks a usable introspection facility.
    Unknown = 3,
}

impl ExitStatus {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn is_success(self) -> bool {
        matches!(self, Self::Ok)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Error => "ERROR",
            Self::Usage => "USAGE",
            Self::Unknown => "UNKNOWN",
        }
    }
}
