// src/error.rs
//
// Public result codes for the control API.
//
// Every public operation returns one of these. The taxonomy follows
// spec §7: preconditions the caller violated, resource failures from
// the environment, and success. Internal adapter errors (decoder,
// backend) are mapped down to one of these at the control boundary;
// they never leak their own error types across the C ABI.

use std::fmt;

/// Result code returned by every control operation.
///
/// Mirrors the integer values a C caller sees: `OK` is zero, everything
/// else is negative. Do not renumber these — foreign callers hardcode them.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Ok = 0,
    NotInit = -1,
    AlreadyInit = -2,
    AudioDevice = -3,
    InvalidTrack = -4,
    FileNotFound = -5,
    OutOfMemory = -6,
    InvalidParam = -7,
    ClipFull = -8,
}

impl ErrorCode {
    /// Stable human-readable message for this code.
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::Ok => "ok",
            ErrorCode::NotInit => "engine is not initialized",
            ErrorCode::AlreadyInit => "engine is already initialized",
            ErrorCode::AudioDevice => "audio device error",
            ErrorCode::InvalidTrack => "invalid track id",
            ErrorCode::FileNotFound => "file not found or could not be opened",
            ErrorCode::OutOfMemory => "out of memory",
            ErrorCode::InvalidParam => "invalid parameter",
            ErrorCode::ClipFull => "track has no free clip slots",
        }
    }

    /// Raw integer code as seen by C callers.
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ErrorCode {}

/// Convenience result type used throughout the control API.
pub type ControlResult<T> = Result<T, ErrorCode>;

/// `strerror(code)`: map a raw integer code back to its message.
///
/// Unrecognized codes map to a generic "unknown error" string rather than
/// panicking, since this is reachable directly from FFI with caller-supplied
/// integers.
pub fn strerror(code: i32) -> &'static str {
    match code {
        0 => ErrorCode::Ok.message(),
        -1 => ErrorCode::NotInit.message(),
        -2 => ErrorCode::AlreadyInit.message(),
        -3 => ErrorCode::AudioDevice.message(),
        -4 => ErrorCode::InvalidTrack.message(),
        -5 => ErrorCode::FileNotFound.message(),
        -6 => ErrorCode::OutOfMemory.message(),
        -7 => ErrorCode::InvalidParam.message(),
        -8 => ErrorCode::ClipFull.message(),
        _ => "unknown error",
    }
}
