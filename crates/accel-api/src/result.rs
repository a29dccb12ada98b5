use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Status code returned by every entry point.
///
/// Kept as an open `u32` newtype rather than a closed enum: drivers may hand
/// back codes this crate does not know, and the loader forwards them verbatim.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize, thiserror::Error,
)]
#[repr(transparent)]
#[error("{} ({:#x})", self.name(), self.0)]
pub struct ZeResult(pub u32);

impl ZeResult {
    pub const SUCCESS: Self = Self(0);
    pub const NOT_READY: Self = Self(1);

    pub const ERROR_DEVICE_LOST: Self = Self(0x7000_0001);
    pub const ERROR_OUT_OF_HOST_MEMORY: Self = Self(0x7000_0002);
    pub const ERROR_OUT_OF_DEVICE_MEMORY: Self = Self(0x7000_0003);
    pub const ERROR_MODULE_BUILD_FAILURE: Self = Self(0x7000_0004);
    pub const ERROR_MODULE_LINK_FAILURE: Self = Self(0x7000_0005);

    pub const ERROR_INSUFFICIENT_PERMISSIONS: Self = Self(0x7001_0000);
    pub const ERROR_NOT_AVAILABLE: Self = Self(0x7001_0001);

    pub const ERROR_UNINITIALIZED: Self = Self(0x7800_0001);
    pub const ERROR_UNSUPPORTED_VERSION: Self = Self(0x7800_0002);
    pub const ERROR_UNSUPPORTED_FEATURE: Self = Self(0x7800_0003);
    pub const ERROR_INVALID_ARGUMENT: Self = Self(0x7800_0004);
    pub const ERROR_INVALID_NULL_HANDLE: Self = Self(0x7800_0005);
    pub const ERROR_HANDLE_OBJECT_IN_USE: Self = Self(0x7800_0006);
    pub const ERROR_INVALID_NULL_POINTER: Self = Self(0x7800_0007);
    pub const ERROR_INVALID_SIZE: Self = Self(0x7800_0008);
    pub const ERROR_UNSUPPORTED_SIZE: Self = Self(0x7800_0009);
    pub const ERROR_UNSUPPORTED_ALIGNMENT: Self = Self(0x7800_000a);
    pub const ERROR_INVALID_SYNCHRONIZATION_OBJECT: Self = Self(0x7800_000b);
    pub const ERROR_INVALID_ENUMERATION: Self = Self(0x7800_000c);
    pub const ERROR_UNSUPPORTED_ENUMERATION: Self = Self(0x7800_000d);

    pub const ERROR_UNKNOWN: Self = Self(0x7fff_ffff);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    /// `true` for the error range. `NOT_READY` is a status, not an error.
    pub fn is_error(self) -> bool {
        self.0 >= 0x7000_0000
    }

    /// Turn a status into a `Result` so callers can use `?`.
    pub fn check(self) -> Result<(), ZeResult> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::SUCCESS => "SUCCESS",
            Self::NOT_READY => "NOT_READY",
            Self::ERROR_DEVICE_LOST => "ERROR_DEVICE_LOST",
            Self::ERROR_OUT_OF_HOST_MEMORY => "ERROR_OUT_OF_HOST_MEMORY",
            Self::ERROR_OUT_OF_DEVICE_MEMORY => "ERROR_OUT_OF_DEVICE_MEMORY",
            Self::ERROR_MODULE_BUILD_FAILURE => "ERROR_MODULE_BUILD_FAILURE",
            Self::ERROR_MODULE_LINK_FAILURE => "ERROR_MODULE_LINK_FAILURE",
            Self::ERROR_INSUFFICIENT_PERMISSIONS => "ERROR_INSUFFICIENT_PERMISSIONS",
            Self::ERROR_NOT_AVAILABLE => "ERROR_NOT_AVAILABLE",
            Self::ERROR_UNINITIALIZED => "ERROR_UNINITIALIZED",
            Self::ERROR_UNSUPPORTED_VERSION => "ERROR_UNSUPPORTED_VERSION",
            Self::ERROR_UNSUPPORTED_FEATURE => "ERROR_UNSUPPORTED_FEATURE",
            Self::ERROR_INVALID_ARGUMENT => "ERROR_INVALID_ARGUMENT",
            Self::ERROR_INVALID_NULL_HANDLE => "ERROR_INVALID_NULL_HANDLE",
            Self::ERROR_HANDLE_OBJECT_IN_USE => "ERROR_HANDLE_OBJECT_IN_USE",
            Self::ERROR_INVALID_NULL_POINTER => "ERROR_INVALID_NULL_POINTER",
            Self::ERROR_INVALID_SIZE => "ERROR_INVALID_SIZE",
            Self::ERROR_UNSUPPORTED_SIZE => "ERROR_UNSUPPORTED_SIZE",
            Self::ERROR_UNSUPPORTED_ALIGNMENT => "ERROR_UNSUPPORTED_ALIGNMENT",
            Self::ERROR_INVALID_SYNCHRONIZATION_OBJECT => "ERROR_INVALID_SYNCHRONIZATION_OBJECT",
            Self::ERROR_INVALID_ENUMERATION => "ERROR_INVALID_ENUMERATION",
            Self::ERROR_UNSUPPORTED_ENUMERATION => "ERROR_UNSUPPORTED_ENUMERATION",
            Self::ERROR_UNKNOWN => "ERROR_UNKNOWN",
            _ => "UNRECOGNIZED",
        }
    }
}

impl Default for ZeResult {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl std::fmt::Debug for ZeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl From<Result<(), ZeResult>> for ZeResult {
    fn from(result: Result<(), ZeResult>) -> Self {
        match result {
            Ok(()) => Self::SUCCESS,
            Err(code) => code,
        }
    }
}
