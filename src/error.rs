//! Status codes and the crate error type.
//!
//! Every driver call reports an HRESULT-style [`Status`]. [`Error`] classifies
//! those codes once, so callers can tell a machine without a usable adapter or
//! output ([`Error::Unavailable`]) from a real driver failure
//! ([`Error::Driver`]).
use std::fmt;

/// HRESULT-style status code.
///
/// Non-negative values are success codes, negative values are failures.
#[derive(Eq, PartialEq, Clone, Copy, Hash, Default)]
#[repr(transparent)]
pub struct Status(pub i32);

impl Status {
    /// Operation succeeded.
    pub const OK: Self = Self(0);
    /// Operation was not applied, the object is unchanged and still usable.
    pub const FALSE: Self = Self(1);
    /// Unspecified failure.
    pub const FAIL: Self = Self(0x8000_4005_u32 as i32);
    /// A caller contract was violated.
    pub const INVALID_ARG: Self = Self(0x8007_0057_u32 as i32);
    /// The object is not in a state that permits the call.
    pub const ILLEGAL_METHOD_CALL: Self = Self(0x8000_000E_u32 as i32);
    /// Out of memory.
    pub const OUT_OF_MEMORY: Self = Self(0x8007_000E_u32 as i32);
    /// `HRESULT_FROM_WIN32(ERROR_TOO_MANY_NAMES)`.
    pub const TOO_MANY_NAMES: Self = Self(0x8007_0044_u32 as i32);
    /// `DXGI_ERROR_INVALID_CALL`.
    pub const DXGI_INVALID_CALL: Self = Self(0x887A_0001_u32 as i32);
    /// `DXGI_ERROR_NOT_FOUND`.
    pub const DXGI_NOT_FOUND: Self = Self(0x887A_0002_u32 as i32);
    /// `DXGI_ERROR_UNSUPPORTED`.
    pub const DXGI_UNSUPPORTED: Self = Self(0x887A_0004_u32 as i32);
    /// `DXGI_ERROR_DEVICE_REMOVED`.
    pub const DXGI_DEVICE_REMOVED: Self = Self(0x887A_0005_u32 as i32);
    /// `DXGI_ERROR_NOT_CURRENTLY_AVAILABLE`.
    pub const DXGI_NOT_CURRENTLY_AVAILABLE: Self = Self(0x887A_0022_u32 as i32);
    /// `DXGI_ERROR_ACCESS_LOST`.
    pub const DXGI_ACCESS_LOST: Self = Self(0x887A_0026_u32 as i32);
    /// `DXGI_ERROR_WAIT_TIMEOUT`.
    pub const DXGI_WAIT_TIMEOUT: Self = Self(0x887A_0027_u32 as i32);

    /// Returns `true` for success codes, including [`Status::FALSE`].
    #[inline]
    #[must_use]
    pub const fn is_ok(self) -> bool {
        self.0 >= 0
    }

    /// Gets the raw code.
    #[inline]
    #[must_use]
    pub const fn code(self) -> i32 {
        self.0
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status({:#010X})", self.0 as u32)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}", self.0 as u32)
    }
}

/// Errors reported by overlay surfaces and capture sessions.
#[derive(thiserror::Error, Eq, PartialEq, Clone, Debug)]
pub enum Error {
    /// A caller contract was violated. No driver call was made.
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// A previous resize failed and the surface buffers no longer match its size.
    #[error("Surface buffers are stale after a failed resize; resize again or destroy the surface")]
    StaleSurface,
    /// Every overlay window identifier of the registry is in use.
    #[error("Overlay window limit of {limit} reached")]
    WindowLimitReached {
        /// Maximum number of live overlay windows.
        limit: u32,
    },
    /// No compatible adapter, output or duplication facility is available.
    #[error("No compatible graphics hardware or output is available ({0})")]
    Unavailable(Status),
    /// Driver or window system call failed.
    #[error("Driver call failed with {0}")]
    Driver(Status),
}

impl Error {
    /// Classifies a failing driver status.
    #[must_use]
    pub const fn from_status(status: Status) -> Self {
        match status {
            Status::DXGI_NOT_FOUND | Status::DXGI_UNSUPPORTED | Status::DXGI_NOT_CURRENTLY_AVAILABLE => {
                Self::Unavailable(status)
            }
            _ => Self::Driver(status),
        }
    }

    /// Gets the status code reported for this error at the C boundary.
    #[must_use]
    pub const fn status(&self) -> Status {
        match self {
            Self::InvalidArgument(_) => Status::INVALID_ARG,
            Self::StaleSurface => Status::ILLEGAL_METHOD_CALL,
            Self::WindowLimitReached { .. } => Status::TOO_MANY_NAMES,
            Self::Unavailable(status) | Self::Driver(status) => *status,
        }
    }

    /// Whether the duplication wait elapsed without a new frame.
    #[inline]
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Driver(Status::DXGI_WAIT_TIMEOUT))
    }

    /// Whether desktop duplication access was lost (mode change, secure desktop, ...).
    #[inline]
    #[must_use]
    pub const fn is_access_lost(&self) -> bool {
        matches!(self, Self::Driver(Status::DXGI_ACCESS_LOST))
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        Self::from_status(status)
    }
}

#[cfg(windows)]
impl From<windows::core::Error> for Error {
    fn from(error: windows::core::Error) -> Self {
        Self::from_status(Status(error.code().0))
    }
}
