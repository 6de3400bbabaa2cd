//! Composite status codes of the upstream BAL contract
//!
//! A status is 16 bits wide: the high byte names the component that produced
//! it, the low byte the error. All-zero is success.
use bilge::prelude::*;

/// Component id of platform driver layers (this BAL included)
pub const COMP_DRIVER: u8 = 0xF0;
/// Sub-id of the SPI bus abstraction layer
pub const SPI_BAL_ID: u8 = 0x0F;

/// Error codes, low byte of a [`Status`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[repr(u8)]
pub enum ErrorCode {
    /// Transfer length exceeds the staging buffer
    BufferTooLarge = 0x04,
    /// Bus or chip select not ready
    DeviceNotReady = 0x0B,
    /// Operation called on a handle that isn't initialized
    InvalidState = 0x25,
    /// Malformed handle, size mismatch or unusable buffer
    InvalidParameter = 0x80,
    /// Underlying SPI transfer failed
    DriverFailure = 0x81,
}

#[bitsize(16)]
#[derive(FromBits, DebugBits, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Status {
    pub code: u8,
    pub component: u8,
}

impl Status {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn failure(code: ErrorCode) -> Self {
        Self::new(code as u8, COMP_DRIVER)
    }

    pub fn is_success(&self) -> bool {
        self.code() == 0
    }

    /// Collapse an operation result into the status the upstream stack expects
    pub fn from_result<T, E>(res: &Result<T, crate::Error<E>>) -> Self {
        match res {
            Ok(_) => Self::success(),
            Err(e) => Self::failure(e.code()),
        }
    }
}

impl<E> From<crate::Error<E>> for Status {
    fn from(e: crate::Error<E>) -> Self {
        Self::failure(e.code())
    }
}
