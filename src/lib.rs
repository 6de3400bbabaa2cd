#![cfg_attr(not(test), no_std)]
//! SPI bus abstraction layer for NFC reader front ends (PN5180, PN5190,
//! ST25R3911B and alikes)
//!
//! [`Bal`] gives the protocol stack above it blocking exchanges with the front
//! end over any [`Transport`]. [`board`] and [`pins`] cover the rest of the
//! wiring: control lines, interrupt polarity, bus parameters and status LED.

mod fmt;

pub mod bal;
pub mod board;
pub mod pins;
pub mod status;
pub mod transport;

pub use bal::{Bal, BalType, State, STAGING_CAPACITY};
pub use status::{ErrorCode, Status};
pub use transport::{Peripheral, SpiBusTransport, SpiDeviceTransport, Transport};

pub type Result<T, E> = core::result::Result<T, Error<E>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Error<E> {
    /// Handle size mismatch or a buffer that can't hold the transfer
    InvalidParameter,
    DeviceNotReady(Peripheral),
    /// Requested transfer length exceeds [`STAGING_CAPACITY`]
    BufferTooLarge(usize),
    /// Transport error, not retried
    DriverFailure(E),
    /// Handle used before a successful [`Bal::init`]
    InvalidState,
}

impl<E> Error<E> {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidParameter => ErrorCode::InvalidParameter,
            Error::DeviceNotReady(_) => ErrorCode::DeviceNotReady,
            Error::BufferTooLarge(_) => ErrorCode::BufferTooLarge,
            Error::DriverFailure(_) => ErrorCode::DriverFailure,
            Error::InvalidState => ErrorCode::InvalidState,
        }
    }
}
