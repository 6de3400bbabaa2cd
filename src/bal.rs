//! Bus abstraction layer
//!
//! The thin contract between an NFC protocol stack and the SPI link to the
//! front end: init once, then blocking exchanges. Configuration accessors
//! exist for the upstream calling convention but carry no settings.
use heapless::Vec;

use crate::{
    status::{COMP_DRIVER, SPI_BAL_ID},
    transport::{Transport, FILLER},
    Error,
};

/// Largest single transfer, in bytes
pub const STAGING_CAPACITY: usize = 272;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[repr(u8)]
pub enum BalType {
    Spi = 0x01,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum State {
    Uninitialized,
    Ready,
}

/// BAL handle, owned by the caller for its whole lifetime
pub struct Bal<T: Transport> {
    id: u16,
    bal_type: Option<BalType>,
    state: State,
    transport: T,
    /// Outgoing bytes of the current exchange
    staging: Vec<u8, STAGING_CAPACITY>,
}

impl<T: Transport> Bal<T> {
    /// Size the upstream stack must declare for this handle in [`Bal::init`]
    pub const PARAMS_SIZE: usize = core::mem::size_of::<Self>();

    pub fn new(transport: T) -> Self {
        Self {
            id: 0,
            bal_type: None,
            state: State::Uninitialized,
            transport,
            staging: Vec::new(),
        }
    }

    /// Component id stamped by [`Bal::init`], zero before
    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn bal_type(&self) -> Option<BalType> {
        self.bal_type
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == State::Ready
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Gives the transport back
    pub fn release(self) -> T {
        self.transport
    }

    /// Tags the handle and checks the bus is usable
    ///
    /// `size_of_params` is the structure size the caller believes it is
    /// initializing and has to match [`Bal::PARAMS_SIZE`]. Nothing is clocked
    /// on the bus. Calling this on a ready handle re-runs the readiness check.
    pub fn init(&mut self, size_of_params: usize) -> crate::Result<(), T::Error> {
        if size_of_params != Self::PARAMS_SIZE {
            error!(
                "BAL params size mismatch: {=usize}, expected {=usize}",
                size_of_params,
                Self::PARAMS_SIZE
            );
            return Err(Error::InvalidParameter);
        }

        self.id = u16::from_be_bytes([COMP_DRIVER, SPI_BAL_ID]);
        self.bal_type = Some(BalType::Spi);
        self.state = State::Uninitialized;

        debug!("Initializing SPI BAL {=u16:#X}", self.id);
        if let Err(p) = self.transport.check_ready() {
            error!("{} not ready", p);
            return Err(Error::DeviceNotReady(p));
        }

        self.state = State::Ready;
        Ok(())
    }

    /// One blocking transfer
    ///
    /// - `tx` absent: receive `rx_capacity` bytes, clocking out filler
    /// - `tx` present: clock out `tx`; its length sets the transfer length
    /// - `rx` present: capture the incoming bytes into `rx[..length]`
    /// - `rx` absent: transmit only
    ///
    /// On success `rx_len`, if given, receives the transferred length. It is
    /// left alone on failure. `options` is reserved.
    pub fn exchange(
        &mut self,
        _options: u16,
        tx: Option<&[u8]>,
        rx_capacity: u16,
        rx: Option<&mut [u8]>,
        rx_len: Option<&mut u16>,
    ) -> crate::Result<(), T::Error> {
        self.ensure_ready()?;
        if tx.is_none() && rx.is_none() {
            return Err(Error::InvalidParameter);
        }

        let len = self.stage(tx, rx_capacity)?;
        if len > 0 {
            match rx {
                Some(rx) => {
                    let Some(rx) = rx.get_mut(..len) else {
                        return Err(Error::InvalidParameter);
                    };
                    self.transport
                        .transceive(&self.staging, Some(rx))
                        .map_err(|e| {
                            error!("SPI reg read failed, {=usize} bytes", len);
                            Error::DriverFailure(e)
                        })?;
                }
                None => {
                    self.transport
                        .transceive(&self.staging, None)
                        .map_err(|e| {
                            error!("SPI direct command failed, {=usize} bytes", len);
                            Error::DriverFailure(e)
                        })?;
                }
            }
        }

        if let Some(out) = rx_len {
            // bounded by STAGING_CAPACITY
            *out = len as u16;
        }
        Ok(())
    }

    /// Full duplex transfer of `buf`, reading the response back over it
    ///
    /// Returns the number of bytes transferred.
    pub fn exchange_in_place(&mut self, buf: &mut [u8]) -> crate::Result<usize, T::Error> {
        self.ensure_ready()?;
        let len = self.stage(Some(&*buf), 0)?;
        if len > 0 {
            self.transport
                .transceive(&self.staging, Some(buf))
                .map_err(|e| {
                    error!("SPI in-place exchange failed, {=usize} bytes", len);
                    Error::DriverFailure(e)
                })?;
        }
        Ok(len)
    }

    /// No settings are readable through this layer; `value` is left as is
    pub fn get_config(&self, _key: u16, _value: &mut u32) -> crate::Result<(), T::Error> {
        self.ensure_ready()
    }

    /// No settings are writable through this layer
    pub fn set_config(&mut self, _key: u16, _value: u32) -> crate::Result<(), T::Error> {
        self.ensure_ready()
    }

    fn ensure_ready(&self) -> crate::Result<(), T::Error> {
        match self.state {
            State::Ready => Ok(()),
            State::Uninitialized => Err(Error::InvalidState),
        }
    }

    /// Fills the staging buffer and returns the transfer length
    fn stage(&mut self, tx: Option<&[u8]>, rx_capacity: u16) -> crate::Result<usize, T::Error> {
        self.staging.clear();
        match tx {
            Some(tx) => {
                if self.staging.extend_from_slice(tx).is_err() {
                    return Err(Error::BufferTooLarge(tx.len()));
                }
                Ok(tx.len())
            }
            None => {
                let len = usize::from(rx_capacity);
                if len > STAGING_CAPACITY {
                    return Err(Error::BufferTooLarge(len));
                }
                // capacity is never zero
                let _ = self.staging.push(FILLER);
                Ok(len)
            }
        }
    }
}
