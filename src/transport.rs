use embedded_hal::{
    digital::OutputPin,
    spi::{self, ErrorKind, Operation, SpiBus, SpiDevice},
};

/// Outgoing word clocked while only receiving
pub const FILLER: u8 = 0xFF;

/// Part of the bus that failed the readiness check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Peripheral {
    Bus,
    ChipSelect,
}

/// Blocking transceive over some physical bus
pub trait Transport {
    type Error;
    /// Checks the bus peripheral and its chip select are usable, without clocking data
    fn check_ready(&mut self) -> Result<(), Peripheral>;
    /// Clock `tx` out, capturing the incoming words into `rx` if given
    ///
    /// When `rx` is longer than `tx` the remaining outgoing words are filler.
    fn transceive(&mut self, tx: &[u8], rx: Option<&mut [u8]>) -> Result<(), Self::Error>;
}

/// Transport over a [`SpiDevice`], which owns chip select and bus sharing
pub struct SpiDeviceTransport<S: SpiDevice> {
    dev: S,
}

impl<S: SpiDevice> SpiDeviceTransport<S> {
    pub fn new(dev: S) -> Self {
        Self { dev }
    }

    pub fn release(self) -> S {
        self.dev
    }
}

impl<S: SpiDevice> Transport for SpiDeviceTransport<S> {
    type Error = S::Error;

    fn check_ready(&mut self) -> Result<(), Peripheral> {
        // empty transaction: CS asserted and released, bus flushed, nothing clocked
        self.dev.transaction(&mut []).map_err(|e| {
            match spi::Error::kind(&e) {
                ErrorKind::ChipSelectFault => Peripheral::ChipSelect,
                _ => Peripheral::Bus,
            }
        })
    }

    fn transceive(&mut self, tx: &[u8], rx: Option<&mut [u8]>) -> Result<(), Self::Error> {
        trace!("SPI out {=[u8]:X}", tx);
        match rx {
            Some(rx) if rx.len() > tx.len() => {
                // the device would pick the trailing words itself, spidev clocks zeros
                let (head, tail) = rx.split_at_mut(tx.len());
                head.copy_from_slice(tx);
                tail.fill(FILLER);
                self.dev
                    .transaction(&mut [Operation::TransferInPlace(&mut *rx)])?;
                trace!("SPI in {=[u8]:X}", rx);
                Ok(())
            }
            Some(rx) => {
                self.dev
                    .transaction(&mut [Operation::Transfer(&mut *rx, tx)])?;
                trace!("SPI in {=[u8]:X}", rx);
                Ok(())
            }
            None => self.dev.write(tx),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum BusError<E, P> {
    Spi(E),
    ChipSelect(P),
}

/// Transport over an exclusively owned [`SpiBus`] with a manually driven, active
/// low chip select
pub struct SpiBusTransport<B: SpiBus, CS: OutputPin> {
    bus: B,
    cs: CS,
}

impl<B: SpiBus, CS: OutputPin> SpiBusTransport<B, CS> {
    pub fn new(bus: B, cs: CS) -> Self {
        Self { bus, cs }
    }

    pub fn release(self) -> (B, CS) {
        (self.bus, self.cs)
    }

    fn with_cs_low<T>(
        &mut self,
        f: impl FnOnce(&mut B) -> Result<T, B::Error>,
    ) -> Result<T, BusError<B::Error, CS::Error>> {
        if let Err(e) = self.cs.set_low() {
            return Err(BusError::ChipSelect(e));
        }
        let res = f(&mut self.bus).and_then(|v| self.bus.flush().map(|_| v));
        // release even if the transfer failed
        let released = self.cs.set_high();
        match (res, released) {
            (Err(e), _) => Err(BusError::Spi(e)),
            (Ok(_), Err(e)) => Err(BusError::ChipSelect(e)),
            (Ok(v), Ok(())) => Ok(v),
        }
    }
}

impl<B: SpiBus, CS: OutputPin> Transport for SpiBusTransport<B, CS> {
    type Error = BusError<B::Error, CS::Error>;

    fn check_ready(&mut self) -> Result<(), Peripheral> {
        self.cs.set_high().map_err(|_| Peripheral::ChipSelect)?;
        self.bus.flush().map_err(|_| Peripheral::Bus)
    }

    fn transceive(&mut self, tx: &[u8], rx: Option<&mut [u8]>) -> Result<(), Self::Error> {
        trace!("SPI out {=[u8]:X}", tx);
        match rx {
            Some(rx) if rx.len() > tx.len() => {
                let (head, tail) = rx.split_at_mut(tx.len());
                head.copy_from_slice(tx);
                tail.fill(FILLER);
                self.with_cs_low(|bus| bus.transfer_in_place(&mut *rx))?;
                trace!("SPI in {=[u8]:X}", rx);
                Ok(())
            }
            Some(rx) => {
                self.with_cs_low(|bus| bus.transfer(&mut *rx, tx))?;
                trace!("SPI in {=[u8]:X}", rx);
                Ok(())
            }
            None => self.with_cs_low(|bus| bus.write(tx)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use embedded_hal::digital;

    /// SpiDevice double recording the stream clocked out on MOSI by every
    /// transaction; words the caller left unspecified go out as 0x00, like spidev
    #[derive(Default)]
    pub(crate) struct RecordingDevice {
        pub written: Vec<Vec<u8>>,
        /// Bytes shifted in on reads and transfers, cycled
        pub response: Vec<u8>,
        pub fail_with: Option<ErrorKind>,
        pub transactions: usize,
    }

    impl spi::ErrorType for RecordingDevice {
        type Error = ErrorKind;
    }

    impl SpiDevice for RecordingDevice {
        fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), ErrorKind> {
            self.transactions += 1;
            if let Some(kind) = self.fail_with {
                return Err(kind);
            }
            let mut out = Vec::new();
            let mut resp = self.response.iter().copied().cycle();
            for op in operations {
                match op {
                    Operation::Write(w) => out.extend_from_slice(w),
                    Operation::Transfer(r, w) => {
                        out.extend_from_slice(w);
                        out.extend(core::iter::repeat(0).take(r.len().saturating_sub(w.len())));
                        for b in r.iter_mut() {
                            *b = resp.next().unwrap_or(0);
                        }
                    }
                    Operation::Read(r) => {
                        out.extend(core::iter::repeat(0).take(r.len()));
                        for b in r.iter_mut() {
                            *b = resp.next().unwrap_or(0);
                        }
                    }
                    Operation::TransferInPlace(buf) => {
                        out.extend_from_slice(buf);
                        for b in buf.iter_mut() {
                            *b = resp.next().unwrap_or(0);
                        }
                    }
                    Operation::DelayNs(_) => {}
                }
            }
            self.written.push(out);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingBus {
        written: Vec<u8>,
        flushes: usize,
        fail: bool,
    }

    impl spi::ErrorType for RecordingBus {
        type Error = ErrorKind;
    }

    impl SpiBus for RecordingBus {
        fn read(&mut self, words: &mut [u8]) -> Result<(), ErrorKind> {
            words.fill(0);
            Ok(())
        }
        fn write(&mut self, words: &[u8]) -> Result<(), ErrorKind> {
            if self.fail {
                return Err(ErrorKind::Overrun);
            }
            self.written.extend_from_slice(words);
            Ok(())
        }
        fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), ErrorKind> {
            self.write(write)?;
            // loopback
            for (r, w) in read.iter_mut().zip(write) {
                *r = *w;
            }
            Ok(())
        }
        fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), ErrorKind> {
            self.write(words)?;
            Ok(())
        }
        fn flush(&mut self) -> Result<(), ErrorKind> {
            self.flushes += 1;
            if self.fail {
                Err(ErrorKind::Other)
            } else {
                Ok(())
            }
        }
    }

    /// Output pin recording its level history
    #[derive(Default)]
    pub(crate) struct Pin {
        pub levels: Vec<bool>,
        pub broken: bool,
        /// Only driving high fails
        pub stuck_low: bool,
    }

    impl digital::ErrorType for Pin {
        type Error = digital::ErrorKind;
    }

    impl OutputPin for Pin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            if self.broken {
                return Err(digital::ErrorKind::Other);
            }
            self.levels.push(false);
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Self::Error> {
            if self.broken || self.stuck_low {
                return Err(digital::ErrorKind::Other);
            }
            self.levels.push(true);
            Ok(())
        }
    }

    #[test]
    fn device_full_duplex() {
        let mut t = SpiDeviceTransport::new(RecordingDevice {
            response: vec![0xA5, 0x5A],
            ..Default::default()
        });
        let mut rx = [0u8; 2];
        t.transceive(&[0x01, 0x02], Some(&mut rx)).unwrap();
        assert_eq!(rx, [0xA5, 0x5A]);
        assert_eq!(t.release().written, vec![vec![0x01, 0x02]]);
    }

    #[test]
    fn device_filler_after_short_tx() {
        let mut t = SpiDeviceTransport::new(RecordingDevice {
            response: vec![0x11, 0x22, 0x33, 0x44],
            ..Default::default()
        });
        let mut rx = [0u8; 4];
        t.transceive(&[FILLER], Some(&mut rx)).unwrap();
        assert_eq!(rx, [0x11, 0x22, 0x33, 0x44]);

        let mut rx = [0u8; 3];
        t.transceive(&[0x01], Some(&mut rx)).unwrap();
        assert_eq!(
            t.release().written,
            [vec![0xFF; 4], vec![0x01, FILLER, FILLER]]
        );
    }

    #[test]
    fn device_transmit_only() {
        let mut t = SpiDeviceTransport::new(RecordingDevice::default());
        t.transceive(&[0xC2], None).unwrap();
        assert_eq!(t.release().written, vec![vec![0xC2]]);
    }

    #[test]
    fn device_readiness() {
        let mut t = SpiDeviceTransport::new(RecordingDevice::default());
        assert_eq!(t.check_ready(), Ok(()));
        // nothing clocked
        assert_eq!(t.dev.written, vec![Vec::<u8>::new()]);

        t.dev.fail_with = Some(ErrorKind::ChipSelectFault);
        assert_eq!(t.check_ready(), Err(Peripheral::ChipSelect));
        t.dev.fail_with = Some(ErrorKind::ModeFault);
        assert_eq!(t.check_ready(), Err(Peripheral::Bus));
    }

    #[test]
    fn device_error_passthrough() {
        let mut t = SpiDeviceTransport::new(RecordingDevice {
            fail_with: Some(ErrorKind::Overrun),
            ..Default::default()
        });
        let mut rx = [0u8; 1];
        assert_eq!(t.transceive(&[0], Some(&mut rx)), Err(ErrorKind::Overrun));
    }

    #[test]
    fn bus_cs_framing() {
        let mut t = SpiBusTransport::new(RecordingBus::default(), Pin::default());
        t.transceive(&[0x10, 0x20], None).unwrap();
        let (bus, cs) = t.release();
        assert_eq!(bus.written, [0x10, 0x20]);
        assert_eq!(bus.flushes, 1);
        assert_eq!(cs.levels, [false, true]);
    }

    #[test]
    fn bus_filler_after_short_tx() {
        let mut t = SpiBusTransport::new(RecordingBus::default(), Pin::default());
        let mut rx = [0u8; 4];
        t.transceive(&[FILLER], Some(&mut rx)).unwrap();
        assert_eq!(t.bus.written, [0xFF; 4]);

        let mut rx = [0u8; 3];
        t.transceive(&[0x01, 0x02, 0x03], Some(&mut rx)).unwrap();
        assert_eq!(rx, [0x01, 0x02, 0x03]);
    }

    #[test]
    fn bus_releases_cs_on_failure() {
        let mut t = SpiBusTransport::new(
            RecordingBus {
                fail: true,
                ..Default::default()
            },
            Pin::default(),
        );
        assert_eq!(
            t.transceive(&[0x01], None),
            Err(BusError::Spi(ErrorKind::Overrun))
        );
        assert_eq!(t.cs.levels, [false, true]);
    }

    #[test]
    fn bus_cs_release_failure() {
        let mut t = SpiBusTransport::new(
            RecordingBus::default(),
            Pin {
                stuck_low: true,
                ..Default::default()
            },
        );
        let mut rx = [0u8; 2];
        assert_eq!(
            t.transceive(&[0x01, 0x02], Some(&mut rx)),
            Err(BusError::ChipSelect(digital::ErrorKind::Other))
        );
        // the transfer itself went through
        assert_eq!(t.bus.written, [0x01, 0x02]);
        assert_eq!(t.bus.flushes, 1);
        assert_eq!(t.cs.levels, [false]);
    }

    #[test]
    fn bus_readiness() {
        let mut t = SpiBusTransport::new(RecordingBus::default(), Pin::default());
        assert_eq!(t.check_ready(), Ok(()));
        assert_eq!(t.cs.levels, [true]);

        t.bus.fail = true;
        assert_eq!(t.check_ready(), Err(Peripheral::Bus));

        t.cs.broken = true;
        assert_eq!(t.check_ready(), Err(Peripheral::ChipSelect));
    }
}
