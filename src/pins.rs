//! Front end control lines and the status LED
//!
//! Levels and timings come from the [`BoardConfig`]; errors from the pins are
//! reduced to their [`ErrorKind`] so differing pin types can be mixed.
use embedded_hal::{
    delay::DelayNs,
    digital::{Error as _, ErrorKind, InputPin, OutputPin},
};
use fugit::MillisDurationU32;

use crate::board::{BoardConfig, LedTiming, Level};

/// Time the reset line is held at the power-down level
pub const RESET_PULSE: MillisDurationU32 = MillisDurationU32::millis(10);
/// Time the front end needs after power-up before it accepts commands
pub const BOOT_TIME: MillisDurationU32 = MillisDurationU32::millis(3);

fn drive<P: OutputPin>(pin: &mut P, level: Level) -> Result<(), ErrorKind> {
    match level {
        Level::High => pin.set_high(),
        Level::Low => pin.set_low(),
    }
    .map_err(|e| e.kind())
}

pub struct FrontEndPins<RST, BUSY, IRQ> {
    reset: RST,
    busy: BUSY,
    irq: IRQ,
    board: &'static BoardConfig,
    /// Last sampled IRQ level, for either-edge triggers
    irq_level: Option<bool>,
}

impl<RST: OutputPin, BUSY: InputPin, IRQ: InputPin> FrontEndPins<RST, BUSY, IRQ> {
    pub fn new(reset: RST, busy: BUSY, irq: IRQ, board: &'static BoardConfig) -> Self {
        Self {
            reset,
            busy,
            irq,
            board,
            irq_level: None,
        }
    }

    pub fn release(self) -> (RST, BUSY, IRQ) {
        (self.reset, self.busy, self.irq)
    }

    pub fn power_down(&mut self) -> Result<(), ErrorKind> {
        drive(&mut self.reset, self.board.reset_power_down)
    }

    pub fn power_up(&mut self) -> Result<(), ErrorKind> {
        drive(&mut self.reset, self.board.reset_power_up)
    }

    /// Pulses the reset line and waits for the front end to boot
    pub fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), ErrorKind> {
        debug!("Resetting front end");
        self.power_down()?;
        delay.delay_ms(RESET_PULSE.to_millis());
        self.power_up()?;
        delay.delay_ms(BOOT_TIME.to_millis());
        Ok(())
    }

    /// The front end holds busy high while it processes a command
    pub fn is_busy(&mut self) -> Result<bool, ErrorKind> {
        self.busy.is_high().map_err(|e| e.kind())
    }

    pub fn wait_idle(&mut self) -> Result<(), ErrorKind> {
        while self.is_busy()? {
            core::hint::spin_loop()
        }
        Ok(())
    }

    /// Whether the IRQ line signals a pending interrupt
    ///
    /// With an either-edge trigger a change since the previous sample counts
    /// as pending; the first sample never does.
    pub fn irq_pending(&mut self) -> Result<bool, ErrorKind> {
        let high = self.irq.is_high().map_err(|e| e.kind())?;
        Ok(match self.board.irq_trigger.active_level() {
            Some(Level::High) => high,
            Some(Level::Low) => !high,
            None => {
                let changed = self.irq_level.is_some_and(|prev| prev != high);
                self.irq_level = Some(high);
                changed
            }
        })
    }

    pub fn wait_irq(&mut self) -> Result<(), ErrorKind> {
        trace!("Waiting for IRQ");
        while !self.irq_pending()? {
            core::hint::spin_loop()
        }
        Ok(())
    }
}

/// Active high status LED
pub struct StatusLed<L> {
    led: L,
    timing: LedTiming,
}

impl<L: OutputPin> StatusLed<L> {
    pub fn new(led: L, timing: LedTiming) -> Self {
        Self { led, timing }
    }

    pub fn release(self) -> L {
        self.led
    }

    pub fn signal_success(&mut self, delay: &mut impl DelayNs) -> Result<(), ErrorKind> {
        drive(&mut self.led, Level::High)?;
        delay.delay_ms(self.timing.success_on.to_millis());
        drive(&mut self.led, Level::Low)
    }

    pub fn signal_failure(&mut self, delay: &mut impl DelayNs) -> Result<(), ErrorKind> {
        let period = self.timing.failure_period.to_millis();
        for _ in 0..self.timing.failure_flicker {
            drive(&mut self.led, Level::High)?;
            delay.delay_ms(period);
            drive(&mut self.led, Level::Low)?;
            delay.delay_ms(period);
        }
        Ok(())
    }
}
