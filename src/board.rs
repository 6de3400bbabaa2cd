//! Board configuration
//!
//! Pin assignments, line polarities and bus parameters for one physical board.
//! Everything in here is fixed at build time and consumed as-is by the BAL and
//! the front-end pin helpers.

use core::fmt::Write;

use embedded_hal::spi::{Mode, MODE_0};
use fugit::{HertzU32, MillisDurationU32, SecsDurationU32};

/// Line number used for pins the board doesn't route
pub const UNCONNECTED: u16 = 0xFFFF;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Pull {
    None,
    Up,
    Down,
}

/// Condition that fires the front end's IRQ line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum InterruptEdge {
    LevelLow,
    LevelHigh,
    Rising,
    Falling,
    Either,
}

impl InterruptEdge {
    /// Level the line sits at while an interrupt is pending
    ///
    /// `None` for [`InterruptEdge::Either`], which has no steady active level.
    pub const fn active_level(&self) -> Option<Level> {
        match self {
            InterruptEdge::LevelHigh | InterruptEdge::Rising => Some(Level::High),
            InterruptEdge::LevelLow | InterruptEdge::Falling => Some(Level::Low),
            InterruptEdge::Either => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[repr(u8)]
pub enum Level {
    Low = 0,
    High = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct GpioLine {
    /// Host GPIO number (`/sys/class/gpio/gpio<line>`)
    pub line: u16,
    pub pull: Pull,
}

impl GpioLine {
    pub const fn new(line: u16, pull: Pull) -> Self {
        Self { line, pull }
    }

    pub const fn is_connected(&self) -> bool {
        self.line != UNCONNECTED
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct SpiBusConfig {
    pub bus: u8,
    pub chip_select: u8,
    pub frequency: HertzU32,
    pub mode: Mode,
    pub bits_per_word: u8,
    /// Prefix of the user space device node
    pub device_dir: &'static str,
}

impl SpiBusConfig {
    /// User space device node, `/dev/spidev<bus>.<cs>`
    ///
    /// Fails if the path doesn't fit in `N` bytes.
    pub fn device_path<const N: usize>(
        &self,
    ) -> Result<heapless::String<N>, core::fmt::Error> {
        let mut path = heapless::String::new();
        write!(path, "{}{}.{}", self.device_dir, self.bus, self.chip_select)?;
        Ok(path)
    }
}

/// Status LED blink pattern
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct LedTiming {
    /// How long the LED stays lit after a successful operation
    pub success_on: SecsDurationU32,
    /// On and off time of each failure flicker
    pub failure_period: MillisDurationU32,
    pub failure_flicker: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct BoardConfig {
    pub name: &'static str,
    pub reset: GpioLine,
    pub irq: GpioLine,
    /// Firmware download mode select
    pub download: GpioLine,
    pub busy: GpioLine,
    /// Chip select when driven as a plain GPIO, unconnected if the SPI driver owns it
    pub chip_select: GpioLine,
    pub irq_trigger: InterruptEdge,
    /// Reset line level that holds the front end powered down
    pub reset_power_down: Level,
    pub reset_power_up: Level,
    pub spi: SpiBusConfig,
    pub led: LedTiming,
}

/// Raspberry Pi with a PN5190 front end on user space SPI
pub const PI_PN5190: BoardConfig = BoardConfig {
    name: "PiPn5190",
    reset: GpioLine::new(24, Pull::Down),
    irq: GpioLine::new(23, Pull::Up),
    download: GpioLine::new(18, Pull::Up),
    busy: GpioLine::new(25, Pull::Up),
    // the spidev driver toggles CS, no pin of our own
    chip_select: GpioLine::new(UNCONNECTED, Pull::Up),
    irq_trigger: InterruptEdge::Rising,
    reset_power_down: Level::Low,
    reset_power_up: Level::High,
    spi: SpiBusConfig {
        bus: 0,
        chip_select: 0,
        frequency: HertzU32::MHz(5),
        mode: MODE_0,
        bits_per_word: 8,
        device_dir: "/dev/spidev",
    },
    led: LedTiming {
        success_on: SecsDurationU32::secs(2),
        failure_period: MillisDurationU32::millis(250),
        failure_flicker: 4,
    },
};
