use crate::Peripheral;
use std::any::Any;

// Register offsets within the GPIO block.
pub const REG_SWITCHES: u64 = 0x0;
pub const REG_LEDS: u64 = 0x4;
pub const REG_DIRECTION: u64 = 0x8;

/// GPIO block of the target board.
///
/// The switch register is read-only from software and reflects the physical
/// switch bank (upper 16 bits); the host harness mutates it through
/// [`GpioBlock::set_switches`]. The LED and direction registers hold the last
/// word the firmware stored. The block additionally keeps access counters so
/// a harness can check init ordering: whether the direction register was
/// configured before the firmware started polling the switches.
#[derive(Debug, Default)]
pub struct GpioBlock {
    switches: u32,
    leds: u32,
    direction: u32,
    direction_writes: u64,
    switch_reads: u64,
    reads_before_direction: u64,
}

impl GpioBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host-side: set the physical switch state.
    pub fn set_switches(&mut self, value: u32) {
        self.switches = value;
    }

    pub fn leds(&self) -> u32 {
        self.leds
    }

    pub fn direction(&self) -> u32 {
        self.direction
    }

    pub fn direction_writes(&self) -> u64 {
        self.direction_writes
    }

    pub fn switch_reads(&self) -> u64 {
        self.switch_reads
    }

    /// Switch reads that happened while the direction register was still at
    /// its reset value, i.e. before the firmware configured pin direction.
    pub fn reads_before_direction(&self) -> u64 {
        self.reads_before_direction
    }
}

impl Peripheral for GpioBlock {
    fn read_reg(&mut self, offset: u64) -> u32 {
        match offset {
            REG_SWITCHES => {
                self.switch_reads += 1;
                if self.direction_writes == 0 {
                    self.reads_before_direction += 1;
                }
                self.switches
            }
            REG_LEDS => self.leds,
            REG_DIRECTION => self.direction,
            _ => 0,
        }
    }

    fn write_reg(&mut self, offset: u64, value: u32) {
        match offset {
            REG_SWITCHES => {
                // Input register, externally driven; software stores are dropped.
                tracing::warn!("Ignoring write of {:#x} to read-only switch register", value);
            }
            REG_LEDS => {
                if value != self.leds {
                    tracing::debug!("LEDs {:#06x} -> {:#06x}", self.leds, value);
                }
                self.leds = value;
            }
            REG_DIRECTION => {
                self.direction = value;
                self.direction_writes += 1;
            }
            _ => {}
        }
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        Some(self)
    }
}
