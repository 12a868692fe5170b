pub mod bus;
pub mod cpu;
pub mod decoder;
pub mod memory;
pub mod metrics;
pub mod peripherals;

use std::any::Any;
use std::sync::Arc;

#[cfg(test)]
mod tests;

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Memory access violation at {0:#x}")]
    MemoryViolation(u64),
    #[error("Instruction decoding error at {0:#x}")]
    DecodeError(u64),
}

pub type SimResult<T> = Result<T, SimulationError>;

/// What a single executed instruction did to the overall simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    /// The core parked itself (EBREAK, or WFI with no interrupt source modeled).
    Halted,
}

/// Why a bounded run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxSteps,
    Halt,
    MemoryViolation(u64),
    DecodeError(u64),
}

#[derive(Debug, Clone, Copy)]
pub struct RunOutcome {
    pub stop: StopReason,
    pub steps: u64,
}

/// Trait for observing simulation events in a modular way.
pub trait SimulationObserver: std::fmt::Debug + Send + Sync {
    fn on_step_start(&self, _pc: u32, _opcode: u32) {}
    fn on_step_end(&self, _cycles: u32) {}
}

/// Trait representing a CPU architecture
pub trait Cpu {
    fn reset(&mut self);
    fn step(
        &mut self,
        bus: &mut dyn Bus,
        observers: &[Arc<dyn SimulationObserver>],
    ) -> SimResult<StepOutcome>;
    fn set_pc(&mut self, val: u32);
    fn pc(&self) -> u32;
    fn register(&self, id: u8) -> u32;
    fn set_register(&mut self, id: u8, val: u32);
}

/// Trait representing a memory-mapped register block.
///
/// Peripherals on this bus expose 32-bit registers at word-aligned offsets.
/// Sub-word accesses are resolved by the bus with read-modify-write, so the
/// device itself never sees partial registers. Reads take `&mut self`:
/// hardware registers may have read side effects.
pub trait Peripheral: std::fmt::Debug + Send {
    fn read_reg(&mut self, offset: u64) -> u32;
    fn write_reg(&mut self, offset: u64, value: u32);
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
}

/// Trait representing the system bus
pub trait Bus {
    fn read_u32(&mut self, addr: u64) -> SimResult<u32>;
    fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()>;

    fn read_u8(&mut self, addr: u64) -> SimResult<u8> {
        let word = self.read_u32(addr & !3)?;
        Ok((word >> ((addr & 3) * 8)) as u8)
    }

    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()> {
        let shift = (addr & 3) * 8;
        let mut word = self.read_u32(addr & !3)?;
        word &= !(0xFF << shift);
        word |= (value as u32) << shift;
        self.write_u32(addr & !3, word)
    }

    fn read_u16(&mut self, addr: u64) -> SimResult<u16> {
        let b0 = self.read_u8(addr)? as u16;
        let b1 = self.read_u8(addr + 1)? as u16;
        // Little Endian
        Ok(b0 | (b1 << 8))
    }

    fn write_u16(&mut self, addr: u64, value: u16) -> SimResult<()> {
        self.write_u8(addr, value as u8)?;
        self.write_u8(addr + 1, (value >> 8) as u8)
    }
}

pub struct Machine<C: Cpu> {
    pub cpu: C,
    pub bus: bus::SystemBus,
    pub observers: Vec<Arc<dyn SimulationObserver>>,
}

impl<C: Cpu> Machine<C> {
    pub fn new(cpu: C, bus: bus::SystemBus) -> Self {
        Self {
            cpu,
            bus,
            observers: Vec::new(),
        }
    }

    /// Copy the program into RAM and point the core at its entry.
    pub fn load_firmware(&mut self, image: &memory::ProgramImage) -> SimResult<()> {
        for segment in &image.segments {
            if !self.bus.ram.load_from_segment(segment) {
                tracing::warn!(
                    "Failed to load segment at {:#x} - outside of memory map",
                    segment.start_addr
                );
            }
        }

        self.reset();
        self.cpu.set_pc(image.entry_point as u32);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.cpu.reset();
    }

    pub fn step(&mut self) -> SimResult<StepOutcome> {
        self.cpu.step(&mut self.bus, &self.observers)
    }

    /// Step until the core halts, faults, or `max_steps` instructions ran.
    pub fn run(&mut self, max_steps: u64) -> RunOutcome {
        for step in 0..max_steps {
            match self.step() {
                Ok(StepOutcome::Continue) => {}
                Ok(StepOutcome::Halted) => {
                    return RunOutcome {
                        stop: StopReason::Halt,
                        steps: step + 1,
                    }
                }
                Err(e) => {
                    tracing::error!("Simulation fault at step {}: {}", step, e);
                    let stop = match e {
                        SimulationError::MemoryViolation(addr) => StopReason::MemoryViolation(addr),
                        SimulationError::DecodeError(addr) => StopReason::DecodeError(addr),
                    };
                    return RunOutcome { stop, steps: step };
                }
            }
        }
        RunOutcome {
            stop: StopReason::MaxSteps,
            steps: max_steps,
        }
    }
}
