use crate::memory::LinearMemory;
use crate::peripherals::gpio::GpioBlock;
use crate::peripherals::uart::Uart;
use crate::{Bus, Peripheral, SimResult, SimulationError};

// Default board layout: program RAM at the bottom of the address space,
// I/O block in the upper half, mirroring the FPGA SoC this firmware targets.
pub const RAM_BASE: u64 = 0x0000_0000;
pub const DEFAULT_RAM_SIZE: usize = 64 * 1024;
pub const GPIO_BASE: u64 = 0x8000_1400;
pub const UART_BASE: u64 = 0x8000_2000;

#[derive(Debug)]
pub struct PeripheralEntry {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub dev: Box<dyn Peripheral>,
}

#[derive(Debug)]
pub struct SystemBus {
    pub ram: LinearMemory,
    pub peripherals: Vec<PeripheralEntry>,
}

impl SystemBus {
    pub fn new() -> Self {
        let mut bus = Self {
            ram: LinearMemory::new(DEFAULT_RAM_SIZE, RAM_BASE),
            peripherals: Vec::new(),
        };
        bus.attach("gpio", GPIO_BASE, 0x10, Box::new(GpioBlock::new()));
        bus.attach("uart", UART_BASE, 0x20, Box::new(Uart::new()));
        bus
    }

    pub fn attach(&mut self, name: &str, base: u64, size: u64, dev: Box<dyn Peripheral>) {
        self.peripherals.push(PeripheralEntry {
            name: name.to_string(),
            base,
            size,
            dev,
        });
    }

    /// Build a bus from a YAML board descriptor.
    pub fn from_board(board: &rvgpio_config::BoardDescriptor) -> anyhow::Result<Self> {
        let ram_size = rvgpio_config::parse_size(&board.ram.size)?;
        let mut bus = Self {
            ram: LinearMemory::new(ram_size as usize, board.ram.base),
            peripherals: Vec::new(),
        };

        for p in &board.peripherals {
            let (dev, default_size): (Box<dyn Peripheral>, u64) = match p.r#type.as_str() {
                "gpio" => (Box::new(GpioBlock::new()), 0x10),
                "uart" => (Box::new(Uart::new()), 0x20),
                other => anyhow::bail!("Unknown peripheral type '{}' in board '{}'", other, board.name),
            };
            let size = match &p.size {
                Some(s) => rvgpio_config::parse_size(s)?,
                None => default_size,
            };
            bus.attach(&p.id, p.base_address, size, dev);
        }

        Ok(bus)
    }

    /// Borrow an attached peripheral by name, downcast to its concrete type.
    pub fn device<T: 'static>(&self, name: &str) -> Option<&T> {
        self.peripherals
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.dev.as_any())
            .and_then(|a| a.downcast_ref::<T>())
    }

    pub fn device_mut<T: 'static>(&mut self, name: &str) -> Option<&mut T> {
        self.peripherals
            .iter_mut()
            .find(|p| p.name == name)
            .and_then(|p| p.dev.as_any_mut())
            .and_then(|a| a.downcast_mut::<T>())
    }
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for SystemBus {
    fn read_u32(&mut self, addr: u64) -> SimResult<u32> {
        if self.ram.contains(addr) {
            let mut word = 0u32;
            for i in 0..4 {
                let byte = self
                    .ram
                    .read_u8(addr + i)
                    .ok_or(SimulationError::MemoryViolation(addr))?;
                word |= (byte as u32) << (i * 8);
            }
            return Ok(word);
        }

        if let Some(p) = self
            .peripherals
            .iter_mut()
            .find(|p| addr >= p.base && addr < p.base + p.size)
        {
            return Ok(p.dev.read_reg((addr - p.base) & !3));
        }

        Err(SimulationError::MemoryViolation(addr))
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        if self.ram.contains(addr) {
            for i in 0..4 {
                if !self.ram.write_u8(addr + i, (value >> (i * 8)) as u8) {
                    return Err(SimulationError::MemoryViolation(addr));
                }
            }
            return Ok(());
        }

        if let Some(p) = self
            .peripherals
            .iter_mut()
            .find(|p| addr >= p.base && addr < p.base + p.size)
        {
            p.dev.write_reg((addr - p.base) & !3, value);
            return Ok(());
        }

        Err(SimulationError::MemoryViolation(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bus;

    #[test]
    fn test_unmapped_access() {
        let mut bus = SystemBus::new();
        match bus.read_u32(0xDEAD_0000) {
            Err(SimulationError::MemoryViolation(addr)) => assert_eq!(addr, 0xDEAD_0000),
            other => panic!("expected violation, got {:?}", other.ok()),
        }
        assert!(bus.write_u32(0xDEAD_0000, 1).is_err());
    }

    #[test]
    fn test_ram_words_little_endian() {
        let mut bus = SystemBus::new();
        bus.write_u32(0x100, 0xDEAD_BEEF).unwrap();
        assert_eq!(bus.read_u8(0x100).unwrap(), 0xEF);
        assert_eq!(bus.read_u8(0x103).unwrap(), 0xDE);
        assert_eq!(bus.read_u16(0x102).unwrap(), 0xDEAD);
        assert_eq!(bus.read_u32(0x100).unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn test_peripheral_window_routing() {
        let mut bus = SystemBus::new();
        bus.write_u32(GPIO_BASE + 0x4, 0x1234).unwrap();
        assert_eq!(bus.read_u32(GPIO_BASE + 0x4).unwrap(), 0x1234);
        // One past the GPIO window is unmapped.
        assert!(bus.read_u32(GPIO_BASE + 0x10).is_err());
    }

    #[test]
    fn test_from_board() {
        let yaml = r#"
name: "rvfpga"
arch: "rv32i"
ram:
  base: 0
  size: "32KiB"
peripherals:
  - id: "gpio0"
    type: "gpio"
    base_address: 0x80001400
"#;
        let board: rvgpio_config::BoardDescriptor = serde_yaml::from_str(yaml).unwrap();
        let mut bus = SystemBus::from_board(&board).unwrap();
        assert_eq!(bus.ram.data.len(), 32 * 1024);
        assert!(bus.read_u32(0x8000_1400).is_ok());
        // No UART on this board.
        assert!(bus.read_u32(UART_BASE).is_err());
    }

    #[test]
    fn test_from_board_unknown_type() {
        let yaml = r#"
name: "bad"
arch: "rv32i"
ram:
  base: 0
  size: "4KiB"
peripherals:
  - id: "dma0"
    type: "dma"
    base_address: 0x90000000
"#;
        let board: rvgpio_config::BoardDescriptor = serde_yaml::from_str(yaml).unwrap();
        let err = SystemBus::from_board(&board).unwrap_err();
        assert!(err.to_string().contains("Unknown peripheral type"));
    }
}
