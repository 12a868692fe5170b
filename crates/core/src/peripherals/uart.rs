use crate::Peripheral;
use std::any::Any;
use std::sync::{Arc, Mutex};

const REG_THR: u64 = 0x00;
const REG_LSR: u64 = 0x14;

// LSR: transmitter holding register empty + transmitter empty.
const LSR_IDLE: u32 = 0x60;

pub type UartSink = Arc<Mutex<Vec<u8>>>;

/// Minimal 16550-style UART model.
///
/// Bytes stored to the transmit register land in a shared sink the host can
/// inspect after a run. The line status register always reports an idle
/// transmitter so polling writers never stall.
#[derive(Debug, Default)]
pub struct Uart {
    sink: UartSink,
}

impl Uart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> UartSink {
        self.sink.clone()
    }
}

impl Peripheral for Uart {
    fn read_reg(&mut self, offset: u64) -> u32 {
        match offset {
            REG_LSR => LSR_IDLE,
            _ => 0,
        }
    }

    fn write_reg(&mut self, offset: u64, value: u32) {
        if offset == REG_THR {
            if let Ok(mut sink) = self.sink.lock() {
                sink.push(value as u8);
            }
        }
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_collects_bytes() {
        let mut uart = Uart::new();
        let sink = uart.sink();
        for b in b"OK\n" {
            uart.write_reg(REG_THR, *b as u32);
        }
        assert_eq!(sink.lock().unwrap().as_slice(), b"OK\n");
    }

    #[test]
    fn test_lsr_reports_idle() {
        let mut uart = Uart::new();
        assert_eq!(uart.read_reg(REG_LSR) & LSR_IDLE, LSR_IDLE);
    }
}
