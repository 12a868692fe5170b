//! Switch-to-LED monitor firmware.
//!
//! Mirrors the physical switch bank onto the LED row: the switch state sits
//! in the upper 16 bits of the GPIO input register, the LEDs are driven by
//! the lower 16 bits of the output register. Plain polling, no interrupts.

#![no_std]
#![no_main]

use panic_halt as _;
use riscv_rt::entry;

// GPIO block of the target SoC.
const GPIO_SWITCHES: *const u32 = 0x8000_1400 as *const u32;
const GPIO_LEDS: *mut u32 = 0x8000_1404 as *mut u32;
const GPIO_DIRECTION: *mut u32 = 0x8000_1408 as *mut u32;

/// Output-enable mask for the 16 LED pins.
const LED_PINS_OUTPUT: u32 = 0xFFFF;

#[entry]
fn main() -> ! {
    // Pin direction is configured exactly once, before the first poll.
    unsafe { core::ptr::write_volatile(GPIO_DIRECTION, LED_PINS_OUTPUT) };

    loop {
        let switches = unsafe { core::ptr::read_volatile(GPIO_SWITCHES) };
        unsafe { core::ptr::write_volatile(GPIO_LEDS, switches >> 16) };
    }
}
