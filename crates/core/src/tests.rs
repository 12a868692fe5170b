use crate::bus::SystemBus;
use crate::cpu::RiscV;
use crate::memory::ProgramImage;
use crate::peripherals::gpio::GpioBlock;
use crate::{Machine, StopReason};

/// The switch-to-LED monitor, hand-assembled. Same shape as the shipped
/// firmware: configure pin direction once, then poll forever.
const MIRROR_LOOP: [u32; 8] = [
    0x8000_10B7, // lui  x1, 0x80001      ; x1 = 0x8000_1000 (I/O block)
    0x0001_0137, // lui  x2, 0x10
    0xFFF1_0113, // addi x2, x2, -1       ; x2 = 0xFFFF
    0x4020_A423, // sw   x2, 0x408(x1)    ; direction <- 0xFFFF
    0x4000_A183, // lw   x3, 0x400(x1)    ; read switches
    0x0101_D193, // srli x3, x3, 16
    0x4030_A223, // sw   x3, 0x404(x1)    ; drive LEDs
    0xFF5F_F06F, // jal  x0, -12          ; poll again
];

const SETUP_STEPS: u64 = 4;
const STEPS_PER_ITERATION: u64 = 4;

fn mirror_machine() -> Machine<RiscV> {
    let mut image = ProgramImage::new(0);
    let bytes: Vec<u8> = MIRROR_LOOP.iter().flat_map(|w| w.to_le_bytes()).collect();
    image.add_segment(0, bytes);

    let mut machine = Machine::new(RiscV::new(), SystemBus::new());
    machine.load_firmware(&image).unwrap();
    machine
}

fn set_switches(machine: &mut Machine<RiscV>, value: u32) {
    machine
        .bus
        .device_mut::<GpioBlock>("gpio")
        .unwrap()
        .set_switches(value);
}

fn leds(machine: &Machine<RiscV>) -> u32 {
    machine.bus.device::<GpioBlock>("gpio").unwrap().leds()
}

fn run_steps(machine: &mut Machine<RiscV>, steps: u64) {
    for _ in 0..steps {
        machine.step().unwrap();
    }
}

#[test]
fn test_leds_mirror_upper_switch_half() {
    let mut machine = mirror_machine();
    run_steps(&mut machine, SETUP_STEPS);

    for (switches, expected) in [
        (0x1234_0000, 0x0000_1234),
        (0x0000_0000, 0x0000_0000),
        (0xFFFF_0000, 0x0000_FFFF),
        (0xFFFF_FFFF, 0x0000_FFFF),
        (0x8001_0000, 0x0000_8001),
    ] {
        set_switches(&mut machine, switches);
        run_steps(&mut machine, STEPS_PER_ITERATION);
        assert_eq!(leds(&machine), expected, "switches={:#010x}", switches);
    }
}

#[test]
fn test_lower_switch_bits_do_not_reach_leds() {
    let mut machine = mirror_machine();
    run_steps(&mut machine, SETUP_STEPS);
    set_switches(&mut machine, 0x1234_ABCD);
    run_steps(&mut machine, STEPS_PER_ITERATION);
    assert_eq!(leds(&machine), 0x0000_1234);
}

#[test]
fn test_direction_configured_once_before_polling() {
    let mut machine = mirror_machine();
    let outcome = machine.run(100);
    assert_eq!(outcome.stop, StopReason::MaxSteps);

    let gpio = machine.bus.device::<GpioBlock>("gpio").unwrap();
    assert_eq!(gpio.direction_writes(), 1);
    assert_eq!(gpio.reads_before_direction(), 0);
    assert_eq!(gpio.direction(), 0xFFFF);
    assert!(gpio.switch_reads() >= 20);
}

#[test]
fn test_polling_never_terminates() {
    for switches in [0x0000_0000, 0xFFFF_FFFF] {
        let mut machine = mirror_machine();
        set_switches(&mut machine, switches);
        let outcome = machine.run(10_000);
        assert_eq!(outcome.stop, StopReason::MaxSteps);
        assert_eq!(outcome.steps, 10_000);
    }
}

#[test]
fn test_leds_track_switch_changes() {
    let mut machine = mirror_machine();
    run_steps(&mut machine, SETUP_STEPS);

    set_switches(&mut machine, 0x1234_0000);
    run_steps(&mut machine, STEPS_PER_ITERATION);
    assert_eq!(leds(&machine), 0x1234);

    set_switches(&mut machine, 0xABCD_0000);
    run_steps(&mut machine, STEPS_PER_ITERATION);
    assert_eq!(leds(&machine), 0xABCD);
}
