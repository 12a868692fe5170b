use anyhow::{bail, Result};
use clap::Parser;
use rvgpio_config::{ScenarioAssertion, ScenarioScript, Stimulus, StopReason};
use rvgpio_core::bus::SystemBus;
use rvgpio_core::cpu::RiscV;
use rvgpio_core::metrics::PerformanceMetrics;
use rvgpio_core::peripherals::gpio::GpioBlock;
use rvgpio_core::peripherals::uart::{Uart, UartSink};
use rvgpio_core::{Machine, SimulationError, StepOutcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

fn parse_word(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|_| format!("invalid register word '{s}'"))
}

/// rvgpio Simulator: run switch-to-LED firmware against a simulated board
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the firmware ELF file
    #[arg(short, long)]
    firmware: Option<PathBuf>,

    /// Path to a board descriptor (YAML)
    #[arg(short, long)]
    board: Option<PathBuf>,

    /// Path to a scenario script (YAML) with switch stimuli and assertions
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Initial switch state, e.g. 0x12340000
    #[arg(long, value_parser = parse_word, default_value = "0")]
    switches: u32,

    /// Maximum number of steps to execute
    #[arg(long, default_value = "20000")]
    max_steps: u64,

    /// Enable instruction-level execution tracing
    #[arg(short, long)]
    trace: bool,

    /// Print run statistics at the end
    #[arg(long)]
    stats: bool,

    /// Do not echo UART output to stdout
    #[arg(long)]
    no_uart_stdout: bool,
}

struct RunReport {
    stop: StopReason,
    steps: u64,
    leds: Option<u32>,
    uart: String,
}

fn resolve_relative(anchor: &Path, target: &str) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        target.to_path_buf()
    } else {
        anchor
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(target)
    }
}

fn build_bus(board: Option<&PathBuf>) -> Result<SystemBus> {
    match board {
        Some(path) => {
            info!("Loading board descriptor: {:?}", path);
            let descriptor = rvgpio_config::BoardDescriptor::from_file(path)?;
            SystemBus::from_board(&descriptor)
        }
        None => {
            info!("Using default board configuration");
            Ok(SystemBus::new())
        }
    }
}

fn run_simulation(
    mut machine: Machine<RiscV>,
    uart_sink: Option<UartSink>,
    stimuli: &[Stimulus],
    max_steps: u64,
    wall_time: Option<Duration>,
) -> RunReport {
    let deadline = wall_time.map(|limit| Instant::now() + limit);
    let mut pending = stimuli.iter().peekable();

    let mut stop = StopReason::MaxSteps;
    let mut steps = 0;

    for step in 0..max_steps {
        while pending.peek().map_or(false, |s| s.at_step <= step) {
            let stimulus = pending.next().unwrap();
            if let Some(gpio) = machine.bus.device_mut::<GpioBlock>("gpio") {
                info!(
                    "Step {}: switches <- {:#010x}",
                    step, stimulus.switches
                );
                gpio.set_switches(stimulus.switches);
            }
        }

        if let Some(deadline) = deadline {
            if step & 0x3FF == 0 && Instant::now() >= deadline {
                stop = StopReason::WallTime;
                break;
            }
        }

        match machine.step() {
            Ok(StepOutcome::Continue) => steps = step + 1,
            Ok(StepOutcome::Halted) => {
                steps = step + 1;
                stop = StopReason::Halt;
                break;
            }
            Err(SimulationError::MemoryViolation(addr)) => {
                info!("Memory violation at {:#x} (step {})", addr, step);
                stop = StopReason::MemoryViolation;
                break;
            }
            Err(SimulationError::DecodeError(addr)) => {
                info!("Decode error at {:#x} (step {})", addr, step);
                stop = StopReason::DecodeError;
                break;
            }
        }
    }

    let leds = machine.bus.device::<GpioBlock>("gpio").map(|g| g.leds());
    let uart = uart_sink
        .map(|sink| String::from_utf8_lossy(&sink.lock().unwrap_or_else(|e| e.into_inner())).into_owned())
        .unwrap_or_default();

    RunReport {
        stop,
        steps,
        leds,
        uart,
    }
}

fn check_assertions(report: &RunReport, assertions: &[ScenarioAssertion]) -> Result<()> {
    for assertion in assertions {
        match assertion {
            ScenarioAssertion::LedsEqual(a) => {
                let leds = report
                    .leds
                    .ok_or_else(|| anyhow::anyhow!("Board has no 'gpio' peripheral to assert on"))?;
                if leds != a.leds_equal {
                    bail!(
                        "Assertion failed: LEDs are {:#010x}, expected {:#010x}",
                        leds,
                        a.leds_equal
                    );
                }
            }
            ScenarioAssertion::UartContains(a) => {
                if !report.uart.contains(&a.uart_contains) {
                    bail!(
                        "Assertion failed: UART output does not contain {:?}",
                        a.uart_contains
                    );
                }
            }
            ScenarioAssertion::ExpectedStopReason(a) => {
                if report.stop != a.expected_stop_reason {
                    bail!(
                        "Assertion failed: stopped with {:?}, expected {:?}",
                        report.stop,
                        a.expected_stop_reason
                    );
                }
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    info!("Starting rvgpio Simulator");

    let scenario = match &args.scenario {
        Some(path) => {
            info!("Loading scenario script: {:?}", path);
            Some((ScenarioScript::from_file(path)?, path.clone()))
        }
        None => None,
    };

    let firmware_path = match (&scenario, &args.firmware) {
        (Some((script, script_path)), _) => resolve_relative(script_path, &script.inputs.firmware),
        (None, Some(path)) => path.clone(),
        (None, None) => bail!("No firmware given: pass --firmware or --scenario"),
    };

    let board_path = scenario
        .as_ref()
        .and_then(|(script, script_path)| {
            script
                .inputs
                .board
                .as_ref()
                .map(|b| resolve_relative(script_path, b))
        })
        .or_else(|| args.board.clone());

    let mut bus = build_bus(board_path.as_ref())?;
    let uart_sink = bus.device::<Uart>("uart").map(|u| u.sink());

    if args.switches != 0 {
        if let Some(gpio) = bus.device_mut::<GpioBlock>("gpio") {
            gpio.set_switches(args.switches);
        }
    }

    info!("Loading firmware: {:?}", firmware_path);
    let program = rvgpio_loader::load_elf(&firmware_path)?;
    info!("Entry Point: {:#x}", program.entry_point);

    let mut machine = Machine::new(RiscV::new(), bus);
    machine
        .load_firmware(&program)
        .map_err(|e| anyhow::anyhow!("Failed to load firmware into memory: {e}"))?;

    let metrics = if args.stats {
        let metrics = Arc::new(PerformanceMetrics::new());
        machine.observers.push(metrics.clone());
        Some(metrics)
    } else {
        None
    };

    let (max_steps, wall_time, stimuli, assertions) = match &scenario {
        Some((script, _)) => (
            script.limits.max_steps,
            script.limits.wall_time_ms.map(Duration::from_millis),
            script.stimuli.clone(),
            script.assertions.clone(),
        ),
        None => (args.max_steps, None, Vec::new(), Vec::new()),
    };

    info!("Running for up to {} steps...", max_steps);
    let report = run_simulation(machine, uart_sink, &stimuli, max_steps, wall_time);

    info!(
        "Stopped after {} steps: {:?}",
        report.steps, report.stop
    );
    if let Some(leds) = report.leds {
        info!("Final LED state: {:#010x}", leds);
    }
    if !report.uart.is_empty() && !args.no_uart_stdout {
        print!("{}", report.uart);
    }

    if let Some(metrics) = metrics {
        info!(
            "Executed {} instructions ({:.0} steps/s)",
            metrics.instructions(),
            metrics.instructions_per_second()
        );
    }

    check_assertions(&report, &assertions)?;
    if !assertions.is_empty() {
        info!("All {} assertions passed", assertions.len());
    }

    Ok(())
}
