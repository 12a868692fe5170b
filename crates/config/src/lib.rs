use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MemoryRange {
    pub base: u64,
    pub size: String, // e.g. "64KB"
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PeripheralConfig {
    pub id: String,
    pub r#type: String, // "gpio", "uart"
    pub base_address: u64,
    #[serde(default)]
    pub size: Option<String>,
}

/// Describes a target board: one RAM region plus memory-mapped peripherals.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BoardDescriptor {
    pub name: String,
    pub arch: String, // e.g. "rv32i"
    pub ram: MemoryRange,
    pub peripherals: Vec<PeripheralConfig>,
}

impl BoardDescriptor {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open board descriptor at {:?}", path.as_ref()))?;
        serde_yaml::from_reader(f).context("Failed to parse Board Descriptor")
    }
}

/// Register words in scenario files may be plain integers or "0x…" strings.
pub mod word {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(u32),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Repr::deserialize(deserializer)? {
            Repr::Num(n) => Ok(n),
            Repr::Text(s) => {
                let s = s.trim();
                let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                    u32::from_str_radix(hex, 16)
                } else {
                    s.parse()
                };
                parsed.map_err(|_| serde::de::Error::custom(format!("invalid register word '{s}'")))
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ScenarioInputs {
    pub firmware: String,
    pub board: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ScenarioLimits {
    pub max_steps: u64,
    #[serde(default)]
    pub wall_time_ms: Option<u64>,
}

/// A switch state applied to the board right before the given step executes.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Stimulus {
    pub at_step: u64,
    #[serde(deserialize_with = "word::deserialize")]
    pub switches: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxSteps,
    WallTime,
    MemoryViolation,
    DecodeError,
    Halt,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LedsEqualAssertion {
    #[serde(deserialize_with = "word::deserialize")]
    pub leds_equal: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct UartContainsAssertion {
    pub uart_contains: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct StopReasonAssertion {
    pub expected_stop_reason: StopReason,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum ScenarioAssertion {
    LedsEqual(LedsEqualAssertion),
    UartContains(UartContainsAssertion),
    ExpectedStopReason(StopReasonAssertion),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ScenarioScript {
    pub schema_version: String,
    pub inputs: ScenarioInputs,
    pub limits: ScenarioLimits,
    #[serde(default)]
    pub stimuli: Vec<Stimulus>,
    #[serde(default)]
    pub assertions: Vec<ScenarioAssertion>,
}

impl ScenarioScript {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open scenario script at {:?}", path.as_ref()))?;
        let script: Self = serde_yaml::from_reader(f).context("Failed to parse Scenario YAML")?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        if self.inputs.firmware.trim().is_empty() {
            anyhow::bail!("Input 'firmware' path cannot be empty");
        }

        if self.limits.max_steps == 0 {
            anyhow::bail!("Limit 'max_steps' must be greater than zero");
        }

        let sorted = self.stimuli.windows(2).all(|w| w[0].at_step <= w[1].at_step);
        if !sorted {
            anyhow::bail!("Stimuli must be ordered by 'at_step'");
        }

        Ok(())
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}
