use std::str::FromStr;
use std::time::Duration;
use serde_with::serde_as;
use serialfmt::{DataFormat, LineEnding};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde_derive::Serialize, serde_derive::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}
impl Parity {
    pub const fn to_serialport(self) -> serialport::Parity {
        match self {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}
impl FromStr for Parity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "n" => Ok(Parity::None),
            "odd" | "o" => Ok(Parity::Odd),
            "even" | "e" => Ok(Parity::Even),
            _ => anyhow::bail!("Unknown parity '{s}', expected none, odd or even"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde_derive::Serialize, serde_derive::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    #[default]
    None,
    Software,
    Hardware,
}
impl FlowControl {
    pub const fn to_serialport(self) -> serialport::FlowControl {
        match self {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}
impl FromStr for FlowControl {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(FlowControl::None),
            "software" | "xonxoff" => Ok(FlowControl::Software),
            "hardware" | "rtscts" => Ok(FlowControl::Hardware),
            _ => anyhow::bail!("Unknown flow control '{s}', expected none, software or hardware"),
        }
    }
}

/// Settings of one connection. Replaced as a whole on reconfiguration.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, serde_derive::Serialize, serde_derive::Deserialize)]
#[serde(default)]
pub struct SerialConnectionConfig {
    pub baud_rate: u32,
    /// Appended to every write.
    pub line_ending: LineEnding,
    /// Collect received bytes until `delimiter` before logging them as one message.
    pub read_until_line_ending: bool,
    pub delimiter: LineEnding,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
    pub flow_control: FlowControl,
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    #[serde(rename = "read_timeout_ms")]
    pub read_timeout: Duration,
    /// Format received messages are rendered in.
    pub display_format: DataFormat,
}
impl Default for SerialConnectionConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            line_ending: LineEnding::Lf,
            read_until_line_ending: false,
            delimiter: LineEnding::Lf,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            flow_control: FlowControl::None,
            read_timeout: Duration::from_millis(100),
            display_format: DataFormat::Utf8,
        }
    }
}
impl SerialConnectionConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.baud_rate == 0 {
            anyhow::bail!("Baud rate must be greater than 0");
        }
        if self.read_until_line_ending && self.delimiter == LineEnding::None {
            anyhow::bail!("Reading until a line ending needs a delimiter other than none");
        }
        if self.read_timeout.is_zero() {
            anyhow::bail!("Read timeout must be greater than 0");
        }
        self.serialport_data_bits()?;
        self.serialport_stop_bits()?;
        Ok(())
    }

    pub fn serialport_data_bits(&self) -> anyhow::Result<serialport::DataBits> {
        match self.data_bits {
            5 => Ok(serialport::DataBits::Five),
            6 => Ok(serialport::DataBits::Six),
            7 => Ok(serialport::DataBits::Seven),
            8 => Ok(serialport::DataBits::Eight),
            bits => anyhow::bail!("Data bits must be between 5 and 8, got {bits}"),
        }
    }

    pub fn serialport_stop_bits(&self) -> anyhow::Result<serialport::StopBits> {
        match self.stop_bits {
            1 => Ok(serialport::StopBits::One),
            2 => Ok(serialport::StopBits::Two),
            bits => anyhow::bail!("Stop bits must be 1 or 2, got {bits}"),
        }
    }

    /// Delimiter the reader frames on, `None` when every read is logged as it arrives.
    pub const fn read_delimiter(&self) -> LineEnding {
        if self.read_until_line_ending { self.delimiter } else { LineEnding::None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SerialConnectionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.read_delimiter(), LineEnding::None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = SerialConnectionConfig { baud_rate: 0, ..Default::default() };
        assert!(config.validate().is_err());
        let config = SerialConnectionConfig { data_bits: 9, ..Default::default() };
        assert!(config.validate().is_err());
        let config = SerialConnectionConfig { stop_bits: 3, ..Default::default() };
        assert!(config.validate().is_err());
        let config = SerialConnectionConfig {
            read_until_line_ending: true,
            delimiter: LineEnding::None,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_read_delimiter_follows_flag() {
        let config = SerialConnectionConfig {
            read_until_line_ending: true,
            delimiter: LineEnding::CrLf,
            ..Default::default()
        };
        assert_eq!(config.read_delimiter(), LineEnding::CrLf);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SerialConnectionConfig = serde_json::from_str(
            r#"{"baud_rate": 9600, "line_ending": "crlf", "parity": "even", "read_timeout_ms": 250}"#,
        ).unwrap();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.line_ending, LineEnding::CrLf);
        assert_eq!(config.parity, Parity::Even);
        assert_eq!(config.read_timeout, Duration::from_millis(250));
        assert_eq!(config.data_bits, 8);
        assert_eq!(config.display_format, DataFormat::Utf8);
    }

    #[test]
    fn test_serialized_timeout_is_milliseconds() {
        let json = serde_json::to_value(SerialConnectionConfig::default()).unwrap();
        assert_eq!(json["read_timeout_ms"], 100);
        assert_eq!(json["flow_control"], "none");
    }

    #[test]
    fn test_parity_and_flow_control_from_str() {
        assert_eq!("E".parse::<Parity>().unwrap(), Parity::Even);
        assert!("mark".parse::<Parity>().is_err());
        assert_eq!("rtscts".parse::<FlowControl>().unwrap(), FlowControl::Hardware);
        assert!(matches!(Parity::Odd.to_serialport(), serialport::Parity::Odd));
        assert!(matches!(FlowControl::Software.to_serialport(), serialport::FlowControl::Software));
    }
}
