use serialfmt::{DataFormat, LineEnding};
use crate::session::{FlowControl, Parity, SerialConnectionConfig};

#[derive(clap_derive::Parser, Debug, Clone)]
pub struct Options {
    #[arg(long, default_value = "false")]
    ///Prints the current version. Version is set via the crate version.
    version: bool,
    #[arg(long, default_value = "false")]
    ///Prints all serial ports found on this machine as JSON, one per line
    list: bool,
    #[arg(short, long)]
    ///Serial port to open on start, e.g. /dev/ttyUSB0 or COM3. Without --websocket this starts the console
    device: Option<String>,
    #[arg(short, long, default_value = "115200")]
    ///Baud rate
    baud: u32,
    #[arg(long, default_value = "lf")]
    ///Line ending appended to every write: none, cr, lf or crlf
    line_ending: LineEnding,
    #[arg(long, default_value = "false")]
    ///Collect received bytes until the delimiter before logging them as one message
    read_until: bool,
    #[arg(long, default_value = "lf")]
    ///Delimiter for --read-until: cr, lf or crlf
    delimiter: LineEnding,
    #[arg(long, default_value = "8")]
    ///Data bits, 5 to 8
    data_bits: u8,
    #[arg(long, default_value = "none")]
    ///Parity: none, odd or even
    parity: Parity,
    #[arg(long, default_value = "1")]
    ///Stop bits, 1 or 2
    stop_bits: u8,
    #[arg(long, default_value = "none")]
    ///Flow control: none, software or hardware
    flow_control: FlowControl,
    #[arg(long, default_value = "100")]
    ///Read timeout in milliseconds
    timeout_ms: u64,
    #[arg(short, long, default_value = "utf8")]
    ///Format received data is shown in: hex, binary, ascii, decimal, utf8 or base64
    format: DataFormat,
    #[arg(short, long, default_value = "utf8")]
    ///Format typed input is parsed in
    input_format: DataFormat,
    #[arg(long, default_value = "1000")]
    ///Number of messages kept in the history
    history: usize,
    #[arg(short, long, default_value = "false")]
    ///Add extra for debugging information
    verbose: bool,
    #[arg(short, long, default_value = "false")]
    ///Starts the websocket server for browser clients
    websocket: bool,
    #[arg(short, long, default_value = "8080")]
    ///Sets the port for the websocket to start on.
    port: u16,
}
impl Options{
    pub const fn version(&self) -> bool { self.version }
    pub const fn list(&self) -> bool { self.list }
    pub fn device(&self) -> Option<&str> { self.device.as_deref() }
    pub const fn input_format(&self) -> DataFormat { self.input_format }
    pub const fn history(&self) -> usize { self.history }
    pub const fn verbose(&self) -> bool { self.verbose }
    pub const fn websocket(&self) -> bool { self.websocket }
    pub const fn port(&self) -> u16 { self.port }

    pub fn connection_config(&self) -> SerialConnectionConfig {
        SerialConnectionConfig {
            baud_rate: self.baud,
            line_ending: self.line_ending,
            read_until_line_ending: self.read_until,
            delimiter: self.delimiter,
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
            flow_control: self.flow_control,
            read_timeout: std::time::Duration::from_millis(self.timeout_ms),
            display_format: self.format,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::try_parse_from(["serial-terminal-server"]).unwrap();
        assert_eq!(options.connection_config(), SerialConnectionConfig::default());
        assert_eq!(options.input_format(), DataFormat::Utf8);
        assert_eq!(options.port(), 8080);
        assert_eq!(options.device(), None);
        assert!(!options.websocket());
    }

    #[test]
    fn test_connection_flags() {
        let options = Options::try_parse_from([
            "serial-terminal-server",
            "--device", "/dev/ttyACM0",
            "--baud", "9600",
            "--line-ending", "crlf",
            "--read-until",
            "--delimiter", "cr",
            "--parity", "even",
            "--format", "hex",
            "--input-format", "decimal",
            "-w", "-p", "9000",
        ]).unwrap();
        let config = options.connection_config();
        assert_eq!(options.device(), Some("/dev/ttyACM0"));
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.line_ending, LineEnding::CrLf);
        assert!(config.read_until_line_ending);
        assert_eq!(config.delimiter, LineEnding::Cr);
        assert_eq!(config.parity, Parity::Even);
        assert_eq!(config.display_format, DataFormat::Hex);
        assert_eq!(options.input_format(), DataFormat::Decimal);
        assert!(options.websocket());
        assert_eq!(options.port(), 9000);
    }

    #[test]
    fn test_rejects_unknown_format() {
        assert!(Options::try_parse_from(["serial-terminal-server", "--format", "ebcdic"]).is_err());
    }
}
