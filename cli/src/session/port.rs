use crate::session::config::SerialConnectionConfig;

pub type PortReader = Box<dyn std::io::Read + Send>;
pub type PortWriter = Box<dyn std::io::Write + Send>;

/// Access to serial ports: enumeration, and opening a port as an independent
/// reader and writer pair.
pub trait PortOpener: Send + Sync {
    fn open(&self, port_name: &str, config: &SerialConnectionConfig) -> anyhow::Result<(PortReader, PortWriter)>;
    fn available_ports(&self) -> anyhow::Result<Vec<PortInfo>>;
}

pub struct SystemPorts;

impl PortOpener for SystemPorts {
    fn open(&self, port_name: &str, config: &SerialConnectionConfig) -> anyhow::Result<(PortReader, PortWriter)> {
        let port = match serialport::new(port_name, config.baud_rate)
            .data_bits(config.serialport_data_bits()?)
            .parity(config.parity.to_serialport())
            .stop_bits(config.serialport_stop_bits()?)
            .flow_control(config.flow_control.to_serialport())
            .timeout(config.read_timeout)
            .open()
        {
            Ok(v) => v,
            Err(err) => anyhow::bail!("Failed to open serial port {port_name}: {err}"),
        };
        let reader = match port.try_clone() {
            Ok(v) => v,
            Err(err) => anyhow::bail!("Failed to clone serial port handle for {port_name}: {err}"),
        };
        Ok((Box::new(reader), Box::new(port)))
    }

    fn available_ports(&self) -> anyhow::Result<Vec<PortInfo>> {
        available_ports()
    }
}

#[derive(Debug, Clone, serde_derive::Serialize, serde_derive::Deserialize)]
pub struct PortInfo {
    name: String,
    kind: String,
    vid: Option<u16>,
    pid: Option<u16>,
    manufacturer: Option<String>,
    product: Option<String>,
    serial_number: Option<String>,
}
impl PortInfo {
    pub fn name(&self) -> &str { &self.name }
}
impl From<serialport::SerialPortInfo> for PortInfo {
    fn from(info: serialport::SerialPortInfo) -> Self {
        let mut port = PortInfo {
            name: info.port_name,
            kind: String::new(),
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
            serial_number: None,
        };
        port.kind = match info.port_type {
            serialport::SerialPortType::UsbPort(usb) => {
                port.vid = Some(usb.vid);
                port.pid = Some(usb.pid);
                port.manufacturer = usb.manufacturer;
                port.product = usb.product;
                port.serial_number = usb.serial_number;
                "usb"
            }
            serialport::SerialPortType::PciPort => "pci",
            serialport::SerialPortType::BluetoothPort => "bluetooth",
            serialport::SerialPortType::Unknown => "unknown",
        }.to_string();
        port
    }
}

pub fn available_ports() -> anyhow::Result<Vec<PortInfo>> {
    match serialport::available_ports() {
        Ok(ports) => Ok(ports.into_iter().map(PortInfo::from).collect()),
        Err(err) => anyhow::bail!("Failed to enumerate serial ports: {err}"),
    }
}
