mod config;
mod messages;
mod port;

use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Mutex, PoisonError};
use anyhow::Context;
use serialfmt::{DataFormat, LineBuffer};
use tokio::sync::oneshot::error::TryRecvError;
use crate::MAX_MESSAGE_SIZE;

pub use config::{FlowControl, Parity, SerialConnectionConfig};
pub use messages::{Direction, RenderedMessage, SerialMessage};
pub use port::{available_ports, PortInfo, PortOpener, PortReader, PortWriter, SystemPorts};
#[cfg(test)]
pub(crate) use port::memory;

/// An open serial port: a reader thread that logs received data and a writer for sends.
pub struct SerialSession {
    opener: Arc<dyn PortOpener>,
    port_name: String,
    config: SerialConnectionConfig,
    tx: tokio::sync::mpsc::Sender<SerialMessage>,
    link: Option<Link>,
}

struct Link {
    writer: Arc<Mutex<PortWriter>>,
    tx_close: tokio::sync::oneshot::Sender<()>,
    jh: tokio::task::JoinHandle<()>,
}

impl Link {
    async fn open(
        opener: &Arc<dyn PortOpener>,
        port_name: &str,
        config: &SerialConnectionConfig,
        tx: tokio::sync::mpsc::Sender<SerialMessage>,
    ) -> anyhow::Result<Self> {
        let (reader, writer) = {
            let opener = opener.clone();
            let name = port_name.to_string();
            let config = config.clone();
            match tokio::task::spawn_blocking(move || opener.open(&name, &config)).await {
                Ok(v) => v?,
                Err(err) => anyhow::bail!("Panicked, whilst trying to open {port_name}: {err}"),
            }
        };
        let (tx_close, rx_close) = tokio::sync::oneshot::channel();
        let jh = {
            let lines = LineBuffer::new(config.read_delimiter(), MAX_MESSAGE_SIZE);
            let format = config.display_format;
            let port_name = port_name.to_string();
            tokio::task::spawn_blocking(move || read_loop(reader, rx_close, tx, lines, format, &port_name))
        };
        Ok(Link {
            writer: Arc::new(Mutex::new(writer)),
            tx_close,
            jh,
        })
    }

    /// Stops the reader and waits until it has flushed and released the port.
    async fn close(self) {
        self.tx_close.send(()).ok();
        if let Err(err) = self.jh.await {
            tracing::error!("Reader thread ended abnormally: {err}");
        }
    }
}

/// Reads until closed, on a blocking thread of its own.
///
/// The close signal is checked between reads, so a read in progress always completes
/// and its bytes are logged. A dropped sender counts as closed. The reader is
/// dropped on return, which frees the port for the next open.
fn read_loop(
    mut reader: PortReader,
    mut rx_close: tokio::sync::oneshot::Receiver<()>,
    tx: tokio::sync::mpsc::Sender<SerialMessage>,
    mut lines: LineBuffer,
    format: DataFormat,
    port_name: &str,
) {
    let mut buf = vec![0u8; MAX_MESSAGE_SIZE];
    'read: while matches!(rx_close.try_recv(), Err(TryRecvError::Empty)) {
        let chunk = match reader.read(&mut buf) {
            Ok(0) => continue,
            Ok(len) => &buf[..len],
            Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted) => continue,
            Err(err) => {
                tracing::error!("Failed to read from {port_name}: {err}");
                break;
            }
        };
        tracing::trace!(port = %port_name, len = chunk.len(), "read");
        for frame in lines.feed(chunk) {
            if tx.blocking_send(SerialMessage::received(frame, format)).is_err() {
                tracing::debug!("Message channel closed, stopping reader for {port_name}");
                break 'read;
            }
        }
    }
    if let Some(rest) = lines.flush() {
        tx.blocking_send(SerialMessage::received(rest, format)).ok();
    }
    tracing::debug!("Reader for {port_name} stopped");
}

impl SerialSession {
    /// Opens `port_name` and starts logging received data into `tx`.
    pub async fn open(
        opener: Arc<dyn PortOpener>,
        port_name: &str,
        config: SerialConnectionConfig,
        tx: tokio::sync::mpsc::Sender<SerialMessage>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let link = Link::open(&opener, port_name, &config, tx.clone()).await?;
        tracing::info!(port = %port_name, baud = config.baud_rate, "Serial port opened");
        Ok(Self {
            opener,
            port_name: port_name.to_string(),
            config,
            tx,
            link: Some(link),
        })
    }

    pub fn port_name(&self) -> &str { &self.port_name }
    pub const fn config(&self) -> &SerialConnectionConfig { &self.config }
    pub const fn is_open(&self) -> bool { self.link.is_some() }

    /// Parses `input` in `format`, appends the configured line ending and writes it.
    pub async fn send(&self, input: &str, format: DataFormat) -> anyhow::Result<SerialMessage> {
        let link = self.link.as_ref().context("Serial port is closed")?;
        let payload = match serialfmt::string_to_bytes(input, format) {
            Ok(v) => v,
            Err(err) => anyhow::bail!("Failed to parse {format} input: {err}"),
        };
        let payload = self.config.line_ending.apply(payload);
        if payload.is_empty() {
            anyhow::bail!("Nothing to send");
        }
        let writer = link.writer.clone();
        let data = payload.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut writer = writer.lock().unwrap_or_else(PoisonError::into_inner);
            writer.write_all(&data)?;
            writer.flush()
        }).await;
        match result {
            Ok(Ok(())) => (),
            Ok(Err(err)) => anyhow::bail!("Failed to write to {}: {err}", self.port_name),
            Err(err) => anyhow::bail!("Panicked, whilst trying to write to {}: {err}", self.port_name),
        }
        tracing::debug!(port = %self.port_name, len = payload.len(), "wrote");
        Ok(SerialMessage::sent(payload, format, input.to_string()))
    }

    /// Replaces the configuration by reopening the port with `config`.
    ///
    /// If reopening fails the session stays closed.
    pub async fn reconfigure(&mut self, config: SerialConnectionConfig) -> anyhow::Result<()> {
        config.validate()?;
        if let Some(link) = self.link.take() {
            link.close().await;
        }
        let link = Link::open(&self.opener, &self.port_name, &config, self.tx.clone()).await?;
        self.link = Some(link);
        self.config = config;
        tracing::info!(port = %self.port_name, baud = self.config.baud_rate, "Serial port reconfigured");
        Ok(())
    }

    pub async fn close(mut self) {
        if let Some(link) = self.link.take() {
            link.close().await;
        }
        tracing::info!(port = %self.port_name, "Serial port closed");
    }
}
