mod history;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use anyhow::Context;
use serialfmt::DataFormat;
use tokio::sync::{broadcast, mpsc};
use crate::clipboard::{self, Clipboard};
use crate::session::{PortInfo, PortOpener, RenderedMessage, SerialConnectionConfig, SerialMessage, SerialSession};

pub use history::MessageHistory;

pub type SharedTerminal = Arc<tokio::sync::RwLock<Terminal>>;

const MESSAGE_QUEUE: usize = 1024;
const EVENT_QUEUE: usize = 1024;

/// Everything clients are told about. Serialized as JSON tagged by `event`.
#[derive(Debug, Clone, serde_derive::Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TerminalEvent {
    Message { message: RenderedMessage },
    History { messages: Vec<RenderedMessage> },
    Ports { ports: Vec<PortInfo> },
    Connected { port: String, config: SerialConnectionConfig },
    Disconnected { port: String },
    Configured { config: SerialConnectionConfig },
    Cleared,
    Copied { id: uuid::Uuid },
    Error { message: String },
}

struct MessageLog {
    history: Mutex<MessageHistory>,
    events: broadcast::Sender<TerminalEvent>,
}
impl MessageLog {
    fn lock(&self) -> MutexGuard<'_, MessageHistory> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
    fn record(&self, message: SerialMessage) {
        let rendered = message.render();
        self.lock().push(message);
        self.publish(TerminalEvent::Message { message: rendered });
    }
    fn publish(&self, event: TerminalEvent) {
        // No subscribers is not an error.
        self.events.send(event).ok();
    }
}

async fn forward(mut rx: mpsc::Receiver<SerialMessage>, log: Arc<MessageLog>) {
    while let Some(message) = rx.recv().await {
        log.record(message);
    }
}

/// The terminal: at most one open session, the shared message history and the clipboard.
pub struct Terminal {
    opener: Arc<dyn PortOpener>,
    clipboard: Box<dyn Clipboard>,
    session: Option<SerialSession>,
    config: SerialConnectionConfig,
    input_format: DataFormat,
    log: Arc<MessageLog>,
}

impl Terminal {
    pub fn new(
        opener: Arc<dyn PortOpener>,
        clipboard: Box<dyn Clipboard>,
        config: SerialConnectionConfig,
        input_format: DataFormat,
        history_capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_QUEUE);
        Self {
            opener,
            clipboard,
            session: None,
            config,
            input_format,
            log: Arc::new(MessageLog {
                history: Mutex::new(MessageHistory::new(history_capacity)),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TerminalEvent> {
        self.log.events.subscribe()
    }
    pub const fn config(&self) -> &SerialConnectionConfig { &self.config }
    pub const fn input_format(&self) -> DataFormat { self.input_format }
    pub fn port_name(&self) -> Option<&str> {
        self.session.as_ref().map(SerialSession::port_name)
    }
    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(SerialSession::is_open)
    }
    /// Messages held and the most the history keeps.
    pub fn history_usage(&self) -> (usize, usize) {
        let history = self.log.lock();
        (history.len(), history.capacity())
    }

    /// Opens `port_name`, closing any previous session first.
    pub async fn connect(&mut self, port_name: &str, config: SerialConnectionConfig) -> anyhow::Result<()> {
        if let Some(session) = self.session.take() {
            let port = session.port_name().to_string();
            session.close().await;
            self.log.publish(TerminalEvent::Disconnected { port });
        }
        let (tx, rx) = mpsc::channel(MESSAGE_QUEUE);
        let session = SerialSession::open(self.opener.clone(), port_name, config.clone(), tx).await?;
        tokio::task::spawn(forward(rx, self.log.clone()));
        self.session = Some(session);
        self.config = config.clone();
        self.log.publish(TerminalEvent::Connected { port: port_name.to_string(), config });
        Ok(())
    }

    pub async fn disconnect(&mut self) -> anyhow::Result<()> {
        let session = self.session.take().context("Not connected to a serial port")?;
        let port = session.port_name().to_string();
        session.close().await;
        self.log.publish(TerminalEvent::Disconnected { port });
        Ok(())
    }

    /// Replaces the connection config. An open session is reopened with it; if that
    /// fails the session is dropped.
    pub async fn configure(&mut self, config: SerialConnectionConfig) -> anyhow::Result<()> {
        config.validate()?;
        if let Some(session) = self.session.as_mut() {
            if let Err(err) = session.reconfigure(config.clone()).await {
                let port = session.port_name().to_string();
                self.session = None;
                self.log.publish(TerminalEvent::Disconnected { port });
                return Err(err);
            }
        }
        self.config = config.clone();
        self.log.publish(TerminalEvent::Configured { config });
        Ok(())
    }

    /// Sends `input`, parsed in `format` or the default input format.
    pub async fn send(&self, input: &str, format: Option<DataFormat>) -> anyhow::Result<SerialMessage> {
        let session = self.session.as_ref().context("Not connected to a serial port")?;
        let message = session.send(input, format.unwrap_or(self.input_format)).await?;
        self.log.record(message.clone());
        Ok(message)
    }

    /// Sends the original input of a sent message again, in the same format.
    pub async fn resend(&self, id: uuid::Uuid) -> anyhow::Result<SerialMessage> {
        let (input, format) = {
            let history = self.log.lock();
            let message = history.get(id).with_context(|| format!("No message with id {id}"))?;
            match message.original_input() {
                Some(input) if message.is_resendable() => (input.to_string(), message.format()),
                _ => anyhow::bail!("Message {id} cannot be resent"),
            }
        };
        self.send(&input, Some(format)).await
    }

    /// Copies the rendered text of a message. Clipboard failures are only logged.
    pub fn copy(&self, id: uuid::Uuid) -> anyhow::Result<()> {
        let text = {
            let history = self.log.lock();
            let message = history.get(id).with_context(|| format!("No message with id {id}"))?;
            message.text().to_string()
        };
        clipboard::copy_or_warn(self.clipboard.as_ref(), &text);
        Ok(())
    }

    /// Enumerates ports on a blocking thread.
    pub async fn list_ports(&self) -> anyhow::Result<Vec<PortInfo>> {
        let opener = self.opener.clone();
        match tokio::task::spawn_blocking(move || opener.available_ports()).await {
            Ok(result) => result,
            Err(err) => anyhow::bail!("Panicked, whilst listing serial ports: {err}"),
        }
    }

    pub fn clear(&self) {
        self.log.lock().clear();
        self.log.publish(TerminalEvent::Cleared);
    }

    pub fn history(&self) -> Vec<SerialMessage> {
        self.log.lock().iter().cloned().collect()
    }

    pub fn rendered_history(&self) -> Vec<RenderedMessage> {
        self.log.lock().iter().map(SerialMessage::render).collect()
    }

    pub async fn close(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
    }
}
