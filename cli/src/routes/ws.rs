use rocket::futures::{Sink, SinkExt, Stream, StreamExt};
use serialfmt::DataFormat;
use tokio::sync::broadcast::{self, error::RecvError};
use crate::session::SerialConnectionConfig;
use crate::terminal::{SharedTerminal, TerminalEvent};

/// A client request, sent as a JSON text frame tagged by `command`.
#[derive(Debug, serde_derive::Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Connect {
        port: String,
        #[serde(default)]
        config: Option<SerialConnectionConfig>,
    },
    Disconnect,
    Configure { config: SerialConnectionConfig },
    Send {
        input: String,
        #[serde(default)]
        format: Option<DataFormat>,
    },
    Resend { id: uuid::Uuid },
    Copy { id: uuid::Uuid },
    Clear,
    History,
    Ports,
}

/// Runs one command. Results every client sees travel over the broadcast channel;
/// the returned event is the reply for the requesting client only.
pub async fn dispatch(terminal: &SharedTerminal, command: Command) -> Option<TerminalEvent> {
    let result = match command {
        Command::Connect { port, config } => {
            let mut terminal = terminal.write().await;
            let config = config.unwrap_or_else(|| terminal.config().clone());
            terminal.connect(&port, config).await.map(|()| None)
        }
        Command::Disconnect => terminal.write().await.disconnect().await.map(|()| None),
        Command::Configure { config } => terminal.write().await.configure(config).await.map(|()| None),
        Command::Send { input, format } => terminal.read().await.send(&input, format).await.map(|_| None),
        Command::Resend { id } => terminal.read().await.resend(id).await.map(|_| None),
        Command::Copy { id } => terminal.read().await.copy(id).map(|()| Some(TerminalEvent::Copied { id })),
        Command::Clear => {
            terminal.read().await.clear();
            Ok(None)
        }
        Command::History => Ok(Some(TerminalEvent::History {
            messages: terminal.read().await.rendered_history(),
        })),
        Command::Ports => terminal.read().await
            .list_ports().await
            .map(|ports| Some(TerminalEvent::Ports { ports })),
    };
    match result {
        Ok(reply) => reply,
        Err(err) => {
            tracing::warn!("Command failed: {err:#}");
            Some(TerminalEvent::Error { message: format!("{err:#}") })
        }
    }
}

/// Parses and runs one text frame.
pub async fn handle_text(terminal: &SharedTerminal, text: &str) -> Option<TerminalEvent> {
    match serde_json::from_str::<Command>(text) {
        Ok(command) => {
            tracing::debug!("Received command: {command:?}");
            dispatch(terminal, command).await
        }
        Err(err) => Some(TerminalEvent::Error { message: format!("Invalid command: {err}") }),
    }
}

fn to_frame(event: &TerminalEvent) -> Option<rocket_ws::Message> {
    match serde_json::to_string(event) {
        Ok(json) => Some(rocket_ws::Message::Text(json)),
        Err(err) => {
            tracing::error!("Failed to serialize event: {err}");
            None
        }
    }
}

/// Runs one client connection until it closes: commands in, replies and broadcast
/// events out.
async fn serve<I, O>(
    terminal: SharedTerminal,
    mut events: broadcast::Receiver<TerminalEvent>,
    mut incoming: I,
    mut outgoing: O,
) -> rocket_ws::result::Result<()>
where
    I: Stream<Item = rocket_ws::result::Result<rocket_ws::Message>> + Unpin,
    O: Sink<rocket_ws::Message, Error = rocket_ws::result::Error> + Unpin,
{
    loop{
        tokio::select! {
            message = incoming.next() => {
                let message = match message {
                    None => {
                        tracing::info!("Websocket stream ended");
                        return Ok(());
                    }
                    Some(Err(err)) => {
                        tracing::error!("error whilst receiving websocket message: {}", err);
                        return Err(err)
                    }
                    Some(Ok(v)) => v,
                };
                match message {
                    rocket_ws::Message::Text(text) => {
                        if let Some(frame) = handle_text(&terminal, &text).await.as_ref().and_then(to_frame) {
                            outgoing.send(frame).await?;
                        }
                    },
                    rocket_ws::Message::Ping(ping) => {
                        outgoing.send(rocket_ws::Message::Pong(ping)).await
                            .map_err(|err| {
                                tracing::error!("error sending pong: {err}");
                                err
                            })?;
                    },
                    rocket_ws::Message::Close(_) => {
                        tracing::info!("Websocket connection closed");
                        return Ok(());
                    },
                    _ => {},
                }
            },
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if let Some(frame) = to_frame(&event) {
                            outgoing.send(frame).await?;
                        }
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Websocket client fell behind, {skipped} events dropped");
                    },
                    Err(RecvError::Closed) => return Ok(()),
                }
            },
        }
    }
}

#[rocket::get("/ws")]
pub async fn ws_impl(terminal: &rocket::State<SharedTerminal>, ws: rocket_ws::WebSocket) -> rocket_ws::Channel<'static> {
    let terminal = terminal.inner().clone();
    let events = terminal.read().await.subscribe();
    ws.channel(move |stream|Box::pin(async move {
        tracing::info!("Websocket client connected");
        let (outgoing, incoming) = stream.split();
        serve(terminal, events, incoming, outgoing).await
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use crate::clipboard::recording::RecordingClipboard;
    use crate::session::memory::{MemoryPorts, MISSING_PORT};
    use crate::terminal::tests::{next_event, terminal};
    use super::*;

    fn shared(ports: &MemoryPorts, clipboard: &RecordingClipboard) -> SharedTerminal {
        Arc::new(tokio::sync::RwLock::new(terminal(ports, clipboard)))
    }

    #[test]
    fn test_parse_commands() {
        let command: Command = serde_json::from_str(r#"{"command":"send","input":"48 69","format":"hex"}"#).unwrap();
        assert!(matches!(command, Command::Send { ref input, format: Some(DataFormat::Hex) } if input == "48 69"));

        let command: Command = serde_json::from_str(r#"{"command":"connect","port":"COM3"}"#).unwrap();
        assert!(matches!(command, Command::Connect { config: None, .. }));

        let command: Command = serde_json::from_str(r#"{"command":"configure","config":{"baud_rate":9600}}"#).unwrap();
        assert!(matches!(command, Command::Configure { config } if config.baud_rate == 9600));

        assert!(matches!(serde_json::from_str::<Command>(r#"{"command":"clear"}"#).unwrap(), Command::Clear));
        assert!(serde_json::from_str::<Command>(r#"{"command":"explode"}"#).is_err());
    }

    #[tokio::test]
    async fn test_invalid_text_replies_with_error() {
        let terminal = shared(&MemoryPorts::default(), &RecordingClipboard::default());
        let reply = handle_text(&terminal, "not json").await;
        assert!(matches!(reply, Some(TerminalEvent::Error { message }) if message.starts_with("Invalid command")));
    }

    #[tokio::test]
    async fn test_failed_command_replies_with_error() {
        let terminal = shared(&MemoryPorts::default(), &RecordingClipboard::default());
        let reply = handle_text(&terminal, r#"{"command":"send","input":"AT"}"#).await;
        assert!(matches!(reply, Some(TerminalEvent::Error { message }) if message.contains("Not connected")));

        let reply = handle_text(&terminal, &format!(r#"{{"command":"connect","port":"{MISSING_PORT}"}}"#)).await;
        assert!(matches!(reply, Some(TerminalEvent::Error { .. })));
    }

    #[tokio::test]
    async fn test_send_is_broadcast_and_copy_replies() {
        let ports = MemoryPorts::default();
        let clipboard = RecordingClipboard::default();
        let terminal = shared(&ports, &clipboard);
        let mut events = terminal.read().await.subscribe();

        assert!(handle_text(&terminal, r#"{"command":"connect","port":"/dev/ttyTEST"}"#).await.is_none());
        assert!(matches!(next_event(&mut events).await, TerminalEvent::Connected { .. }));

        assert!(handle_text(&terminal, r#"{"command":"send","input":"0D 0A","format":"hex"}"#).await.is_none());
        assert_eq!(ports.written(), b"\r\n");
        let id = match next_event(&mut events).await {
            TerminalEvent::Message { message } => {
                assert_eq!(message.segments.len(), 1);
                message.id
            }
            other => panic!("unexpected event {other:?}"),
        };

        let reply = handle_text(&terminal, &format!(r#"{{"command":"copy","id":"{id}"}}"#)).await;
        assert!(matches!(reply, Some(TerminalEvent::Copied { id: copied }) if copied == id));
        assert_eq!(clipboard.copied(), vec!["0D 0A".to_string()]);

        match handle_text(&terminal, r#"{"command":"history"}"#).await {
            Some(TerminalEvent::History { messages }) => assert_eq!(messages.len(), 1),
            other => panic!("unexpected reply {other:?}"),
        }

        assert!(handle_text(&terminal, r#"{"command":"disconnect"}"#).await.is_none());
        assert!(matches!(next_event(&mut events).await, TerminalEvent::Disconnected { .. }));
    }

    type Frames = futures::channel::mpsc::UnboundedReceiver<rocket_ws::Message>;
    type Client = futures::channel::mpsc::UnboundedSender<rocket_ws::result::Result<rocket_ws::Message>>;

    /// Starts a connection loop over in-memory channels.
    fn connect(
        terminal: &SharedTerminal,
        events: broadcast::Receiver<TerminalEvent>,
    ) -> (Client, Frames, tokio::task::JoinHandle<rocket_ws::result::Result<()>>) {
        let (client, incoming) = futures::channel::mpsc::unbounded();
        let (outgoing, frames) = futures::channel::mpsc::unbounded();
        let outgoing = outgoing.sink_map_err(|_| rocket_ws::result::Error::ConnectionClosed);
        let jh = tokio::task::spawn(serve(terminal.clone(), events, incoming, outgoing));
        (client, frames, jh)
    }

    async fn next_frame(frames: &mut Frames) -> rocket_ws::Message {
        tokio::time::timeout(std::time::Duration::from_secs(2), frames.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection dropped")
    }

    fn event_name(frame: &rocket_ws::Message) -> String {
        let rocket_ws::Message::Text(text) = frame else {
            panic!("expected a text frame, got {frame:?}");
        };
        let json: serde_json::Value = serde_json::from_str(text).unwrap();
        json["event"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_socket_answers_ping_and_stops_on_close() {
        let terminal = shared(&MemoryPorts::default(), &RecordingClipboard::default());
        let events = terminal.read().await.subscribe();
        let (client, mut frames, jh) = connect(&terminal, events);

        client.unbounded_send(Ok(rocket_ws::Message::Ping(vec![1, 2]))).unwrap();
        assert_eq!(next_frame(&mut frames).await, rocket_ws::Message::Pong(vec![1, 2]));

        client.unbounded_send(Ok(rocket_ws::Message::Text(r#"{"command":"ports"}"#.to_string()))).unwrap();
        assert_eq!(event_name(&next_frame(&mut frames).await), "ports");

        client.unbounded_send(Ok(rocket_ws::Message::Close(None))).unwrap();
        assert!(jh.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_socket_forwards_broadcast_events() {
        let terminal = shared(&MemoryPorts::default(), &RecordingClipboard::default());
        let events = terminal.read().await.subscribe();
        let (client, mut frames, jh) = connect(&terminal, events);

        terminal.read().await.clear();
        assert_eq!(event_name(&next_frame(&mut frames).await), "cleared");

        drop(client);
        assert!(jh.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_socket_survives_lagging_behind() {
        let terminal = shared(&MemoryPorts::default(), &RecordingClipboard::default());
        let (tx, events) = broadcast::channel(1);
        for message in ["first", "second", "third"] {
            tx.send(TerminalEvent::Error { message: message.to_string() }).unwrap();
        }
        let (client, mut frames, jh) = connect(&terminal, events);

        match next_frame(&mut frames).await {
            rocket_ws::Message::Text(text) => assert!(text.contains("third"), "{text}"),
            other => panic!("unexpected frame {other:?}"),
        }
        client.unbounded_send(Ok(rocket_ws::Message::Ping(vec![]))).unwrap();
        assert_eq!(next_frame(&mut frames).await, rocket_ws::Message::Pong(vec![]));

        drop(tx);
        assert!(jh.await.unwrap().is_ok());
        drop(client);
    }

    #[test]
    fn test_events_are_tagged() {
        let json = serde_json::to_value(TerminalEvent::Cleared).unwrap();
        assert_eq!(json, serde_json::json!({"event": "cleared"}));
        let json = serde_json::to_value(TerminalEvent::Error { message: "boom".to_string() }).unwrap();
        assert_eq!(json, serde_json::json!({"event": "error", "message": "boom"}));
    }
}
