use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use crate::session::{RenderedMessage, SerialMessage};
use crate::terminal::{Terminal, TerminalEvent};

#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleInput {
    Send(String),
    Clear,
    History,
    Resend(usize),
    Copy(usize),
    Quit,
    Unknown(String),
}
impl ConsoleInput {
    /// Lines starting with `/` are commands; `//` escapes a literal leading slash.
    pub fn parse(line: &str) -> Self {
        let Some(command) = line.strip_prefix('/') else {
            return ConsoleInput::Send(line.to_string());
        };
        if command.starts_with('/') {
            return ConsoleInput::Send(command.to_string());
        }
        let mut parts = command.split_whitespace();
        let index = |arg: Option<&str>| arg.and_then(|v| v.parse::<usize>().ok()).filter(|&v| v > 0);
        match (parts.next(), parts.next()) {
            (Some("clear"), None) => ConsoleInput::Clear,
            (Some("history"), None) => ConsoleInput::History,
            (Some("quit" | "exit"), None) => ConsoleInput::Quit,
            (Some("resend"), arg) => index(arg).map_or_else(|| ConsoleInput::Unknown(line.to_string()), ConsoleInput::Resend),
            (Some("copy"), arg) => index(arg).map_or_else(|| ConsoleInput::Unknown(line.to_string()), ConsoleInput::Copy),
            _ => ConsoleInput::Unknown(line.to_string()),
        }
    }
}

/// One printed line: `HH:MM:SS.mmm >> text`, line endings made visible.
pub fn format_line(message: &RenderedMessage) -> String {
    let marked = serialfmt::to_marked(&message.segments);
    let mut line = format!("{} {} {}", message.time, message.direction.arrow(), marked.trim_end_matches('\n'));
    if let Some(error) = &message.error {
        line.push_str(&format!("  ({error})"));
    }
    line
}

fn print_event(event: TerminalEvent) {
    match event {
        TerminalEvent::Message { message } => println!("{}", format_line(&message)),
        TerminalEvent::Connected { port, config } => println!("Connected to {port} at {} baud", config.baud_rate),
        TerminalEvent::Disconnected { port } => println!("Disconnected from {port}"),
        TerminalEvent::Cleared => println!("History cleared"),
        TerminalEvent::Error { message } => eprintln!("{message}"),
        _ => {}
    }
}

async fn run_input(terminal: &mut Terminal, input: ConsoleInput) -> anyhow::Result<bool> {
    let nth = |terminal: &Terminal, n: usize| {
        terminal.history()
            .get(n - 1)
            .map(SerialMessage::id)
            .ok_or_else(|| anyhow::anyhow!("No message #{n}"))
    };
    match input {
        ConsoleInput::Send(text) => {
            terminal.send(&text, None).await?;
        }
        ConsoleInput::Clear => terminal.clear(),
        ConsoleInput::History => {
            for (n, message) in terminal.rendered_history().iter().enumerate() {
                println!("{:>4} {}", n + 1, format_line(message));
            }
        }
        ConsoleInput::Resend(n) => {
            let id = nth(terminal, n)?;
            terminal.resend(id).await?;
        }
        ConsoleInput::Copy(n) => {
            let id = nth(terminal, n)?;
            terminal.copy(id)?;
        }
        ConsoleInput::Quit => return Ok(false),
        ConsoleInput::Unknown(line) => anyhow::bail!("Unknown command {line}, try /clear, /history, /resend <n>, /copy <n> or /quit"),
    }
    Ok(true)
}

/// Interactive terminal on stdin/stdout until `/quit` or end of input.
pub async fn run(mut terminal: Terminal) -> anyhow::Result<()> {
    let mut events = terminal.subscribe();
    let printer = tokio::task::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(event),
                Err(RecvError::Lagged(skipped)) => tracing::warn!("Console fell behind, {skipped} events dropped"),
                Err(RecvError::Closed) => break,
            }
        }
    });
    println!("Type to send, /quit to exit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match run_input(&mut terminal, ConsoleInput::parse(&line)).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => eprintln!("{err:#}"),
        }
    }
    terminal.close().await;
    drop(terminal);
    printer.await.ok();
    Ok(())
}
