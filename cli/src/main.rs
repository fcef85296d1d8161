use std::sync::Arc;
use clap::Parser;
use tokio::sync::RwLock;
use crate::options::Options;
use crate::terminal::Terminal;

mod clipboard;
mod console;
mod logging;
mod options;
mod routes;
mod session;
mod terminal;

/// Largest single read, and the longest frame kept while waiting for a delimiter.
const MAX_MESSAGE_SIZE: usize = 2_usize.pow(12);

#[rocket::main]
async fn main() {
    let options = options::Options::parse();
    logging::init(options.verbose());
    if options.version() {
        match option_env!("GIT_VERSION") {
            Some(version) => println!("Running Version: {}", version),
            None => println!("Running Version: {}-development", env!("CARGO_PKG_VERSION")),
        }
    }
    if options.list() {
        match session::available_ports() {
            Ok(ports) => {
                println!("Found ports:");
                for port in ports {
                    match serde_json::to_string(&port) {
                        Ok(json) => println!("{json}"),
                        Err(err) => tracing::error!("Error serializing port {}: {err}", port.name()),
                    }
                }
            }
            Err(err) => tracing::error!("Error scanning for ports: {}", err),
        }
    }

    let config = options.connection_config();
    if let Err(err) = config.validate() {
        tracing::error!("Invalid serial configuration: {err}");
        return;
    }
    let mut terminal = Terminal::new(
        Arc::new(session::SystemPorts),
        Box::new(clipboard::SystemClipboard),
        config.clone(),
        options.input_format(),
        options.history(),
    );
    if let Some(device) = options.device() {
        if let Err(err) = terminal.connect(device, config).await {
            tracing::error!("{err:#}");
            return;
        }
    }

    if options.websocket() {
        if options.port() == 0 {
            tracing::error!("Port must be greater than 0");
            return;
        }
        if let Err(err) = run_websocket(options.clone(), terminal).await {
            tracing::error!("Error starting websocket server: {}", err);
            return;
        }
    } else if options.device().is_some() {
        if let Err(err) = console::run(terminal).await {
            tracing::error!("Console stopped: {err:#}");
        }
    }
}

async fn run_websocket(option: Options, terminal: Terminal) -> Result<rocket::Rocket<rocket::Ignite>, rocket::Error>{
    let rocket = routes::build(Arc::new(RwLock::new(terminal)));
    let figment = rocket.figment().clone()
                .merge((rocket::Config::PORT, option.port()));
    tracing::info!(port = option.port(), "Starting websocket server");
    rocket
        .configure(figment)
        .launch()
        .await
}
