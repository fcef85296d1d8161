mod ports;
mod ws;

use rocket::response::content::RawJson;
use crate::terminal::SharedTerminal;

pub use ports::get_ports;
pub use ws::ws_impl;

#[rocket::get("/help")]
pub async fn help() -> &'static str {
    "Serial terminal. Connect a websocket to ip/ws and send JSON commands tagged by \"command\":\n\
    {\"command\":\"ports\"}  list serial ports\n\
    {\"command\":\"connect\",\"port\":\"/dev/ttyUSB0\",\"config\":{\"baud_rate\":115200}}\n\
    {\"command\":\"configure\",\"config\":{...}}  reopen the port with a new config\n\
    {\"command\":\"send\",\"input\":\"48 69\",\"format\":\"hex\"}  formats: hex, binary, ascii, decimal, utf8, base64\n\
    {\"command\":\"resend\",\"id\":\"<message id>\"}\n\
    {\"command\":\"copy\",\"id\":\"<message id>\"}\n\
    {\"command\":\"history\"}, {\"command\":\"clear\"}, {\"command\":\"disconnect\"}\n\
    Events come back as JSON tagged by \"event\". GET /ports, /history and /config return JSON."
}

#[rocket::get("/history")]
pub async fn get_history(terminal: &rocket::State<SharedTerminal>) -> Result<RawJson<String>, String> {
    let messages = terminal.read().await.rendered_history();
    serde_json::to_string(&messages)
        .map(RawJson)
        .map_err(|v|v.to_string())
}

#[rocket::get("/config")]
pub async fn get_config(terminal: &rocket::State<SharedTerminal>) -> Result<RawJson<String>, String> {
    #[derive(serde_derive::Serialize)]
    struct Status<'a> {
        port: Option<&'a str>,
        connected: bool,
        input_format: serialfmt::DataFormat,
        history: usize,
        history_capacity: usize,
        config: &'a crate::session::SerialConnectionConfig,
    }
    let terminal = terminal.read().await;
    let (history, history_capacity) = terminal.history_usage();
    let status = Status {
        port: terminal.port_name(),
        connected: terminal.is_connected(),
        input_format: terminal.input_format(),
        history,
        history_capacity,
        config: terminal.config(),
    };
    serde_json::to_string(&status)
        .map(RawJson)
        .map_err(|v|v.to_string())
}

pub fn build(terminal: SharedTerminal) -> rocket::Rocket<rocket::Build> {
    rocket::build()
        .manage(terminal)
        .mount("/", rocket::routes![
            help,
            get_ports,
            get_history,
            get_config,
            ws_impl,
        ])
}
