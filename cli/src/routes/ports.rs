use rocket::response::content::RawJson;
use crate::terminal::SharedTerminal;

/// The serial ports found on this machine, as a JSON list.
#[rocket::get("/ports")]
pub async fn get_ports(terminal: &rocket::State<SharedTerminal>) -> Result<RawJson<String>, String> {
    let ports = match terminal.read().await.list_ports().await {
        Ok(ports) => ports,
        Err(err) => {
            tracing::error!("{err:#}");
            return Err(format!("{err:#}"));
        }
    };
    serde_json::to_string(&ports)
        .map(RawJson)
        .map_err(|v|v.to_string())
}
