//! HTTP-facing handlers. Each one adapts a bridge call into the status code
//! and JSON body the control panel expects; the web server only has to hand
//! requests to [`route`] and write the reply back.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::bridge::Bridge;
use crate::link::{ConnectOutcome, DisconnectOutcome, LinkError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "status": "error", "message": message.into() }),
        }
    }
}

/// Optional override of the configured device for `/api/connect`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    pub path: Option<String>,
    pub baud_rate: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoveRequest {
    pub command: String,
}

/// Dispatch one request by method and path.
pub async fn route(bridge: &Bridge, method: &str, path: &str, body: Option<&str>) -> ApiResponse {
    let path = path.split('?').next().unwrap_or(path);
    match (method.to_ascii_uppercase().as_str(), path) {
        ("POST", "/api/connect") => match parse_body::<ConnectRequest>(body) {
            Ok(request) => connect(bridge, request.unwrap_or_default()).await,
            Err(response) => response,
        },
        ("POST", "/api/disconnect") => disconnect(bridge).await,
        ("GET", "/api/status") => status(bridge),
        ("GET", "/api/voltage") => voltage(bridge),
        ("POST", "/api/move") => match parse_body::<MoveRequest>(body) {
            Ok(Some(request)) => move_robot(bridge, &request.command).await,
            Ok(None) => ApiResponse::error(400, "Missing command"),
            Err(response) => response,
        },
        (method, path) => {
            log::debug!("No route for {} {}", method, path);
            ApiResponse::error(404, format!("No route for {} {}", method, path))
        }
    }
}

fn parse_body<T: for<'de> Deserialize<'de>>(body: Option<&str>) -> Result<Option<T>, ApiResponse> {
    match body.map(str::trim).filter(|b| !b.is_empty()) {
        None => Ok(None),
        Some(text) => serde_json::from_str(text)
            .map(Some)
            .map_err(|e| ApiResponse::error(400, format!("Invalid request body: {}", e))),
    }
}

/// Connect to the robot
pub async fn connect(bridge: &Bridge, request: ConnectRequest) -> ApiResponse {
    let config = bridge.config();
    let path = request.path.unwrap_or_else(|| config.device_path.clone());
    let baud_rate = request.baud_rate.unwrap_or(config.baud_rate);

    match bridge.connect_to(&path, baud_rate).await {
        Ok(ConnectOutcome::Opened) => ApiResponse::ok(json!({
            "status": "connected",
            "message": format!("Successfully connected to robot on {}", path),
        })),
        Ok(ConnectOutcome::AlreadyActive(state)) => ApiResponse::ok(json!({
            "status": "already_connected",
            "state": state,
            "message": "Robot already connected",
        })),
        Err(e) => ApiResponse::error(500, e.to_string()),
    }
}

/// Disconnect from the robot
pub async fn disconnect(bridge: &Bridge) -> ApiResponse {
    match bridge.disconnect().await {
        Ok(DisconnectOutcome::Closed) => ApiResponse::ok(json!({
            "status": "disconnected",
            "message": "Successfully disconnected from robot",
        })),
        Ok(DisconnectOutcome::NotConnected) => ApiResponse::ok(json!({
            "status": "not_connected",
            "message": "Robot not connected",
        })),
        Err(e) => ApiResponse::error(500, e.to_string()),
    }
}

/// Get connection status
pub fn status(bridge: &Bridge) -> ApiResponse {
    let snapshot = bridge.status_snapshot();
    ApiResponse::ok(json!({
        "connected": snapshot.is_connected(),
        "state": snapshot.state,
        "voltage": snapshot.telemetry.voltage,
        "voltageUpdatedAt": snapshot.telemetry.received_at,
        "port": snapshot.port_name,
        "sessionId": snapshot.session_id,
        "lastError": snapshot.last_error,
        "updatedAt": snapshot.updated_at,
    }))
}

/// Get the latest voltage reading
pub fn voltage(bridge: &Bridge) -> ApiResponse {
    let reading = bridge.latest_telemetry();
    ApiResponse::ok(json!({
        "voltage": reading.voltage,
        "receivedAt": reading.received_at,
    }))
}

/// Send a movement command to the robot
pub async fn move_robot(bridge: &Bridge, command: &str) -> ApiResponse {
    match bridge.send_command(command).await {
        Ok(sent) => ApiResponse::ok(json!({
            "status": "sent",
            "command": sent.command.name(),
            "serialCommand": format!("0x{:02X}", sent.opcode),
        })),
        Err(e @ (LinkError::NotConnected | LinkError::UnknownCommand(_))) => {
            ApiResponse::error(400, e.to_string())
        }
        Err(e) => ApiResponse::error(500, e.to_string()),
    }
}
