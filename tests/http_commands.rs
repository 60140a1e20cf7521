use std::sync::Arc;

use robot_bridge_lib::commands::route;
use robot_bridge_lib::config::BridgeConfig;
use robot_bridge_lib::serial::fake::FakeLink;
use robot_bridge_lib::Bridge;

fn bridge_with(link: &FakeLink) -> Bridge {
    let config = BridgeConfig {
        device_path: "fake0".to_string(),
        ..BridgeConfig::default()
    };
    Bridge::with_opener(config, Arc::new(link.opener()))
}

#[tokio::test(start_paused = true)]
async fn connect_is_idempotent_over_http() {
    let link = FakeLink::new();
    let bridge = bridge_with(&link);

    let first = route(&bridge, "POST", "/api/connect", None).await;
    assert_eq!(first.status, 200);
    assert_eq!(first.body["status"], "connected");

    let second = route(&bridge, "POST", "/api/connect", None).await;
    assert_eq!(second.status, 200);
    assert_eq!(second.body["status"], "already_connected");
    assert_eq!(second.body["state"], "connected");
    assert_eq!(link.open_count(), 1);

    route(&bridge, "POST", "/api/disconnect", None).await;
}

#[tokio::test(start_paused = true)]
async fn connect_body_overrides_device() {
    let link = FakeLink::new();
    let bridge = bridge_with(&link);

    let reply = route(
        &bridge,
        "POST",
        "/api/connect",
        Some(r#"{"path":"/dev/ttyACM1","baudRate":115200}"#),
    )
    .await;
    assert_eq!(reply.status, 200);
    assert_eq!(bridge.status_snapshot().port_name.as_deref(), Some("/dev/ttyACM1"));

    let status = route(&bridge, "GET", "/api/status", None).await;
    assert_eq!(status.body["port"], "/dev/ttyACM1");
    route(&bridge, "POST", "/api/disconnect", None).await;
}

#[tokio::test(start_paused = true)]
async fn open_failure_is_server_error() {
    let link = FakeLink::new();
    link.fail_open("Access denied");
    let bridge = bridge_with(&link);

    let reply = route(&bridge, "POST", "/api/connect", None).await;
    assert_eq!(reply.status, 500);
    assert_eq!(reply.body["status"], "error");
    assert!(reply.body["message"].as_str().unwrap().contains("Access denied"));
}

#[tokio::test(start_paused = true)]
async fn move_maps_errors_to_client_errors() {
    let link = FakeLink::new();
    let bridge = bridge_with(&link);

    let not_connected = route(&bridge, "POST", "/api/move", Some(r#"{"command":"forward"}"#)).await;
    assert_eq!(not_connected.status, 400);
    assert_eq!(not_connected.body["message"], "Robot not connected");

    route(&bridge, "POST", "/api/connect", None).await;

    let unknown = route(&bridge, "POST", "/api/move", Some(r#"{"command":"hover"}"#)).await;
    assert_eq!(unknown.status, 400);
    assert_eq!(unknown.body["message"], "Unknown command: hover");

    let missing = route(&bridge, "POST", "/api/move", None).await;
    assert_eq!(missing.status, 400);

    let malformed = route(&bridge, "POST", "/api/move", Some("{command")).await;
    assert_eq!(malformed.status, 400);

    let sent = route(&bridge, "POST", "/api/move", Some(r#"{"command":"turn-right"}"#)).await;
    assert_eq!(sent.status, 200);
    assert_eq!(sent.body["status"], "sent");
    assert_eq!(sent.body["command"], "turn-right");
    assert_eq!(sent.body["serialCommand"], "0x5A");
    assert_eq!(link.writes(), vec![vec![0x80, 0x5A, 0x81]]);

    link.set_write_failure(true);
    let failed = route(&bridge, "POST", "/api/move", Some(r#"{"command":"left"}"#)).await;
    assert_eq!(failed.status, 500);

    route(&bridge, "POST", "/api/disconnect", None).await;
}

#[tokio::test(start_paused = true)]
async fn status_and_voltage_reflect_telemetry() {
    let link = FakeLink::new();
    let bridge = bridge_with(&link);

    let status = route(&bridge, "GET", "/api/status", None).await;
    assert_eq!(status.body["connected"], false);
    assert_eq!(status.body["state"], "disconnected");
    assert_eq!(status.body["voltage"], 0.0);

    route(&bridge, "POST", "/api/connect", None).await;
    link.inject(&[0x80, 0x0B, 0x09, 0x64, 0x81]);
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let status = route(&bridge, "GET", "/api/status", None).await;
    assert_eq!(status.body["connected"], true);
    assert_eq!(status.body["voltage"], 12.52);
    assert!(status.body["sessionId"].is_string());

    let voltage = route(&bridge, "GET", "/api/voltage", None).await;
    assert_eq!(voltage.status, 200);
    assert_eq!(voltage.body["voltage"], 12.52);
    assert!(voltage.body["receivedAt"].is_string());

    route(&bridge, "POST", "/api/disconnect", None).await;
}

#[tokio::test(start_paused = true)]
async fn disconnect_reports_not_connected() {
    let link = FakeLink::new();
    let bridge = bridge_with(&link);

    let reply = route(&bridge, "POST", "/api/disconnect", None).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body["status"], "not_connected");

    route(&bridge, "POST", "/api/connect", None).await;
    let reply = route(&bridge, "POST", "/api/disconnect", None).await;
    assert_eq!(reply.body["status"], "disconnected");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let link = FakeLink::new();
    let bridge = bridge_with(&link);
    assert_eq!(route(&bridge, "GET", "/api/teleport", None).await.status, 404);
    assert_eq!(route(&bridge, "DELETE", "/api/status", None).await.status, 404);
    assert_eq!(route(&bridge, "get", "/api/status?x=1", None).await.status, 200);
}
