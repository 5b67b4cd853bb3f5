//! Integration tests for the connection supervisor state machine.
//!
//! Time is paused so backoff delays can be asserted exactly.

use std::sync::Arc;
use std::time::Duration;

use toolmux_core::testing::{FakeConnector, RecordingEmitter};
use toolmux_core::{
    ClientError, ConnectionEvent, ConnectionEventEmitter, ConnectionStatus, McpConnector,
    ServerConfig, SupervisorSettings, ToolDescriptor,
};
use toolmux_mcp::ConnectionSupervisor;

struct Harness {
    connector: Arc<FakeConnector>,
    emitter: Arc<RecordingEmitter>,
    supervisor: ConnectionSupervisor,
}

fn harness() -> Harness {
    harness_with(SupervisorSettings::default())
}

fn harness_with(settings: SupervisorSettings) -> Harness {
    let connector = Arc::new(FakeConnector::new());
    let emitter = Arc::new(RecordingEmitter::new());
    let supervisor = ConnectionSupervisor::with_emitter(
        Arc::clone(&connector) as Arc<dyn McpConnector>,
        settings,
        Arc::clone(&emitter) as Arc<dyn ConnectionEventEmitter>,
    );
    Harness {
        connector,
        emitter,
        supervisor,
    }
}

fn config(id: &str) -> ServerConfig {
    ServerConfig::new(id, format!("Server {id}"), "node").with_args(["server.js"])
}

fn scheduled_delays(emitter: &RecordingEmitter, id: &str) -> Vec<(u32, u64)> {
    emitter
        .events_for(id)
        .into_iter()
        .filter_map(|event| match event {
            ConnectionEvent::ReconnectScheduled {
                attempt, delay_ms, ..
            } => Some((attempt, delay_ms)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_connect_success_reports_tool_count() {
    let h = harness();
    h.connector
        .set_tools("s1", vec![ToolDescriptor::new("read_file")]);

    h.supervisor.connect(config("s1")).await;

    let statuses = h.supervisor.connection_statuses().await;
    assert_eq!(statuses["s1"].status, ConnectionStatus::Connected);
    assert_eq!(statuses["s1"].tool_count, 1);
    assert_eq!(statuses["s1"].reconnect_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_schedules_first_backoff() {
    let h = harness();
    h.connector
        .fail_next("s1", ClientError::unclassified("boom"));

    h.supervisor.connect(config("s1")).await;

    let info = h.supervisor.connection_status("s1").await.unwrap();
    assert_eq!(info.status, ConnectionStatus::Error);
    assert_eq!(info.last_error.as_deref(), Some("boom"));
    assert_eq!(scheduled_delays(&h.emitter, "s1"), vec![(0, 5_000)]);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_doubles_until_cap() {
    let h = harness();
    h.connector
        .fail_always("s1", ClientError::connection("refused"));

    h.supervisor.connect(config("s1")).await;
    tokio::time::sleep(Duration::from_secs(600)).await;

    assert_eq!(
        scheduled_delays(&h.emitter, "s1"),
        vec![
            (0, 5_000),
            (1, 10_000),
            (2, 20_000),
            (3, 40_000),
            (4, 80_000)
        ]
    );
    assert!(h.emitter.events_for("s1").contains(&ConnectionEvent::ReconnectExhausted {
        server_id: "s1".to_string(),
        attempts: 5,
    }));

    // One initial attempt plus five timer-driven ones.
    assert_eq!(h.connector.connect_count("s1"), 6);
    let info = h.supervisor.connection_status("s1").await.unwrap();
    assert_eq!(info.status, ConnectionStatus::Error);
    assert_eq!(info.reconnect_attempts, 5);
    assert!(info.last_reconnect_time.is_some());
    assert!(!h.supervisor.has_pending_reconnection("s1").await);
}

#[tokio::test(start_paused = true)]
async fn test_attempts_increase_by_one_per_failed_retry() {
    let h = harness();
    h.connector
        .fail_always("s1", ClientError::connection("refused"));
    h.supervisor.connect(config("s1")).await;

    let mut expected = 0;
    for delay in [5_000, 10_000, 20_000] {
        tokio::time::sleep(Duration::from_millis(delay + 1)).await;
        expected += 1;
        let info = h.supervisor.connection_status("s1").await.unwrap();
        assert_eq!(info.reconnect_attempts, expected);
    }
}

#[tokio::test(start_paused = true)]
async fn test_successful_retry_resets_attempts() {
    let h = harness();
    h.connector.set_tools("s1", vec![ToolDescriptor::new("a")]);
    h.connector
        .fail_next("s1", ClientError::connection("refused"));

    h.supervisor.connect(config("s1")).await;
    tokio::time::sleep(Duration::from_millis(5_001)).await;

    let info = h.supervisor.connection_status("s1").await.unwrap();
    assert_eq!(info.status, ConnectionStatus::Connected);
    assert_eq!(info.reconnect_attempts, 0);
    assert_eq!(info.tool_count, 1);
    assert!(info.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_explicit_connect_after_failure_disarms_timer() {
    let h = harness();
    h.connector
        .fail_next("s1", ClientError::connection("boom"));
    h.supervisor.connect(config("s1")).await;
    assert!(h.supervisor.has_pending_reconnection("s1").await);

    let status = h.supervisor.connect(config("s1")).await;
    assert_eq!(status, ConnectionStatus::Connected);
    assert!(!h.supervisor.has_pending_reconnection("s1").await);

    tokio::time::sleep(Duration::from_secs(6)).await;

    let info = h.supervisor.connection_status("s1").await.unwrap();
    assert_eq!(info.status, ConnectionStatus::Connected);
    assert_eq!(info.reconnect_attempts, 0);
    assert!(info.last_reconnect_time.is_none());
    assert_eq!(h.connector.connect_count("s1"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_explicit_reconnect_resets_attempts() {
    let h = harness();
    h.connector
        .fail_always("s1", ClientError::connection("refused"));
    h.supervisor.connect(config("s1")).await;
    tokio::time::sleep(Duration::from_millis(15_001)).await;
    assert_eq!(
        h.supervisor
            .connection_status("s1")
            .await
            .unwrap()
            .reconnect_attempts,
        2
    );

    h.connector.clear_failures("s1");
    let status = h.supervisor.reconnect("s1").await.unwrap();

    assert_eq!(status, ConnectionStatus::Connected);
    let info = h.supervisor.connection_status("s1").await.unwrap();
    assert_eq!(info.reconnect_attempts, 0);
    assert!(!h.supervisor.has_pending_reconnection("s1").await);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_timer() {
    let h = harness();
    h.connector
        .fail_next("s1", ClientError::connection("refused"));
    h.supervisor.connect(config("s1")).await;
    assert!(h.supervisor.has_pending_reconnection("s1").await);

    h.supervisor.disconnect("s1").await;
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(h.connector.connect_count("s1"), 1);
    let info = h.supervisor.connection_status("s1").await.unwrap();
    assert_eq!(info.status, ConnectionStatus::Disconnected);
    assert!(info.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_rescheduling_replaces_existing_timer() {
    let h = harness();
    h.connector
        .fail_next("s1", ClientError::connection("refused"));
    h.supervisor.connect(config("s1")).await;

    assert!(h.supervisor.schedule_reconnection("s1").await);
    assert!(h.supervisor.schedule_reconnection("s1").await);
    tokio::time::sleep(Duration::from_secs(6)).await;

    // Three timers were armed but only the last one may fire.
    assert_eq!(h.connector.connect_count("s1"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_connection_timeout() {
    let h = harness();
    h.connector.set_connect_delay(Duration::from_secs(30));

    let status = h.supervisor.connect(config("s1")).await;

    assert_eq!(status, ConnectionStatus::Error);
    let info = h.supervisor.connection_status("s1").await.unwrap();
    assert_eq!(
        info.last_error.as_deref(),
        Some("Connection timeout after 10000ms")
    );
}

#[tokio::test]
async fn test_update_configs_reconnects_changed_server_once() {
    let h = harness();
    h.supervisor.update_configs(vec![config("s1")]).await;
    let old = h.connector.latest_session("s1").unwrap();

    let changed = ServerConfig::new("s1", "Server s1", "python").with_args(["server.py"]);
    h.supervisor.update_configs(vec![changed]).await;

    assert_eq!(old.close_count(), 1);
    let log = h.connector.connect_log();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].command, "python");
    let disconnects = h
        .emitter
        .events_for("s1")
        .into_iter()
        .filter(|e| matches!(e, ConnectionEvent::Disconnected { .. }))
        .count();
    assert_eq!(disconnects, 1);
}

#[tokio::test]
async fn test_update_configs_is_idempotent() {
    let h = harness();
    let configs = vec![config("s1"), config("s2")];

    h.supervisor.update_configs(configs.clone()).await;
    h.supervisor.update_configs(configs).await;

    assert_eq!(h.connector.total_connects(), 2);
}

#[tokio::test]
async fn test_update_configs_renames_without_restart() {
    let h = harness();
    h.supervisor.update_configs(vec![config("s1")]).await;

    let mut renamed = config("s1");
    renamed.name = "Renamed".to_string();
    h.supervisor.update_configs(vec![renamed]).await;

    assert_eq!(h.connector.total_connects(), 1);
}

#[tokio::test]
async fn test_update_configs_removes_and_disables() {
    let h = harness();
    h.supervisor
        .update_configs(vec![config("s1"), config("s2")])
        .await;
    let s1 = h.connector.latest_session("s1").unwrap();

    h.supervisor
        .update_configs(vec![config("s2").with_enabled(false)])
        .await;

    let statuses = h.supervisor.connection_statuses().await;
    assert!(!statuses.contains_key("s1"));
    assert_eq!(s1.close_count(), 1);
    assert_eq!(statuses["s2"].status, ConnectionStatus::Disconnected);

    // Re-enabling is a config change and connects again.
    h.supervisor.update_configs(vec![config("s2")]).await;
    assert_eq!(h.connector.connect_count("s2"), 2);
    assert_eq!(
        h.supervisor.connection_status("s2").await.unwrap().status,
        ConnectionStatus::Connected
    );
}

#[tokio::test]
async fn test_disabled_servers_never_reach_connector() {
    let h = harness();
    h.supervisor
        .update_configs(vec![config("s1").with_enabled(false)])
        .await;
    h.supervisor
        .connect(config("s2").with_enabled(false))
        .await;

    assert_eq!(h.connector.total_connects(), 0);
}

#[tokio::test]
async fn test_disconnect_removes_tools_immediately() {
    let h = harness();
    h.connector.set_tools("s1", vec![ToolDescriptor::new("a")]);
    h.connector.set_tools("s2", vec![ToolDescriptor::new("b")]);
    h.supervisor
        .update_configs(vec![config("s1"), config("s2")])
        .await;
    let catalog = h.supervisor.catalog();
    assert_eq!(catalog.get_all_tools().await.len(), 2);

    h.supervisor.disconnect("s1").await;

    let names: Vec<String> = catalog
        .get_all_tools()
        .await
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["b"]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_clears_everything() {
    let h = harness();
    h.connector
        .fail_always("s2", ClientError::connection("refused"));
    h.supervisor
        .update_configs(vec![config("s1"), config("s2")])
        .await;
    let s1 = h.connector.latest_session("s1").unwrap();
    assert!(h.supervisor.has_pending_reconnection("s2").await);

    h.supervisor.shutdown().await;
    tokio::time::sleep(Duration::from_secs(600)).await;

    assert!(h.supervisor.connection_statuses().await.is_empty());
    assert_eq!(s1.close_count(), 1);
    assert_eq!(h.connector.connect_count("s2"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_custom_settings_drive_backoff() {
    let settings = SupervisorSettings {
        max_reconnect_attempts: 2,
        reconnect_delay_base_ms: 100,
        ..SupervisorSettings::default()
    };
    let h = harness_with(settings);
    h.connector
        .fail_always("s1", ClientError::connection("refused"));

    h.supervisor.connect(config("s1")).await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(scheduled_delays(&h.emitter, "s1"), vec![(0, 100), (1, 200)]);
    assert_eq!(h.connector.connect_count("s1"), 3);
}
