//! Integration tests for IPC server command dispatch.
//!
//! Drives the server over a real local socket with a uniquely named
//! endpoint per test.

use std::sync::Arc;
use std::time::Duration;

use interprocess::local_socket::{tokio::prelude::*, GenericNamespaced};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use focus_orchestrator::ipc::server::spawn_ipc_server;
use focus_orchestrator::orchestrator::SessionController;

use super::test_helpers::{quick_timeouts, wait_for_feedback, FakeEngine};

struct TestServer {
    name: String,
    ct: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    fn start(controller: Arc<SessionController>) -> Self {
        let name = format!("focus-test-{}", uuid::Uuid::new_v4().simple());
        let ct = CancellationToken::new();
        let handle = spawn_ipc_server(name.clone(), controller, ct.clone()).expect("ipc server");
        Self { name, ct, handle }
    }

    async fn request(&self, line: &str) -> Value {
        let name = self
            .name
            .clone()
            .to_ns_name::<GenericNamespaced>()
            .expect("socket name");
        let stream = LocalSocketStream::connect(name).await.expect("connect");
        let (reader, mut writer) = stream.split();

        writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("write request");

        let mut reader = BufReader::new(reader);
        let mut response = String::new();
        reader.read_line(&mut response).await.expect("read response");
        serde_json::from_str(response.trim()).expect("response json")
    }

    async fn shutdown(self) {
        self.ct.cancel();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server stops")
            .expect("server task");
    }
}

#[tokio::test]
async fn status_reports_idle() {
    let engine = FakeEngine::new("exit 0\n");
    let server = TestServer::start(engine.controller(quick_timeouts()));

    let response = server.request(r#"{"command":"status"}"#).await;

    assert_eq!(response["ok"], true);
    assert_eq!(response["data"]["state"], "idle");
    assert!(response["data"].get("session").is_none());
    server.shutdown().await;
}

#[tokio::test]
async fn stop_while_idle_returns_error_code() {
    let engine = FakeEngine::new("exit 0\n");
    let server = TestServer::start(engine.controller(quick_timeouts()));

    let response = server.request(r#"{"command":"stop"}"#).await;

    assert_eq!(response["ok"], false);
    assert_eq!(response["code"], "no_active_session");
    assert_eq!(response["error"], "no active session");
    server.shutdown().await;
}

#[tokio::test]
async fn start_replies_with_terminal_outcome() {
    let engine = FakeEngine::new("echo \"AI_MSG: well done\"\nexit 0\n");
    let server = TestServer::start(engine.controller(quick_timeouts()));

    let response = server
        .request(r#"{"command":"start","user_id":"42","kind":"engineer"}"#)
        .await;

    assert_eq!(response["ok"], true, "response: {response}");
    assert_eq!(response["data"]["outcome"], "finished");
    assert_eq!(response["data"]["message"], "well done");
    assert_eq!(response["data"]["exitCode"], 0);
    server.shutdown().await;
}

#[tokio::test]
async fn start_without_user_is_rejected() {
    let engine = FakeEngine::new("exit 0\n");
    let controller = engine.controller(quick_timeouts());
    let server = TestServer::start(Arc::clone(&controller));

    let response = server.request(r#"{"command":"start","user_id":"  "}"#).await;

    assert_eq!(response["ok"], false);
    assert!(response["error"]
        .as_str()
        .is_some_and(|e| e.contains("user_id")));
    assert!(controller.status().await.session.is_none());
    server.shutdown().await;
}

#[tokio::test]
async fn stop_over_second_connection_cancels_start() {
    let engine = FakeEngine::new("echo \"AI_MSG: partial\"\nexec sleep 30\n");
    let controller = engine.controller(quick_timeouts());
    let server = Arc::new(TestServer::start(Arc::clone(&controller)));

    let pending = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            server
                .request(r#"{"command":"start","user_id":"42"}"#)
                .await
        })
    };
    wait_for_feedback(&controller, "partial").await;

    let status = server.request(r#"{"command":"status"}"#).await;
    assert_eq!(status["data"]["state"], "running");
    assert_eq!(status["data"]["session"]["feedback"], "partial");

    let busy = server
        .request(r#"{"command":"start","user_id":"7"}"#)
        .await;
    assert_eq!(busy["code"], "session_already_active");

    let ack = server.request(r#"{"command":"stop"}"#).await;
    assert_eq!(ack["ok"], true);
    assert_eq!(ack["data"]["cancelled"], true);

    let outcome = tokio::time::timeout(Duration::from_secs(10), pending)
        .await
        .expect("start answered")
        .expect("join");
    assert_eq!(outcome["data"]["outcome"], "cancelled");
    assert_eq!(outcome["data"]["message"], "partial");
    assert_eq!(outcome["data"]["sessionId"], ack["data"]["session_id"]);

    let server = Arc::into_inner(server).expect("sole owner");
    server.shutdown().await;
}

#[tokio::test]
async fn malformed_and_unknown_commands_get_error_responses() {
    let engine = FakeEngine::new("exit 0\n");
    let server = TestServer::start(engine.controller(quick_timeouts()));

    let invalid = server.request("not json").await;
    assert_eq!(invalid["ok"], false);
    assert!(invalid["error"]
        .as_str()
        .is_some_and(|e| e.starts_with("invalid json")));

    let unknown = server.request(r#"{"command":"reboot"}"#).await;
    assert_eq!(unknown["ok"], false);
    assert_eq!(unknown["error"], "unknown command: reboot");
    server.shutdown().await;
}
