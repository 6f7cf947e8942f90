//! Local IPC server for `focus-ctl` commands.
//!
//! Listens on a named pipe (Windows) or Unix domain socket (Linux/macOS)
//! using the `interprocess` crate. Accepts line-delimited JSON commands and
//! routes them to the [`SessionController`].
//!
//! ## Protocol
//!
//! Request (one JSON object per line):
//! ```json
//! {"command": "start", "user_id": "42", "kind": "engineer"}
//! {"command": "stop"}
//! {"command": "status"}
//! ```
//!
//! Response (one JSON object per line):
//! ```json
//! {"ok": true, "data": { ... } }
//! {"ok": false, "error": "no active session", "code": "no_active_session"}
//! ```
//!
//! `start` answers only when the session has reached its terminal outcome,
//! so a `stop` must arrive on a separate connection.

use std::sync::Arc;

use interprocess::local_socket::{tokio::prelude::*, GenericNamespaced, ListenerOptions};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::orchestrator::SessionController;
use crate::{AppError, Result};

/// Inbound IPC request from `focus-ctl`.
#[derive(Debug, Deserialize)]
struct IpcRequest {
    /// Command verb.
    command: String,
    /// User to run the session for (`start`).
    user_id: Option<String>,
    /// Optional session kind tag (`start`).
    kind: Option<String>,
}

/// Outbound IPC response to `focus-ctl`.
#[derive(Debug, Serialize)]
struct IpcResponse {
    /// Whether the command succeeded.
    ok: bool,
    /// Payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
    /// Error message on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    /// Machine-readable error code on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl IpcResponse {
    fn success(data: serde_json::Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
            code: None,
        }
    }

    fn from_app_error(err: &AppError) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(err.to_string()),
            code: Some(err.code()),
        }
    }

    fn from_serializable<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(data) => Self::success(data),
            Err(err) => Self::error(format!("serialization failed: {err}")),
        }
    }
}

/// Spawn the IPC server task.
///
/// # Errors
///
/// Returns `AppError::Ipc` if the listener cannot be created.
pub fn spawn_ipc_server(
    name: String,
    controller: Arc<SessionController>,
    ct: CancellationToken,
) -> Result<tokio::task::JoinHandle<()>> {
    let listener_name = name
        .clone()
        .to_ns_name::<GenericNamespaced>()
        .map_err(|err| AppError::Ipc(format!("invalid ipc socket name '{name}': {err}")))?;

    let listener = ListenerOptions::new()
        .name(listener_name)
        .create_tokio()
        .map_err(|err| AppError::Ipc(format!("failed to create ipc listener: {err}")))?;

    info!(ipc_name = %name, "IPC server listening");

    let handle = tokio::spawn(async move {
        let span = info_span!("ipc_server", name = %name);
        async move {
            loop {
                tokio::select! {
                    () = ct.cancelled() => {
                        info!("IPC server shutting down");
                        break;
                    }
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok(stream) => {
                                tokio::spawn(handle_connection(stream, Arc::clone(&controller)));
                            }
                            Err(err) => {
                                warn!(%err, "IPC accept failed");
                            }
                        }
                    }
                }
            }
        }
        .instrument(span)
        .await;
    });

    Ok(handle)
}

/// Handle a single IPC client connection.
async fn handle_connection(
    stream: interprocess::local_socket::tokio::Stream,
    controller: Arc<SessionController>,
) {
    let span = info_span!("ipc_conn");
    async move {
        let (reader, mut writer) = stream.split();
        let mut buf_reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();
            match buf_reader.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    let response = match serde_json::from_str::<IpcRequest>(trimmed) {
                        Ok(request) => dispatch_command(&request, &controller).await,
                        Err(err) => IpcResponse::error(format!("invalid json: {err}")),
                    };

                    let mut response_line = serde_json::to_string(&response).unwrap_or_else(|_| {
                        r#"{"ok":false,"error":"serialization failed"}"#.to_owned()
                    });
                    response_line.push('\n');

                    if let Err(err) = writer.write_all(response_line.as_bytes()).await {
                        warn!(%err, "failed to write ipc response");
                        break;
                    }
                }
                Err(err) => {
                    warn!(%err, "ipc read error");
                    break;
                }
            }
        }

        info!("IPC connection closed");
    }
    .instrument(span)
    .await;
}

/// Route an IPC command to the controller.
async fn dispatch_command(request: &IpcRequest, controller: &SessionController) -> IpcResponse {
    let span = info_span!("ipc_command", command = %request.command);
    async move {
        match request.command.as_str() {
            "start" => handle_start(request, controller).await,
            "stop" => match controller.stop().await {
                Ok(ack) => IpcResponse::from_serializable(&ack),
                Err(err) => IpcResponse::from_app_error(&err),
            },
            "status" => IpcResponse::from_serializable(&controller.status().await),
            other => IpcResponse::error(format!("unknown command: {other}")),
        }
    }
    .instrument(span)
    .await
}

/// Start a session and reply with its terminal outcome.
async fn handle_start(request: &IpcRequest, controller: &SessionController) -> IpcResponse {
    let Some(user_id) = request.user_id.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
        return IpcResponse::error("missing required 'user_id' field");
    };

    match controller.start(user_id, request.kind.as_deref()).await {
        Ok(outcome) => IpcResponse::from_serializable(&outcome),
        Err(err) => IpcResponse::from_app_error(&err),
    }
}
