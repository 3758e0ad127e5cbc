//! Command dispatch: routes a decoded command to its handler and turns
//! every outcome, success or failure, into exactly one [`Response`].
//!
//! No handler error ever propagates out of [`dispatch`]; a malformed or
//! failing request must never tear down the client's connection.

use std::path::PathBuf;

use serde_json::{json, Map, Value};

use crate::protocol::{self, Command, CommandKind, DecodeError, Response};
use crate::registry::SessionId;
use crate::server::AppState;
use crate::supervisor::{self, LaunchError, ProbeError};

/// Decode and dispatch one inbound message for a session.
pub async fn dispatch(state: &AppState, session_id: SessionId, raw: &str) -> Response {
    let cmd = match protocol::decode(raw) {
        Ok(cmd) => cmd,
        Err(e @ DecodeError::InvalidJson(_)) => {
            tracing::warn!(%session_id, "invalid JSON received");
            return Response::error(e.best_effort_uid(), "Invalid JSON format.");
        }
        Err(e) => {
            tracing::warn!(%session_id, "request missing command or command_uid");
            return Response::error(
                e.best_effort_uid(),
                "Both 'command' and 'command_uid' are required.",
            );
        }
    };

    let Command { uid, kind, params } = cmd;
    match kind {
        CommandKind::ConnectServer => connect_server(state, session_id, uid, &params),
        CommandKind::DisconnectServer => disconnect_server(state, session_id, uid),
        CommandKind::OpenObsStudio => open_obs_studio(state, session_id, uid, &params).await,
        CommandKind::GetObsStudioStatus => get_obs_studio_status(session_id, uid, &params).await,
        CommandKind::Unknown(name) => {
            tracing::warn!(%session_id, command = %name, "unknown command");
            Response::error(uid, format!("Unknown command: {name}"))
        }
    }
}

/// CONNECT_SERVER: acknowledge the connection, echoing the (informational)
/// address and port along with the session id.
fn connect_server(
    state: &AppState,
    session_id: SessionId,
    uid: String,
    params: &Map<String, Value>,
) -> Response {
    let ip_address = params
        .get("ip_address")
        .and_then(Value::as_str)
        .unwrap_or(&state.config.ip_address);
    let port = params
        .get("port")
        .and_then(Value::as_u64)
        .unwrap_or(u64::from(state.config.port));

    tracing::info!(%session_id, ip_address, port, "client connected");
    Response::success_with(
        uid,
        "WebSocket connected successfully.",
        json!({
            "ip_address": ip_address,
            "port": port,
            "pid": session_id.to_string(),
        }),
    )
}

/// DISCONNECT_SERVER: close the session's connection. The connection loop
/// observes the cancelled token, exits, and runs cleanup.
fn disconnect_server(state: &AppState, session_id: SessionId, uid: String) -> Response {
    match state.sessions.cancel_token(&session_id) {
        Some(token) => {
            token.cancel();
            tracing::info!(%session_id, "client requested disconnect");
            Response::success(uid, "WebSocket disconnected successfully.")
        }
        None => {
            tracing::warn!(%session_id, "disconnect for unknown session");
            Response::error(uid, "WebSocket connection not found.")
        }
    }
}

/// OPEN_OBS_STUDIO: launch the configured (or caller-supplied) executable
/// and attach the handle to the session.
async fn open_obs_studio(
    state: &AppState,
    session_id: SessionId,
    uid: String,
    params: &Map<String, Value>,
) -> Response {
    let executable: PathBuf = params
        .get("path")
        .and_then(Value::as_str)
        .map(PathBuf::from)
        .unwrap_or_else(|| state.config.executable_path());
    let extra_args = params
        .get("param_path")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    // Liveness is what gates a new launch, not handle presence: a process
    // that exited on its own does not block relaunching.
    let already_running = state
        .sessions
        .with_record(&session_id, |record| {
            record.process.as_mut().is_some_and(|p| p.is_alive())
        });
    match already_running {
        None => {
            tracing::warn!(%session_id, "launch for unknown session");
            return Response::error(uid, "Invalid connection PID.");
        }
        Some(true) => {
            tracing::info!(%session_id, "launch rejected, process already running");
            return Response::error(uid, "OBS Studio is already running.");
        }
        Some(false) => {}
    }

    // Spawning is a blocking OS call; keep it off the async threads.
    let launched = tokio::task::spawn_blocking(move || supervisor::launch(&executable, &extra_args))
        .await;
    let process = match launched {
        Ok(Ok(process)) => process,
        Ok(Err(LaunchError::ExecutableNotFound(path))) => {
            tracing::error!(%session_id, path = %path.display(), "executable not found");
            return Response::error_with(
                uid,
                "OBS Studio executable not found.",
                json!({ "path": path }),
            );
        }
        Ok(Err(LaunchError::SpawnFailed(e))) => {
            tracing::error!(%session_id, ?e, "failed to spawn process");
            return Response::error_with(
                uid,
                "Failed to launch OBS Studio.",
                json!({ "error": e.to_string() }),
            );
        }
        Err(e) => {
            tracing::error!(%session_id, ?e, "launch task failed");
            return Response::error_with(
                uid,
                "Failed to launch OBS Studio.",
                json!({ "error": e.to_string() }),
            );
        }
    };

    let pid = process.pid();
    let mut orphan = Some(process);
    let attached = state
        .sessions
        .with_record(&session_id, |record| record.process = orphan.take())
        .is_some();
    if let Some(mut process) = orphan {
        // Session vanished while we were spawning; don't leak the child.
        tracing::warn!(%session_id, pid, "session gone after launch, terminating orphan");
        process.terminate().await;
    }
    if !attached {
        return Response::error(uid, "Invalid connection PID.");
    }

    tracing::info!(%session_id, pid, "process launched for session");
    Response::success_with(
        uid,
        "OBS Studio launched successfully.",
        json!({ "app_pid": pid }),
    )
}

/// GET_OBS_STUDIO_STATUS: probe an OS process by pid. Session-independent.
async fn get_obs_studio_status(
    session_id: SessionId,
    uid: String,
    params: &Map<String, Value>,
) -> Response {
    let app_pid = params
        .get("app_pid")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok());
    let Some(app_pid) = app_pid else {
        tracing::warn!(%session_id, "invalid app_pid parameter");
        return Response::error(uid, "Invalid 'app_pid'; must be an integer.");
    };

    match supervisor::probe(app_pid).await {
        Ok(status) => Response::success_with(
            uid,
            "OBS Studio is running.",
            json!({
                "app_pid": status.pid,
                "status": status.status,
                "cpu_usage": status.cpu_usage,
                "memory_usage": status.memory_usage,
            }),
        ),
        Err(ProbeError::NotRunning(pid)) => {
            tracing::warn!(%session_id, pid, "probed process not running");
            Response::error(uid, "OBS Studio is not running.")
        }
        Err(ProbeError::NotFound(pid)) => {
            tracing::warn!(%session_id, pid, "no process with probed pid");
            Response::error(uid, "No OBS Studio process found with the given 'app_pid'.")
        }
    }
}
