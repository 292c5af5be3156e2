//! Fault-scenario streaming over WebSocket.
//!
//! The client sends one opening message `{id, simulation_type}`; the server
//! then replays the scenario and pushes a snapshot every tick until the
//! client goes away.

use std::str::FromStr;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::error::ApiError;
use crate::backend::{AppState, SimulationKind};

#[derive(Debug, Deserialize)]
pub struct SimulationRequest {
    pub id: Option<String>,
    pub simulation_type: Option<String>,
}

/// GET /simulation - Upgrade to a streaming session
pub async fn simulation_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| stream_session(socket, state))
}

/// One tick of a session, serialized. Unknown scenario names and failed
/// operations produce an error payload instead of a snapshot.
pub fn simulation_frame(state: &AppState, id: &str, simulation_type: &str) -> String {
    let result = SimulationKind::from_str(simulation_type)
        .map_err(|_| {
            ApiError::BadRequest(format!("unknown simulation type: {simulation_type}"))
        })
        .and_then(|kind| {
            state
                .backend
                .lock()
                .run_simulation(kind, id)
                .map_err(ApiError::from)
        });
    let encoded = match result {
        Ok(snapshot) => serde_json::to_string(&snapshot),
        Err(error) => serde_json::to_string(&error.body()),
    };
    encoded.unwrap_or_else(|err| format!(r#"{{"error":"InternalServerError","message":"{err}"}}"#))
}

fn parse_opening(text: &str) -> Result<(String, String), ApiError> {
    let req: SimulationRequest = serde_json::from_str(text)
        .map_err(|err| ApiError::BadRequest(format!("invalid opening message: {err}")))?;
    match (req.id, req.simulation_type) {
        (Some(id), Some(kind)) if !id.is_empty() => Ok((id, kind)),
        _ => Err(ApiError::BadRequest(
            "opening message needs both id and simulation_type".to_string(),
        )),
    }
}

async fn stream_session(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let opening = loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => break text,
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => continue,
            Some(Err(err)) => {
                debug!(error = %err, "simulation socket failed before start");
                return;
            }
        }
    };

    let (id, simulation_type) = match parse_opening(&opening) {
        Ok(parsed) => parsed,
        Err(error) => {
            let body = serde_json::to_string(&error.body()).unwrap_or_default();
            let _ = sender.send(Message::Text(body)).await;
            let _ = sender.close().await;
            return;
        }
    };
    info!(node_id = %id, simulation_type = %simulation_type, "simulation session started");

    let mut ticker = interval(Duration::from_millis(state.cfg.simulation.stream_tick_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let frame = simulation_frame(&state, &id, &simulation_type);
                if let Err(err) = sender.send(Message::Text(frame)).await {
                    debug!(error = %err, "simulation client gone");
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(err)) => {
                    warn!(error = %err, "simulation socket error");
                    break;
                }
                Some(Ok(_)) => {}
            }
        }
    }
    info!(node_id = %id, "simulation session ended");
}
