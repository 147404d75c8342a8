//! Socket.IO ingress (spec §6.2): the server side of the edge's Broadcast
//! Client connection. Namespace `/iot`; `authenticate` must precede any
//! data event.

use fireline_protocol::reading::{AccelReading, Device, FootReading, Reading, Triple};
use fireline_protocol::wire::{
    self, AccelerometerEvent, AuthenticatePayload, FootPressureEvent, FootSide,
};
use serde_json::Value;
use socketioxide::extract::{Data, SocketRef};
use socketioxide::SocketIo;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Registers the `/iot` namespace handler on the Socket.IO layer.
pub fn register(io: &SocketIo, state: AppState) {
    io.ns(wire::NAMESPACE, move |socket: SocketRef| {
        let state = state.clone();
        async move { on_connect(socket, state).await }
    });
}

async fn on_connect(socket: SocketRef, state: AppState) {
    info!(socket_id = %socket.id, "edge agent connected");
    let authenticated = Arc::new(RwLock::new(false));

    socket.on(
        wire::EVENT_AUTHENTICATE,
        {
            let authenticated = authenticated.clone();
            move |socket: SocketRef, Data::<AuthenticatePayload>(payload)| {
                let authenticated = authenticated.clone();
                async move {
                    if payload.device_key.trim().is_empty() {
                        let _ = socket.emit(wire::EVENT_AUTH_ERROR, &"device_key required");
                        return;
                    }
                    *authenticated.write().await = true;
                    debug!(socket_id = %socket.id, "authenticated");
                    let _ = socket.emit(wire::EVENT_AUTH_SUCCESS, &Value::Null);
                }
            }
        },
    );

    socket.on(
        wire::EVENT_FOOT_PRESSURE,
        {
            let authenticated = authenticated.clone();
            let state = state.clone();
            move |socket: SocketRef, Data::<FootPressureEvent>(event)| {
                let authenticated = authenticated.clone();
                let state = state.clone();
                async move {
                    if !*authenticated.read().await {
                        let _ = socket.emit(wire::EVENT_AUTH_ERROR, &"not authenticated");
                        return;
                    }
                    ingest_foot(&state, event).await;
                }
            }
        },
    );

    socket.on(
        wire::EVENT_ACCELEROMETER,
        {
            let authenticated = authenticated.clone();
            let state = state.clone();
            move |socket: SocketRef, Data::<AccelerometerEvent>(event)| {
                let authenticated = authenticated.clone();
                let state = state.clone();
                async move {
                    if !*authenticated.read().await {
                        let _ = socket.emit(wire::EVENT_AUTH_ERROR, &"not authenticated");
                        return;
                    }
                    ingest_accel(&state, event).await;
                }
            }
        },
    );

    socket.on_disconnect(move |socket: SocketRef| async move {
        info!(socket_id = %socket.id, "edge agent disconnected");
    });
}

/// Readings only ever feed the currently-recording session (spec §4.7:
/// "the current session is recording"); with no active session, readings
/// are dropped and counted.
async fn ingest_foot(state: &AppState, event: FootPressureEvent) {
    let Ok(Some(session_id)) = state.sessions.active_session_id().await else {
        warn!("foot reading dropped, no active session");
        return;
    };
    let device = match event.data.foot {
        FootSide::Left => Device::LeftFoot,
        FootSide::Right => Device::RightFoot,
    };
    let mut values = [0.0; fireline_protocol::reading::FOOT_VALUES_LEN];
    for (slot, v) in values.iter_mut().zip(event.data.values.iter()) {
        *slot = *v;
    }
    let reading = Reading::Foot(FootReading {
        timestamp: event.timestamp,
        device,
        values,
        max: event.data.max,
        avg: event.data.avg,
        active_count: event.data.active_count,
    });
    state.windowing.ingest(session_id, reading);
}

async fn ingest_accel(state: &AppState, event: AccelerometerEvent) {
    let Ok(Some(session_id)) = state.sessions.active_session_id().await else {
        warn!("accel reading dropped, no active session");
        return;
    };
    let reading = Reading::Accel(AccelReading {
        timestamp: event.timestamp,
        acc: Triple::new(event.data.acc.x, event.data.acc.y, event.data.acc.z),
        gyro: Triple::new(event.data.gyro.x, event.data.gyro.y, event.data.gyro.z),
        angle: Triple::new(event.data.angle.roll, event.data.angle.pitch, event.data.angle.yaw),
    });
    state.windowing.ingest(session_id, reading);
}
