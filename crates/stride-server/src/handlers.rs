//! Connection handlers for the Stridewatch server.
//!
//! This module is the stream coordinator: it owns connection lifecycle,
//! feeds each inbound sample through normalization and fall detection,
//! persists it, and re-broadcasts it to every other observer.

use crate::config::Config;
use crate::history::HistoryStore;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use bytes::BytesMut;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use stride_core::{sample::now_ms, CadenceError, FallStateStore, SampleRecord, StreamHub};
use stride_protocol::{codec, Frame, RawVector, PROTOCOL_VERSION};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// The re-broadcast hub.
    pub hub: StreamHub,
    /// Per-connection fall detection state.
    pub falls: FallStateStore,
    /// Persisted sample history.
    pub history: HistoryStore,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    ///
    /// # Errors
    ///
    /// Returns an error if the detection config is invalid or the history
    /// log cannot be opened.
    pub fn new(config: Config) -> Result<Self> {
        let fall_config = config.detection.fall_config()?;
        let history = HistoryStore::open(&config.history.path, config.history.max_window)?;

        info!(
            freefall = fall_config.freefall_threshold,
            impact = fall_config.impact_threshold,
            window_ms = fall_config.window_ms,
            "Fall detection configured"
        );

        Ok(Self {
            hub: StreamHub::with_capacity(config.stream.capacity),
            falls: FallStateStore::new(fall_config),
            history,
            config,
        })
    }
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone())?);

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    // Build router
    let app = Router::new()
        .route(&config.stream.websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .route("/api/sensors", post(sensor_snapshot_handler))
        .route("/api/cadence", get(cadence_handler))
        .with_state(state);

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Stridewatch server listening on {}", addr);
    info!(
        "Stream endpoint: ws://{}{}",
        addr, config.stream.websocket_path
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Accept a one-off sensor snapshot over HTTP and re-broadcast it.
async fn sensor_snapshot_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    if !payload.is_object() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"message": "Invalid or missing JSON body."})),
        );
    }

    let accelerometer = raw_vector(payload.get("accelerometer"));
    let gyroscope = raw_vector(payload.get("gyroscope"));
    let record =
        SampleRecord::normalize(payload.get("timestamp"), &accelerometer, &gyroscope, now_ms());

    metrics::record_sample("http");
    match broadcast_record(&state, None, &record) {
        Ok(recipients) => debug!(recipients, "Snapshot re-broadcast"),
        Err(e) => {
            error!(error = %e, "Failed to encode snapshot broadcast");
            metrics::record_error("encode");
        }
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({"message": "Snapshot received."})),
    )
}

/// Cadence report over the persisted history.
async fn cadence_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.history.snapshot();

    match stride_core::estimate_cadence(&snapshot) {
        Ok(report) => {
            metrics::record_cadence_request("ok");
            (StatusCode::OK, Json(serde_json::json!(report)))
        }
        Err(CadenceError::InsufficientData { reason }) => {
            metrics::record_cadence_request("insufficient_data");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({
                    "message": "Not enough data for a cadence estimate.",
                    "reason": reason,
                })),
            )
        }
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.hub.observer_count() >= state.config.stream.max_connections {
        warn!("Connection limit reached, rejecting upgrade");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ws.on_upgrade(move |socket| handle_websocket(socket, state))
        .into_response()
}

/// Handle a WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    // Record connection metrics
    let _metrics_guard = ConnectionMetricsGuard::new();

    // Generate connection ID
    let connection_id = format!(
        "conn_{:x}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    );

    debug!(connection = %connection_id, "WebSocket connected");

    // Split the WebSocket
    let (mut sender, mut receiver) = socket.split();

    // Fall detection state lives exactly as long as the connection.
    state.falls.track(&connection_id);
    let mut stream_rx = state.hub.attach(&connection_id);

    // Send Connected frame
    let connected_frame = Frame::connected(
        &connection_id,
        PROTOCOL_VERSION.major,
        state.config.heartbeat.interval_ms as u32,
    );
    if let Ok(data) = codec::encode(&connected_frame) {
        if sender.send(Message::Binary(data.to_vec())).await.is_err() {
            error!(connection = %connection_id, "Failed to send Connected frame");
            state.falls.release(&connection_id);
            state.hub.detach(&connection_id);
            return;
        }
    }

    // Read buffer for partial frames
    let mut read_buffer = BytesMut::with_capacity(4096);

    // Message processing loop
    'session: loop {
        tokio::select! {
            biased;

            // Receive re-broadcast events from the hub
            event = stream_rx.recv() => {
                match event {
                    Ok(event) => {
                        // Samples are not echoed back to their source.
                        if event.is_from(&connection_id) {
                            continue;
                        }
                        if sender.send(Message::Binary(event.data.to_vec())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(connection = %connection_id, skipped, "Observer lagging, dropped events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            // Receive from WebSocket
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Binary(data))) => {
                        let start = Instant::now();
                        read_buffer.extend_from_slice(&data);

                        // Try to decode frames
                        loop {
                            match codec::decode_from(&mut read_buffer) {
                                Ok(Some(frame)) => {
                                    if let Err(e) = handle_frame(&frame, &connection_id, &state, &mut sender).await {
                                        error!(connection = %connection_id, error = %e, "Frame handling error");
                                        metrics::record_error("frame");
                                        break;
                                    }
                                }
                                Ok(None) => break,
                                Err(e) => {
                                    // Framing is unrecoverable after a corrupt
                                    // length prefix; drop the connection.
                                    warn!(connection = %connection_id, error = %e, "Protocol error, closing");
                                    metrics::record_error("protocol");
                                    break 'session;
                                }
                            }
                        }

                        metrics::record_ingest_latency(start.elapsed().as_secs_f64());
                    }
                    Some(Ok(Message::Text(text))) => {
                        // Treat text as binary
                        read_buffer.extend_from_slice(text.as_bytes());
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pongs
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(connection = %connection_id, "Received close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(connection = %connection_id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(connection = %connection_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // Cleanup: drop fall state and stream membership with the connection
    state.falls.release(&connection_id);
    state.hub.detach(&connection_id);

    debug!(connection = %connection_id, "WebSocket disconnected");
}

/// Handle a decoded frame.
async fn handle_frame(
    frame: &Frame,
    connection_id: &str,
    state: &Arc<AppState>,
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
) -> Result<()> {
    match frame {
        Frame::SensorUpdate {
            id,
            timestamp,
            accelerometer,
            gyroscope,
        } => {
            let record = SampleRecord::normalize(timestamp.as_ref(), accelerometer, gyroscope, now_ms());
            metrics::record_sample("stream");

            // Persist before detection so the cadence history sees every sample.
            state.history.append(&record);

            if let Some(event) = state.falls.apply(connection_id, &record) {
                warn!(
                    connection = %connection_id,
                    impact = event.impact_acceleration,
                    "Fall detected"
                );
                metrics::record_fall();

                let alert = Frame::fall_alert(event.detected_at_ms, event.impact_acceleration);
                send_frame(sender, &alert).await?;
            }

            let recipients = broadcast_record(state, Some(connection_id), &record)?;
            debug!(connection = %connection_id, recipients, "Sample re-broadcast");

            // Send ack if requested
            if let Some(req_id) = id {
                send_frame(sender, &Frame::ack(*req_id)).await?;
            }
        }

        Frame::Ping { timestamp } => {
            send_frame(sender, &Frame::pong(*timestamp)).await?;
        }

        Frame::Pong { .. } => {
            // Keepalive only
        }

        Frame::Connect { version, token } => {
            debug!(
                connection = %connection_id,
                version = version,
                has_token = token.is_some(),
                "Connect frame (already connected)"
            );
            // Connection already established, ignore
        }

        _ => {
            warn!(connection = %connection_id, frame_type = ?frame.frame_type(), "Unexpected frame type");
        }
    }

    Ok(())
}

/// Encode a normalized record once and fan it out through the hub.
fn broadcast_record(
    state: &AppState,
    source: Option<&str>,
    record: &SampleRecord,
) -> Result<usize> {
    let frame = Frame::sensor_broadcast(
        source.map(Into::into),
        record.received_at_ms,
        record.client_timestamp_ms,
        record.acceleration,
        record.angular_velocity,
    );
    let data = codec::encode(&frame)?;
    let recipients = state.hub.publish(source, data);
    metrics::record_broadcast(recipients);
    Ok(recipients)
}

/// Extract a raw 3-axis reading from an arbitrary JSON value.
fn raw_vector(value: Option<&Value>) -> RawVector {
    value
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

/// Send a frame to the WebSocket.
async fn send_frame(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    frame: &Frame,
) -> Result<()> {
    let data = codec::encode(frame)?;
    sender.send(Message::Binary(data.to_vec())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_vector_extraction() {
        let payload = json!({"accelerometer": {"x": 1.0, "y": "2.5", "z": null}});
        let raw = raw_vector(payload.get("accelerometer"));
        assert_eq!(raw.x, Some(json!(1.0)));
        assert_eq!(raw.y, Some(json!("2.5")));
        assert_eq!(raw.z, Some(json!(null)));

        // Missing or non-object input degrades to an empty reading.
        assert_eq!(raw_vector(None), RawVector::default());
        assert_eq!(raw_vector(Some(&json!("junk"))), RawVector::default());
    }

    #[test]
    fn test_app_state_rejects_bad_detection_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.history.path = dir
            .path()
            .join("history.jsonl")
            .to_string_lossy()
            .into_owned();
        config.detection.preset = "nonsense".to_string();

        assert!(AppState::new(config).is_err());
    }

    #[tokio::test]
    async fn test_ingest_detect_broadcast_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.history.path = dir
            .path()
            .join("history.jsonl")
            .to_string_lossy()
            .into_owned();

        let state = Arc::new(AppState::new(config).unwrap());
        state.falls.track("conn-1");
        let mut observer_rx = state.hub.attach("conn-2");

        // Freefall then impact through the public pieces the frame path uses.
        let freefall = SampleRecord::normalize(
            Some(&json!(0.0)),
            &RawVector::from_floats(0.0, 0.0, 1.0),
            &RawVector::default(),
            0,
        );
        assert!(state.falls.apply("conn-1", &freefall).is_none());
        state.history.append(&freefall);
        broadcast_record(&state, Some("conn-1"), &freefall).unwrap();

        let impact = SampleRecord::normalize(
            Some(&json!(500.0)),
            &RawVector::from_floats(20.0, 20.0, 20.0),
            &RawVector::default(),
            500,
        );
        let event = state.falls.apply("conn-1", &impact).unwrap();
        assert!(event.impact_acceleration > 30.0);

        // The observer got the re-broadcast, decodable as a frame.
        let received = observer_rx.recv().await.unwrap();
        assert!(received.is_from("conn-1"));
        let frame = codec::decode(&received.data).unwrap();
        assert!(matches!(frame, Frame::SensorBroadcast { .. }));

        assert_eq!(state.history.len(), 1);
    }
}
