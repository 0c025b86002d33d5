//! Route handler functions for all API endpoints.
//!
//! Each handler extracts its request, calls into the coaching service, fans
//! the resulting event out to the call's listeners, and returns JSON.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use callcoach_core::{CoachEvent, DecisionPayload};
use callcoach_engine::{AnalyzeInput, Session, TranscriptInput};

use crate::error::ApiError;
use crate::hub::EventHub;
use crate::state::AppState;

/// Service name reported by `/health`.
pub const SERVICE_NAME: &str = "callcoach";

/// Call id used by listeners that do not name one.
pub const DEFAULT_CALL_ID: &str = "default";

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListenParams {
    #[serde(rename = "callId")]
    pub call_id: Option<String>,
}

impl ListenParams {
    fn call_id(self) -> String {
        self.call_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| DEFAULT_CALL_ID.to_string())
    }
}

/// Telephony webhook form.
#[derive(Debug, Deserialize)]
pub struct VoiceForm {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub ok: bool,
    pub suggestion: DecisionPayload,
}

// =============================================================================
// Health
// =============================================================================

/// GET /health - liveness and session count.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.service.active_sessions(),
    })
}

// =============================================================================
// Telephony
// =============================================================================

/// POST /voice - answer an inbound call and attach its media stream.
pub async fn voice(State(state): State<AppState>, Form(form): Form<VoiceForm>) -> Response {
    let call_sid = form
        .call_sid
        .filter(|sid| !sid.is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    let stream_url = format!(
        "wss://{}/ws?callId={}",
        state.config.server.public_host,
        percent_encode(&call_sid)
    );
    tracing::info!(call_id = %call_sid, "Inbound call connected");

    let twiml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Say voice="alice">Call connected. Live coach is starting.</Say>
  <Connect>
    <Stream url="{}" />
  </Connect>
</Response>"#,
        xml_escape(&stream_url)
    );

    ([(header::CONTENT_TYPE, "text/xml")], twiml).into_response()
}

// =============================================================================
// Transcript and coaching
// =============================================================================

/// POST /twilio/transcript - append a transcript line and broadcast it.
pub async fn transcript(
    State(state): State<AppState>,
    body: Result<Json<TranscriptInput>, JsonRejection>,
) -> Result<Json<OkResponse>, ApiError> {
    let Json(input) = body?;
    let (call_id, turn) = state.service.ingest(input)?;
    state.hub.publish(&call_id, CoachEvent::Transcript(turn));
    Ok(Json(OkResponse { ok: true }))
}

/// POST /coach/analyze - run one decision cycle over the displayed turns.
pub async fn analyze(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeInput>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let Json(input) = body?;
    let (call_id, suggestion) = state.service.analyze(input)?;
    state
        .hub
        .publish(&call_id, CoachEvent::Coach(suggestion.clone()));
    Ok(Json(AnalyzeResponse {
        ok: true,
        suggestion,
    }))
}

// =============================================================================
// Sessions
// =============================================================================

/// GET /sessions/{call_id} - current session state.
pub async fn get_session(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    Ok(Json(state.service.snapshot(&call_id)?))
}

/// DELETE /sessions/{call_id} - forget a call.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    state.service.reset(&call_id)?;
    Ok(Json(OkResponse { ok: true }))
}

// =============================================================================
// Listeners
// =============================================================================

/// GET /ws?callId= - WebSocket stream of one call's events.
pub async fn ws(
    State(state): State<AppState>,
    Query(params): Query<ListenParams>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let call_id = params.call_id();
    let hub = Arc::clone(&state.hub);
    upgrade.on_upgrade(move |socket| handle_socket(socket, call_id, hub))
}

async fn handle_socket(mut socket: WebSocket, call_id: String, hub: Arc<EventHub>) {
    let mut rx = hub.subscribe(&call_id);
    tracing::debug!(call_id = %call_id, "WebSocket listener attached");

    if send_event(&mut socket, &CoachEvent::connected(&call_id)).await {
        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Ok(event) => {
                        if !send_event(&mut socket, &event).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(call_id = %call_id, skipped, "Listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                incoming = socket.recv() => match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    // Pings are answered by axum; text frames carry nothing we act on.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(call_id = %call_id, "WebSocket receive error: {}", e);
                        break;
                    }
                },
            }
        }
    }

    drop(rx);
    hub.release(&call_id);
    tracing::debug!(call_id = %call_id, "WebSocket listener detached");
}

/// Send one event as a JSON text frame. Returns false once the socket is gone.
async fn send_event(socket: &mut WebSocket, event: &CoachEvent) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!("Failed to serialize event: {}", e);
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

/// GET /events?callId= - Server-Sent Events stream of one call's events.
pub async fn events(
    State(state): State<AppState>,
    Query(params): Query<ListenParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send> {
    let stream = listener_stream(Arc::clone(&state.hub), params.call_id());
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// The `connected` notice followed by every event published for `call_id`.
fn listener_stream(
    hub: Arc<EventHub>,
    call_id: String,
) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    let connected = CoachEvent::connected(&call_id);
    let rx = hub.subscribe(&call_id);
    tracing::debug!(call_id = %call_id, "SSE listener attached");

    let events = tokio_stream::once(Ok::<_, BroadcastStreamRecvError>(connected))
        .chain(BroadcastStream::new(rx))
        .filter_map(|result| match result {
            Ok(event) => {
                let data = serde_json::to_string(&event).unwrap_or_default();
                Some(Ok(Event::default().event(event.kind()).data(data)))
            }
            // Lagged: skip what was missed.
            Err(_) => None,
        });

    ReleaseOnDrop {
        inner: Some(Box::pin(events)),
        hub,
        call_id,
    }
}

/// Releases the call's channel once the client goes away.
struct ReleaseOnDrop<S> {
    inner: Option<Pin<Box<S>>>,
    hub: Arc<EventHub>,
    call_id: String,
}

impl<S: Stream> Stream for ReleaseOnDrop<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<S::Item>> {
        match self.inner.as_mut() {
            Some(inner) => inner.as_mut().poll_next(cx),
            None => Poll::Ready(None),
        }
    }
}

impl<S> Drop for ReleaseOnDrop<S> {
    fn drop(&mut self) {
        // The receiver must be gone before the hub checks for listeners.
        self.inner.take();
        self.hub.release(&self.call_id);
        tracing::debug!(call_id = %self.call_id, "SSE listener detached");
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Percent-encode everything outside the URL unreserved set.
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_encode() {
        assert_eq!(percent_encode("CA123abc"), "CA123abc");
        assert_eq!(percent_encode("a b&c"), "a%20b%26c");
        assert_eq!(percent_encode("é"), "%C3%A9");
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&apos;");
    }

    #[tokio::test]
    async fn test_listener_stream_releases_channel_on_drop() {
        let hub = Arc::new(EventHub::new(8));
        let mut stream = Box::pin(listener_stream(Arc::clone(&hub), "CA1".into()));
        assert_eq!(hub.listener_count("CA1"), 1);

        // The connected notice comes first.
        assert!(matches!(stream.next().await, Some(Ok(_))));
        hub.publish("CA1", CoachEvent::connected("CA1"));
        assert!(matches!(stream.next().await, Some(Ok(_))));

        drop(stream);
        assert_eq!(hub.channel_count(), 0);
    }

    #[test]
    fn test_listen_params_default_call_id() {
        assert_eq!(ListenParams { call_id: None }.call_id(), DEFAULT_CALL_ID);
        assert_eq!(
            ListenParams { call_id: Some(String::new()) }.call_id(),
            DEFAULT_CALL_ID
        );
        assert_eq!(ListenParams { call_id: Some("CA1".into()) }.call_id(), "CA1");
    }
}
