//! Test doubles: a scripted in-memory [`FrameSocket`] and a local axum mock of
//! the remote's polling + websocket endpoint.

use std::collections::{HashMap, VecDeque};
use std::io::Write as _;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequestParts, Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use flate2::Compression;
use flate2::write::GzEncoder;

use crate::transport::{FrameSocket, TransportError};

// =============================================================================
// SCRIPTED SOCKET
// =============================================================================

/// Shared view of what a [`MockSocket`] saw, usable after the socket has been
/// moved into a session.
#[derive(Clone, Default)]
pub(crate) struct SocketLog {
    sent: Arc<Mutex<Vec<String>>>,
    reads: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl SocketLog {
    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().expect("sent lock").clone()
    }

    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Replays a fixed list of inbound frames and records everything sent.
pub(crate) struct MockSocket {
    inbound: VecDeque<Result<String, TransportError>>,
    log: SocketLog,
    send_budget: Option<usize>,
    hang_when_drained: bool,
}

impl MockSocket {
    pub(crate) fn new(script: &[&str]) -> Self {
        Self {
            inbound: script.iter().map(|f| Ok((*f).to_owned())).collect(),
            log: SocketLog::default(),
            send_budget: None,
            hang_when_drained: false,
        }
    }

    /// Same as [`MockSocket::new`] with the probe exchange prepended, so the
    /// socket can go straight through `upgrade_with`.
    pub(crate) fn after_probe(script: &[&str]) -> Self {
        let mut all = vec![frames::PROBE_ACK, frames::NOOP];
        all.extend_from_slice(script);
        Self::new(&all)
    }

    /// Insert a transient read error before the remaining frames.
    pub(crate) fn with_leading_error(mut self) -> Self {
        let err = tokio_tungstenite::tungstenite::Error::Io(std::io::Error::other("transient"));
        self.inbound.push_front(Err(TransportError::from(err)));
        self
    }

    /// Block forever once the script runs out instead of reporting a close.
    pub(crate) fn hang_when_drained(mut self) -> Self {
        self.hang_when_drained = true;
        self
    }

    /// Allow `n` successful sends, then fail every send.
    pub(crate) fn fail_sends_after(mut self, n: usize) -> Self {
        self.send_budget = Some(n);
        self
    }

    pub(crate) fn log(&self) -> SocketLog {
        self.log.clone()
    }
}

#[async_trait::async_trait]
impl FrameSocket for MockSocket {
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        if let Some(budget) = self.send_budget.as_mut() {
            if *budget == 0 {
                return Err(TransportError::Closed);
            }
            *budget -= 1;
        }
        self.log.sent.lock().expect("sent lock").push(text.to_owned());
        Ok(())
    }

    async fn recv_text(&mut self) -> Result<String, TransportError> {
        match self.inbound.pop_front() {
            Some(frame) => {
                self.log.reads.fetch_add(1, Ordering::SeqCst);
                frame
            }
            None if self.hang_when_drained => std::future::pending().await,
            None => Err(TransportError::Closed),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.log.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// MOCK REMOTE
// =============================================================================

pub(crate) const AFFINITY_COOKIE: &str = "AWSALB=affinity-1";

/// One HTTP request as seen by the mock remote.
#[derive(Clone, Debug)]
pub(crate) struct RecordedRequest {
    pub method: String,
    pub transport: String,
    pub sid: Option<String>,
    pub cookie: Option<String>,
    pub user_agent: Option<String>,
    pub body: String,
}

/// Behaviour of the mock remote. Defaults mirror the live service.
pub(crate) struct MockRemote {
    pub sid: String,
    pub descriptor_body: Option<String>,
    pub confirm_body: String,
    pub verify_body: Option<String>,
    pub gzip: bool,
    pub ping_during_probe: bool,
    pub requests: Mutex<Vec<RecordedRequest>>,
    pub ws_frames: Mutex<Vec<String>>,
    pub asks: AtomicUsize,
}

impl Default for MockRemote {
    fn default() -> Self {
        Self {
            sid: "abc123".into(),
            descriptor_body: None,
            confirm_body: "OK".into(),
            verify_body: None,
            gzip: true,
            ping_during_probe: false,
            requests: Mutex::new(Vec::new()),
            ws_frames: Mutex::new(Vec::new()),
            asks: AtomicUsize::new(0),
        }
    }
}

impl MockRemote {
    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub(crate) fn ws_frames(&self) -> Vec<String> {
        self.ws_frames.lock().expect("ws lock").clone()
    }

    fn descriptor(&self) -> String {
        self.descriptor_body.clone().unwrap_or_else(|| {
            format!(
                "0{{\"sid\":\"{}\",\"upgrades\":[\"websocket\"],\"pingInterval\":25000,\"pingTimeout\":20000}}",
                self.sid
            )
        })
    }

    fn verify(&self) -> String {
        self.verify_body
            .clone()
            .unwrap_or_else(|| format!("40{{\"sid\":\"ns-{}\"}}", self.sid))
    }

    fn body(&self, text: &str) -> Vec<u8> {
        if !self.gzip {
            return text.as_bytes().to_vec();
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).expect("gzip write");
        encoder.finish().expect("gzip finish")
    }

    fn replies_for(&self, frame: &str) -> Vec<String> {
        match frame {
            frames::PROBE_REQUEST if self.ping_during_probe => {
                vec![frames::PING.into(), frames::PROBE_ACK.into()]
            }
            frames::PROBE_REQUEST => vec![frames::PROBE_ACK.into()],
            frames::UPGRADE => vec![frames::NOOP.into()],
            _ => match frames::decode_event(frame) {
                Ok(event) if event.kind() == frames::EventKind::Ask => {
                    let question: String = event.arg(0).expect("question argument");
                    let turn = self.asks.fetch_add(1, Ordering::SeqCst) + 1;
                    answer_frames(&question, turn)
                }
                _ => Vec::new(),
            },
        }
    }

    fn record(&self, method: &str, query: &HashMap<String, String>, headers: &HeaderMap, body: String) {
        let get_header = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToOwned::to_owned)
        };
        self.requests.lock().expect("requests lock").push(RecordedRequest {
            method: method.to_owned(),
            transport: query.get("transport").cloned().unwrap_or_default(),
            sid: query.get("sid").cloned(),
            cookie: get_header(header::COOKIE),
            user_agent: get_header(header::USER_AGENT),
            body,
        });
    }
}

/// Progress, answered and trailing frames for one ask.
pub(crate) fn answer_frames(question: &str, turn: usize) -> Vec<String> {
    vec![
        r#"42["query_progress",{"status":"pending","text":"","final":false}]"#.to_owned(),
        answered_frame(&format!("echo: {question}"), &format!("backend-{turn}"), &format!("rw-{turn}")),
        r#"42["query_progress",{"status":"completed","final":true}]"#.to_owned(),
    ]
}

/// A `query_answered` frame whose nested text carries `answer`.
pub(crate) fn answered_frame(answer: &str, backend_uuid: &str, read_write_token: &str) -> String {
    let details = serde_json::json!({
        "answer": answer,
        "web_results": [{"name": "Example", "url": "https://example.org", "snippet": "s", "client": "web"}],
        "chunks": [],
    });
    let envelope = serde_json::json!({
        "status": "completed",
        "uuid": "u-1",
        "read_write_token": read_write_token,
        "backend_uuid": backend_uuid,
        "text": details.to_string(),
    });
    frames::encode_event(None, frames::ANSWERED_EVENT, &[envelope]).expect("encode answered frame")
}

/// Serve `remote` on an ephemeral port; returns the endpoint URL.
pub(crate) async fn spawn_remote(remote: MockRemote) -> (String, Arc<MockRemote>) {
    let remote = Arc::new(remote);
    let app = Router::new()
        .route("/socket.io/", get(handle_get).post(handle_post))
        .with_state(Arc::clone(&remote));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock remote");
    let addr = listener.local_addr().expect("mock remote addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock remote serve");
    });

    (format!("http://{addr}/socket.io/"), remote)
}

async fn handle_get(
    State(remote): State<Arc<MockRemote>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    request: Request,
) -> Response {
    remote.record("GET", &query, &headers, String::new());

    if query.get("transport").map(String::as_str) == Some("websocket") {
        let (mut parts, _) = request.into_parts();
        return match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
            Ok(ws) => ws.on_upgrade(move |socket| serve_socket(socket, remote)),
            Err(rejection) => rejection.into_response(),
        };
    }

    if query.contains_key("sid") {
        let body = remote.body(&remote.verify());
        return ([(header::CONTENT_ENCODING, "gzip")], body).into_response();
    }

    let body = remote.body(&remote.descriptor());
    (
        [
            (header::SET_COOKIE, format!("{AFFINITY_COOKIE}; Path=/")),
            (header::CONTENT_ENCODING, "gzip".to_owned()),
        ],
        body,
    )
        .into_response()
}

async fn handle_post(
    State(remote): State<Arc<MockRemote>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    remote.record("POST", &query, &headers, body);
    if !query.contains_key("sid") {
        return StatusCode::BAD_REQUEST.into_response();
    }
    remote.body(&remote.confirm_body).into_response()
}

async fn serve_socket(mut socket: WebSocket, remote: Arc<MockRemote>) {
    while let Some(Ok(msg)) = socket.recv().await {
        let Message::Text(text) = msg else {
            continue;
        };
        remote.ws_frames.lock().expect("ws lock").push(text.as_str().to_owned());
        for reply in remote.replies_for(text.as_str()) {
            if socket.send(Message::Text(reply.into())).await.is_err() {
                return;
            }
        }
    }
}
