//! End-to-end over a real localhost WebSocket.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use hearth_client::{
    ConnectionEvent, ConnectionManager, ConnectionState, Credentials, RealtimeConfig,
    TerminationReason, TransportMode,
};
use hearth_shared::{sockjs, Command, Frame};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::{http, Message};
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

const WAIT: Duration = Duration::from_secs(5);
const CHAT_PAYLOAD: &str = r#"{"id":1,"content":"hi"}"#;

#[derive(Clone, Copy)]
enum Upgrade {
    Accept,
    Reject(u16),
}

#[derive(Debug, Default, Clone)]
struct Handshake {
    authorization: Option<String>,
    path: String,
}

struct TestServer {
    url: String,
    frames: UnboundedReceiver<Frame>,
    handshake: Arc<Mutex<Handshake>>,
}

/// Minimal STOMP broker: CONNECTED for CONNECT, one MESSAGE per SUBSCRIBE.
async fn start_server(mode: TransportMode, upgrade: Upgrade) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (frame_tx, frames) = mpsc::unbounded_channel();
    let handshake = Arc::new(Mutex::new(Handshake::default()));
    let seen = handshake.clone();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let frame_tx = frame_tx.clone();
            let seen = seen.clone();
            tokio::spawn(async move {
                let callback = move |request: &Request, response: Response| {
                    *seen.lock().unwrap() = Handshake {
                        authorization: request
                            .headers()
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string),
                        path: request.uri().path().to_string(),
                    };
                    match upgrade {
                        Upgrade::Accept => Ok(response),
                        Upgrade::Reject(status) => {
                            let rejection: ErrorResponse = http::Response::builder()
                                .status(status)
                                .body(None)
                                .unwrap();
                            Err(rejection)
                        }
                    }
                };
                if let Ok(ws) = accept_hdr_async(stream, callback).await {
                    serve_stomp(ws, mode, frame_tx).await;
                }
            });
        }
    });

    TestServer {
        url: format!("ws://{}/ws", addr),
        frames,
        handshake,
    }
}

async fn serve_stomp(
    mut ws: WebSocketStream<TcpStream>,
    mode: TransportMode,
    frames: UnboundedSender<Frame>,
) {
    if mode == TransportMode::SockJs && ws.send(Message::Text("o".to_string().into())).await.is_err() {
        return;
    }

    while let Some(Ok(message)) = ws.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let payloads = match mode {
            TransportMode::Raw => vec![text.as_str().to_string()],
            TransportMode::SockJs => {
                serde_json::from_str::<Vec<String>>(text.as_str()).unwrap_or_default()
            }
        };

        for payload in payloads {
            let Ok(frame) = Frame::parse(&payload) else {
                continue;
            };
            let reply = match frame.command {
                Command::Connect => Some(Frame::new(Command::Connected).header("version", "1.2")),
                Command::Subscribe => Some(
                    Frame::new(Command::Message)
                        .header("subscription", frame.get("id").unwrap_or_default())
                        .header("destination", frame.get("destination").unwrap_or_default())
                        .header("message-id", "1")
                        .with_body(CHAT_PAYLOAD),
                ),
                _ => None,
            };
            let _ = frames.send(frame);

            if let Some(reply) = reply {
                let wire = match mode {
                    TransportMode::Raw => reply.encode(),
                    TransportMode::SockJs => format!("a{}", sockjs::encode_send(&reply.encode())),
                };
                if ws.send(Message::Text(wire.into())).await.is_err() {
                    return;
                }
            }
        }
    }
}

async fn next_frame(frames: &mut UnboundedReceiver<Frame>) -> Frame {
    timeout(WAIT, frames.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("server gone")
}

async fn wait_for(events: &mut UnboundedReceiver<ConnectionEvent>, wanted: ConnectionEvent) {
    timeout(WAIT, async {
        while let Some(event) = events.recv().await {
            if event == wanted {
                return;
            }
        }
        panic!("event stream ended before {:?}", wanted);
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {:?}", wanted));
}

fn manager_for(server: &TestServer, mode: TransportMode) -> ConnectionManager {
    let config = RealtimeConfig::new(server.url.clone())
        .with_transport(mode)
        .with_sockjs_info_check(false);
    let manager = ConnectionManager::with_websocket(config).unwrap();
    manager.set_credentials(Some(Credentials::new("T", "42")));
    manager
}

async fn exercise_session(mut server: TestServer, mode: TransportMode) -> TestServer {
    let manager = manager_for(&server, mode);
    let mut events = manager.events();
    manager.connect().unwrap();
    wait_for(
        &mut events,
        ConnectionEvent::StateChanged(ConnectionState::Connected),
    )
    .await;

    let connect = next_frame(&mut server.frames).await;
    assert_eq!(connect.command, Command::Connect);
    assert_eq!(connect.get("Authorization"), Some("Bearer T"));
    assert_eq!(connect.get("user-id"), Some("42"));

    let (tx, mut payloads) = mpsc::unbounded_channel::<Value>();
    let handle = manager
        .subscribe("/topic/chat/7", "chat-7", move |value| {
            let _ = tx.send(value);
        })
        .expect("subscribed while connected");

    let subscribe = next_frame(&mut server.frames).await;
    assert_eq!(subscribe.command, Command::Subscribe);
    assert_eq!(subscribe.get("destination"), Some("/topic/chat/7"));
    assert_eq!(subscribe.get("id"), handle.live.as_ref().map(|l| l.as_str()));

    let payload = timeout(WAIT, payloads.recv()).await.unwrap().unwrap();
    assert_eq!(payload, json!({"id": 1, "content": "hi"}));

    assert!(manager.publish("/app/sendMessage", &json!({"chatId": 7, "content": "yo"})));
    let send = next_frame(&mut server.frames).await;
    assert_eq!(send.command, Command::Send);
    assert_eq!(send.get("destination"), Some("/app/sendMessage"));
    let body: Value = serde_json::from_str(&send.body).unwrap();
    assert_eq!(body, json!({"chatId": 7, "content": "yo"}));

    manager.disconnect();
    assert_eq!(next_frame(&mut server.frames).await.command, Command::Unsubscribe);
    assert_eq!(next_frame(&mut server.frames).await.command, Command::Disconnect);
    assert_eq!(manager.state(), ConnectionState::Disconnected);

    server
}

#[tokio::test]
async fn stomp_over_raw_websocket() {
    let server = start_server(TransportMode::Raw, Upgrade::Accept).await;
    let server = exercise_session(server, TransportMode::Raw).await;

    let handshake = server.handshake.lock().unwrap().clone();
    assert_eq!(handshake.authorization.as_deref(), Some("Bearer T"));
    assert_eq!(handshake.path, "/ws");
}

#[tokio::test]
async fn stomp_over_sockjs_framing() {
    let server = start_server(TransportMode::SockJs, Upgrade::Accept).await;
    let server = exercise_session(server, TransportMode::SockJs).await;

    let handshake = server.handshake.lock().unwrap().clone();
    let segments: Vec<&str> = handshake.path.trim_start_matches('/').split('/').collect();
    assert_eq!(segments.len(), 4, "{}", handshake.path);
    assert_eq!(segments[0], "ws");
    assert_eq!(segments[3], "websocket");
}

#[tokio::test]
async fn rejected_upgrade_terminates_with_auth_failure() {
    let server = start_server(TransportMode::Raw, Upgrade::Reject(401)).await;
    let manager = manager_for(&server, TransportMode::Raw);
    let mut events = manager.events();

    manager.connect().unwrap();
    wait_for(
        &mut events,
        ConnectionEvent::StateChanged(ConnectionState::Terminated(
            TerminationReason::AuthenticationFailed,
        )),
    )
    .await;
    assert!(manager.user_id().is_none());
    assert_eq!(manager.reconnect_attempts(), 0);
}
