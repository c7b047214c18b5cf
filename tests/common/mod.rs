//! In-process relay for integration tests: a real WebSocket server whose
//! protocol behavior is supplied per test as a closure over parsed frames.
#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use nostr_pool::Event;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Sending this through the behavior channel makes the server close the socket.
pub const CLOSE_SENTINEL: &str = "__close__";

/// Per-frame server behavior: receives each parsed client frame and a channel
/// for outbound raw frames.
pub type Behavior = Arc<dyn Fn(Value, &mpsc::UnboundedSender<String>) + Send + Sync>;

pub struct MockRelay {
    addr: SocketAddr,
    _accept_task: JoinHandle<()>,
}

pub fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}

impl MockRelay {
    pub async fn start(behavior: Behavior) -> Self {
        Self::start_with_greeting(behavior, Vec::new()).await
    }

    /// Start a relay that pushes `greeting` frames as soon as a client
    /// connects, before any client frame arrives.
    pub async fn start_with_greeting(behavior: Behavior, greeting: Vec<String>) -> Self {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept_task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(serve(stream, Arc::clone(&behavior), greeting.clone()));
            }
        });
        Self {
            addr,
            _accept_task: accept_task,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }
}

async fn serve(stream: TcpStream, behavior: Behavior, greeting: Vec<String>) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let (mut sink, mut reader) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    for frame in greeting {
        let _ = tx.send(frame);
    }

    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if text == CLOSE_SENTINEL {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(frame)) = reader.next().await {
        match frame {
            Message::Text(text) => {
                if let Ok(value) = serde_json::from_str::<Value>(text.as_str()) {
                    behavior(value, &tx);
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    drop(tx);
    let _ = writer.await;
}

/// Behavior of a well-behaved relay holding the given stored events: REQ gets
/// the events and an EOSE, EVENT gets an accepting OK, COUNT gets a fixed
/// count, AUTH gets an accepting OK.
pub fn stored_events_behavior(events: Vec<Event>) -> Behavior {
    Arc::new(move |msg, tx| match msg[0].as_str() {
        Some("REQ") => {
            let sub = msg[1].as_str().unwrap_or_default();
            for event in &events {
                let body = serde_json::to_string(event).unwrap();
                let _ = tx.send(format!(r#"["EVENT","{sub}",{body}]"#));
            }
            let _ = tx.send(format!(r#"["EOSE","{sub}"]"#));
        }
        Some("EVENT") | Some("AUTH") => {
            let id = msg[1]["id"].as_str().unwrap_or_default();
            let _ = tx.send(format!(r#"["OK","{id}",true,"stored"]"#));
        }
        Some("COUNT") => {
            let id = msg[1].as_str().unwrap_or_default();
            let count = events.len();
            let _ = tx.send(format!(r#"["COUNT","{id}",{{"count":{count}}}]"#));
        }
        _ => {}
    })
}

/// Behavior that never answers anything.
pub fn silent_behavior() -> Behavior {
    Arc::new(|_, _| {})
}

/// A well-formed 64-character hex event id.
pub fn hex_id(n: u32) -> String {
    format!("{n:064x}")
}

pub fn sample_event(id: impl Into<String>, kind: u16, created_at: u64) -> Event {
    Event {
        id: id.into(),
        pubkey: "a".repeat(64),
        created_at,
        kind,
        tags: vec![],
        content: format!("event at {created_at}"),
        sig: "b".repeat(128),
    }
}
