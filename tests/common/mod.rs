#![allow(dead_code)]

use std::time::Duration;
use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use arb_ingest::config::retry::RetryPolicy;
use arb_ingest::ingest::connection::ConnectionSettings;
use arb_ingest::interfaces::TickSink;
use arb_ingest::types::tick::Tick;

pub type ServerSocket = WebSocketStream<TcpStream>;

pub async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

pub async fn accept(listener: &TcpListener) -> ServerSocket {
    let (stream, _) = timeout(Duration::from_secs(5), listener.accept())
        .await
        .expect("client never connected")
        .unwrap();
    accept_async(stream).await.unwrap()
}

/// Next text frame from the client, skipping keepalive frames.
pub async fn next_text(ws: &mut ServerSocket) -> String {
    loop {
        let message = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("no frame from client")
            .expect("client hung up")
            .unwrap();
        match message {
            Message::Text(text) if text != "ping" => return text,
            _ => {}
        }
    }
}

/// Next frame of any kind.
pub async fn next_message(ws: &mut ServerSocket) -> Message {
    timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("no frame from client")
        .expect("client hung up")
        .unwrap()
}

pub fn settings(url: &str) -> ConnectionSettings {
    ConnectionSettings {
        url: url.to_string(),
        ping_interval: Duration::from_secs(20),
        recv_poll_interval: Duration::from_millis(20),
        login_timeout: Duration::from_secs(2),
        retry: RetryPolicy {
            initial_delay_ms: 50,
            max_delay_ms: 50,
            ..RetryPolicy::default()
        },
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub ticks: Mutex<Vec<Tick>>,
}

impl RecordingSink {
    pub fn len(&self) -> usize {
        self.ticks.lock().len()
    }
}

impl TickSink for RecordingSink {
    fn on_tick(&self, tick: Tick) {
        self.ticks.lock().push(tick);
    }
}

pub async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(Instant::now() < deadline, "condition not met in time");
        sleep(Duration::from_millis(10)).await;
    }
}
