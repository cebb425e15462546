#![allow(dead_code)]

use messenger_service::config::Config;
use messenger_service::models::User;
use messenger_service::state::AppState;
use messenger_service::websocket::{ConnectionId, LiveConnection};
use serde_json::Value;
use tokio::sync::mpsc;

pub const PASSWORD: &str = "password1";

pub fn state() -> AppState {
    AppState::in_memory(Config::test_defaults())
}

pub async fn user(state: &AppState, username: &str) -> User {
    state.auth.register(username, PASSWORD).await.unwrap()
}

/// Bind a fresh connection for `user`, the way the WebSocket route does.
pub async fn connect(state: &AppState, user: &User) -> (ConnectionId, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(state.config.ws.outbound_buffer);
    let connection = LiveConnection::new(tx);
    let id = connection.id();
    state.binder.bind(user, connection).await;
    (id, rx)
}

/// Every frame currently queued on `rx`.
pub fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(serde_json::from_str(&frame).unwrap());
    }
    frames
}

pub fn of_type(frames: &[Value], kind: &str) -> Vec<Value> {
    frames.iter().filter(|f| f["type"] == kind).cloned().collect()
}

pub async fn mutual(state: &AppState, a: &User, b: &User) {
    state.contacts.add_contact(a.id, b.id).await.unwrap();
    state.contacts.add_contact(b.id, a.id).await.unwrap();
}
