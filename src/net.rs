use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::KartError;
use crate::input::RawInput;
use crate::physics::PhysicsWorld;
use crate::state::SharedGameState;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Input(RawInput),
    Ping,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome { kart_id: String },
    Pong,
}

impl ServerMessage {
    fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

pub async fn start_websocket_server(
    bind: String,
    state: Arc<Mutex<SharedGameState>>,
    physics: Arc<Mutex<PhysicsWorld>>,
) -> Result<(), KartError> {
    let listener = TcpListener::bind(&bind).await?;
    info!(addr = %bind, "websocket listening");

    loop {
        let (raw, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(error = %err, "accept failed");
                continue;
            }
        };
        debug!(%peer, "tcp connection");
        tokio::spawn(handle_connection(raw, Arc::clone(&state), Arc::clone(&physics)));
    }
}

async fn handle_connection(raw: TcpStream, state: Arc<Mutex<SharedGameState>>, physics: Arc<Mutex<PhysicsWorld>>) {
    let ws = match accept_async(raw).await {
        Ok(ws) => ws,
        Err(err) => {
            warn!(error = %err, "websocket handshake failed");
            return;
        }
    };
    let (mut write, mut read) = ws.split();

    // -------------------------------
    // 1) Kart on the grid
    // -------------------------------
    let kart_id = Uuid::new_v4().to_string();
    if let Err(err) = physics.lock().await.spawn_kart(&kart_id) {
        warn!(kart = %kart_id, error = %err, "could not spawn kart");
        return;
    }

    // -------------------------------
    // 2) Outgoing channel + send loop
    // -------------------------------
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.lock().await.register_client(&kart_id, tx.clone());

    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if write.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    info!(kart = %kart_id, "player connected");
    if let Some(welcome) = (ServerMessage::Welcome { kart_id: kart_id.clone() }).to_json() {
        let _ = tx.send(welcome);
    }

    // -------------------------------
    // 3) Receive loop
    // -------------------------------
    while let Some(msg) = read.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(_) => break,
        };
        let Message::Text(text) = msg else { continue };

        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Ping) => {
                if let Some(pong) = ServerMessage::Pong.to_json() {
                    let _ = tx.send(pong);
                }
            }
            Ok(ClientMessage::Input(raw)) => {
                if let Err(err) = physics.lock().await.apply_input(&kart_id, raw) {
                    warn!(kart = %kart_id, error = %err, "input dropped");
                }
            }
            Err(err) => debug!(kart = %kart_id, error = %err, "unparsed client message"),
        }
    }

    info!(kart = %kart_id, "player disconnected");
    state.lock().await.remove_client(&kart_id);
    if let Err(err) = physics.lock().await.remove_kart(&kart_id) {
        warn!(kart = %kart_id, error = %err, "kart already gone");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_input_and_ping() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"input","steer":-0.5,"throttle":1,"drift":true,"use_item":false}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Input(RawInput { steer: -0.5, throttle: 1.0, drift: true, use_item: false })
        );

        // missing fields default to released
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"input","throttle":0.5}"#).unwrap();
        assert_eq!(msg, ClientMessage::Input(RawInput { throttle: 0.5, ..RawInput::default() }));

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ping);
    }

    #[test]
    fn welcome_carries_kart_id() {
        let json = ServerMessage::Welcome { kart_id: "abc".into() }.to_json().unwrap();
        assert_eq!(json, r#"{"type":"welcome","kart_id":"abc"}"#);
    }
}
