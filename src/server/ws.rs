//! WebSocket handler for real-time updates.
//!
//! Observers are receive-only: the server pushes one JSON text frame per
//! location update and drains whatever the client sends without acting on it.

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{future, SinkExt, StreamExt};

use crate::error::TransportError;
use crate::hub::ObserverSink;
use crate::server::state::AppState;

/// Write half of an upgraded socket.
struct WebSocketSink(SplitSink<WebSocket, Message>);

#[async_trait]
impl ObserverSink for WebSocketSink {
    async fn send(&mut self, frame: &str) -> Result<(), TransportError> {
        self.0.send(Message::Text(frame.to_owned())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.0.close().await?;
        Ok(())
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handles an individual WebSocket connection until the peer goes away.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, receiver) = socket.split();

    // A close frame ends the stream; pings are answered by axum
    let inbound = receiver.take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))));

    state.hub().observe(WebSocketSink(sender), inbound).await;
}
