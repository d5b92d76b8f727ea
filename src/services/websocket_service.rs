use std::{fmt, ops::ControlFlow};

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientMessage, ServerMessage},
    error::ServiceError,
    services::{room_events, room_service},
    state::{
        SharedState,
        presence::{ConnectionHandle, ConnectionId, Outbound},
        room::Identity,
    },
};

/// Handle the full lifecycle of a room WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket, identity: Identity) {
    let (sender, receiver) = socket.split();
    serve_connection(state, sender, receiver, identity).await;
}

/// Drive one connection over any frame sink and stream.
///
/// Reading stops when the peer closes or when the writer has shut the socket,
/// e.g. after the room was torn down. The leave protocol then runs to
/// completion before the connection is forgotten.
pub async fn serve_connection<S, R, E>(
    state: SharedState,
    sender: S,
    mut receiver: R,
    identity: Identity,
) where
    S: Sink<Message> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Outbound>();
    let connection_id: ConnectionId = Uuid::new_v4();

    // Dedicated writer task keeps outbound events flowing even while we await inbound frames.
    let mut writer_task = tokio::spawn(write_outbound(sender, outbound_rx, connection_id));

    state.presence().register(ConnectionHandle::new(
        connection_id,
        identity.clone(),
        outbound_tx.clone(),
    ));
    info!(connection = %connection_id, user = %identity.display_name(), "client connected");

    let writer_finished = loop {
        let message = tokio::select! {
            message = receiver.next() => message,
            _ = &mut writer_task => {
                debug!(connection = %connection_id, "socket closed by server; reader stopping");
                break true;
            }
        };
        match message {
            Some(Ok(Message::Text(text))) => match ClientMessage::from_json_str(&text) {
                Ok(inbound) => {
                    if handle_client_message(&state, connection_id, inbound)
                        .await
                        .is_break()
                    {
                        break false;
                    }
                }
                Err(err) => {
                    warn!(connection = %connection_id, error = %err, "failed to parse client message");
                }
            },
            Some(Ok(Message::Close(_))) | None => {
                info!(connection = %connection_id, "client closed");
                break false;
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_))) => {}
            Some(Err(err)) => {
                warn!(connection = %connection_id, error = %err, "websocket error");
                break false;
            }
        }
    };

    disconnect(&state, connection_id).await;
    if writer_finished {
        drop(outbound_tx);
    } else {
        finalize(writer_task, outbound_tx).await;
    }
}

/// Dispatch one inbound message to the coordinator, reporting failures to the sender.
///
/// Returns [`ControlFlow::Break`] when the connection must be closed.
pub async fn handle_client_message(
    state: &SharedState,
    connection: ConnectionId,
    message: ClientMessage,
) -> ControlFlow<()> {
    match message {
        ClientMessage::JoinRoom { room_id, username } => {
            match room_service::join(state, connection, room_id.as_deref(), username).await {
                Ok(_) => ControlFlow::Continue(()),
                Err(err) => {
                    warn!(connection = %connection, error = %err, "join failed; closing connection");
                    room_events::send_room_error(state, connection, join_error_message(&err));
                    if let Some(handle) = state.presence().connection(connection) {
                        handle.close();
                    }
                    ControlFlow::Break(())
                }
            }
        }
        ClientMessage::VideoAction {
            room_id,
            action,
            time,
            video_id,
        } => {
            if let Err(err) = room_service::apply_playback_action(
                state,
                connection,
                room_id.as_deref(),
                &action,
                time,
                video_id,
            )
            .await
            {
                warn!(connection = %connection, error = %err, "playback action failed");
                room_events::send_room_error(state, connection, err.to_string());
            }
            ControlFlow::Continue(())
        }
        ClientMessage::ChatMessage { room_id, message } => {
            if let Err(err) =
                room_service::post_chat_message(state, connection, room_id.as_deref(), message)
                    .await
            {
                warn!(connection = %connection, error = %err, "chat message failed");
                room_events::send_message_error(state, connection, err.to_string());
            }
            ControlFlow::Continue(())
        }
        ClientMessage::LeaveRoom => {
            match room_service::leave(state, connection).await {
                Ok(outcome) => debug!(connection = %connection, ?outcome, "left room on request"),
                Err(err) => warn!(connection = %connection, error = %err, "leave failed"),
            }
            ControlFlow::Continue(())
        }
        ClientMessage::Unknown => {
            debug!(connection = %connection, "ignoring unknown message type");
            ControlFlow::Continue(())
        }
    }
}

fn join_error_message(err: &ServiceError) -> String {
    match err {
        ServiceError::InvalidInput(_) | ServiceError::RoomNotFound(_) => err.to_string(),
        other => format!("Failed to join room: {other}"),
    }
}

/// Run the leave protocol and forget the connection.
async fn disconnect(state: &SharedState, connection: ConnectionId) {
    match room_service::leave(state, connection).await {
        Ok(outcome) => debug!(connection = %connection, ?outcome, "disconnect processed"),
        Err(err) => warn!(connection = %connection, error = %err, "leave after disconnect failed"),
    }
    state.presence().deregister(connection);
    info!(connection = %connection, "client disconnected");
}

/// Serialize queued events onto the socket until the channel closes or a close is requested.
async fn write_outbound<S>(
    mut sender: S,
    outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    connection: ConnectionId,
) where
    S: Sink<Message> + Unpin,
{
    let mut outbound = UnboundedReceiverStream::new(outbound_rx);
    while let Some(item) = outbound.next().await {
        let frame = match item {
            Outbound::Event(event) => match encode(&event) {
                Some(payload) => Message::Text(payload.into()),
                None => continue,
            },
            Outbound::Close => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        };
        if sender.send(frame).await.is_err() {
            debug!(connection = %connection, "socket closed while writing");
            break;
        }
    }
}

fn encode(event: &ServerMessage) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(payload) => Some(payload),
        Err(err) => {
            warn!(error = %err, "failed to serialize event `{event:?}`");
            None
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Outbound>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
