mod common;

use std::time::Duration;

use axum::extract::ws::Message;
use common::{TestClient, memory_state};
use futures::{StreamExt, channel::mpsc};
use watch_together_back::{
    dao::room_store::RoomStore,
    services::{room_service, websocket_service::serve_connection},
    state::room::Identity,
};

fn is_event(frame: &Message, kind: &str) -> bool {
    match frame {
        Message::Text(text) => text.as_str().contains(&format!("\"type\":\"{kind}\"")),
        _ => false,
    }
}

#[tokio::test]
async fn reader_stops_once_the_room_is_torn_down() {
    let (state, _store) = memory_state().await;
    let alice = TestClient::connect(&state, None, "alice");
    room_service::join(&state, alice.id, Some("SOCK01"), None)
        .await
        .unwrap();

    let (inbound_tx, inbound_rx) = mpsc::unbounded::<Result<Message, axum::Error>>();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded::<Message>();
    let session = tokio::spawn(serve_connection(
        state.clone(),
        outbound_tx,
        inbound_rx,
        Identity::new(None, Some("bob".into())),
    ));

    inbound_tx
        .unbounded_send(Ok(Message::Text(
            r#"{"type":"joinRoom","roomId":"SOCK01"}"#.into(),
        )))
        .unwrap();
    loop {
        let frame = outbound_rx.next().await.unwrap();
        if is_event(&frame, "roomJoined") {
            break;
        }
    }

    room_service::leave(&state, alice.id).await.unwrap();

    // The peer keeps its side open; the session must end on its own.
    tokio::time::timeout(Duration::from_secs(5), session)
        .await
        .expect("reader kept running after teardown")
        .unwrap();
    let rest: Vec<Message> = outbound_rx.collect().await;
    assert!(rest.iter().any(|frame| is_event(frame, "roomDeleted")));
    assert!(matches!(rest.last(), Some(Message::Close(_))));
    assert!(state.presence().connections_in("SOCK01").is_empty());
    drop(inbound_tx);
}

#[tokio::test]
async fn peer_close_runs_the_leave_protocol() {
    let (state, store) = memory_state().await;
    let alice = TestClient::connect(&state, None, "alice");
    room_service::join(&state, alice.id, Some("SOCK02"), None)
        .await
        .unwrap();

    let (inbound_tx, inbound_rx) = mpsc::unbounded::<Result<Message, axum::Error>>();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded::<Message>();
    let session = tokio::spawn(serve_connection(
        state.clone(),
        outbound_tx,
        inbound_rx,
        Identity::new(None, Some("bob".into())),
    ));
    inbound_tx
        .unbounded_send(Ok(Message::Text(
            r#"{"type":"joinRoom","roomId":"SOCK02"}"#.into(),
        )))
        .unwrap();
    loop {
        if is_event(&outbound_rx.next().await.unwrap(), "roomJoined") {
            break;
        }
    }

    inbound_tx.unbounded_send(Ok(Message::Close(None))).unwrap();
    tokio::time::timeout(Duration::from_secs(5), session)
        .await
        .unwrap()
        .unwrap();

    let room = store.find_room("SOCK02").await.unwrap().unwrap();
    assert_eq!(room.members, vec!["alice".to_string()]);
}
