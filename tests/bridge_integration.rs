//! End-to-end scenarios from spec.md §8 that need real sockets: connect lifecycle
//! (scenario 5) and authority preemption (scenario 6).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};

use vda5050_tcp_bridge::protocol::frame::Reframer;
use vda5050_tcp_bridge::protocol::registry::{PortRole, MSG_GRAB_AUTHORITY};
use vda5050_tcp_bridge::session::{AgvSession, SessionEvent, SessionState};
use vda5050_tcp_bridge::supervisor::send_authority_preemption;

async fn bind_all() -> (HashMap<PortRole, u16>, HashMap<PortRole, TcpListener>) {
    let mut ports = HashMap::new();
    let mut listeners = HashMap::new();
    for role in PortRole::ALL {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        ports.insert(role, listener.local_addr().unwrap().port());
        listeners.insert(role, listener);
    }
    (ports, listeners)
}

#[tokio::test]
async fn connect_lifecycle_reports_open_and_close_events() {
    let (ports, listeners) = bind_all().await;
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let session = Arc::new(AgvSession::new(
        "agv-1".to_string(),
        "127.0.0.1".to_string(),
        ports,
        events_tx,
        shutdown_rx,
    ));

    // Accept one connection per listener concurrently with open_all so the handshake
    // completes instead of sitting in the kernel backlog unaccepted.
    let accept_tasks: Vec<_> = listeners
        .into_iter()
        .map(|(role, listener)| tokio::spawn(async move { (role, listener.accept().await) }))
        .collect();

    let opened = session.open_all().await;
    assert_eq!(opened.len(), PortRole::ALL.len(), "every port should connect");
    assert!(session.is_healthy());

    let mut streams = HashMap::new();
    for task in accept_tasks {
        let (role, accepted) = task.await.unwrap();
        let (stream, _addr) = accepted.unwrap();
        streams.insert(role, stream);
    }

    let mut seen_open = Vec::new();
    for _ in 0..PortRole::ALL.len() {
        match tokio::time::timeout(Duration::from_secs(1), events_rx.recv()).await {
            Ok(Some(SessionEvent::PortOpened { port_role, .. })) => seen_open.push(port_role),
            other => panic!("expected PortOpened, got {other:?}"),
        }
    }
    for role in PortRole::ALL {
        assert!(seen_open.contains(&role), "missing PortOpened for {role}");
    }

    // Dropping the accepted sockets simulates the AGV closing every connection.
    drop(streams);

    let mut seen_closed = Vec::new();
    for _ in 0..PortRole::ALL.len() {
        match tokio::time::timeout(Duration::from_secs(2), events_rx.recv()).await {
            Ok(Some(SessionEvent::PortClosed { port_role, .. })) => seen_closed.push(port_role),
            other => panic!("expected PortClosed, got {other:?}"),
        }
    }
    for role in PortRole::ALL {
        assert!(seen_closed.contains(&role), "missing PortClosed for {role}");
        assert_eq!(session.state(role), SessionState::Disconnected);
    }
    assert!(!session.is_healthy());
}

#[tokio::test]
async fn authority_packet_round_trips_over_the_wire() {
    let (ports, mut listeners) = bind_all().await;
    let authority_listener = listeners.remove(&PortRole::Authority).unwrap();
    // The other four ports are left unaccepted; the connect itself still succeeds since
    // the OS backlog accepts it without a pending `accept()` call.
    drop(listeners);

    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let session = Arc::new(AgvSession::new(
        "agv-2".to_string(),
        "127.0.0.1".to_string(),
        ports,
        events_tx,
        shutdown_rx,
    ));

    let accept = tokio::spawn(async move { authority_listener.accept().await });
    let opened = session.open_all().await;
    assert!(opened.contains(&PortRole::Authority));

    let (mut stream, _addr) = accept.await.unwrap().unwrap();

    // Drives the exact reaction the supervisor runs on
    // `SessionEvent::PortOpened { port_role: Authority, .. }`.
    send_authority_preemption(&session, "agv-2").await.unwrap();

    use tokio::io::AsyncReadExt;
    let mut buf = [0u8; 256];
    let n = tokio::time::timeout(Duration::from_secs(1), stream.read(&mut buf))
        .await
        .unwrap()
        .unwrap();

    let mut reframer = Reframer::new();
    let frames = reframer.feed(&buf[..n]);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].message_type, MSG_GRAB_AUTHORITY);
    let decoded: serde_json::Value = frames[0].body_json().unwrap();
    assert_eq!(decoded, json!({"nick_name": "agv-2"}));
}
