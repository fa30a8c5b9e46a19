//! Observe over `WebSocket` against a live server on a loopback port.

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use hatnode_core::dispatcher::ResourceDispatcher;
use hatnode_core::hardware::IndicatorHandle;
use hatnode_core::health::PollerHealth;
use hatnode_core::protocol::Request;
use hatnode_core::service::{DispatcherHandle, DispatcherService};
use hatnode_core::state::{ResourceId, ResourceState, change_feed};
use hatnode_core::tree::ResourceTree;
use hatnode_core::value::{LedColor, SwitchPosition};
use hatnode_hal::SimulatedIndicator;
use hatnode_server::router::build_router;
use hatnode_server::state::AppState;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

struct LiveNode {
    addr: SocketAddr,
    dispatcher: DispatcherHandle,
    joystick: Arc<ResourceState<SwitchPosition>>,
}

async fn serve() -> LiveNode {
    let (notifier, feed) = change_feed();
    let led = Arc::new(ResourceState::new(
        ResourceId::Led,
        LedColor::Green,
        notifier.clone(),
    ));
    let joystick = Arc::new(ResourceState::new(
        ResourceId::Joystick,
        SwitchPosition::Down,
        notifier,
    ));
    let dispatcher = ResourceDispatcher::new(
        ResourceTree::standard(),
        led,
        Arc::clone(&joystick),
        IndicatorHandle::new(SimulatedIndicator::new()),
        Arc::new(PollerHealth::new()),
    );
    let (service, handle) = DispatcherService::new(dispatcher, feed, 16);
    tokio::spawn(service.run());

    let router = build_router(Arc::new(AppState::new(handle.clone())));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await });

    LiveNode {
        addr,
        dispatcher: handle,
        joystick,
    }
}

async fn connect(node: &LiveNode, path: &str) -> Socket {
    let (socket, _response) = connect_async(format!("ws://{}/ws/{path}", node.addr))
        .await
        .unwrap();
    socket
}

/// Status of the plain HTTP answer to a refused upgrade.
async fn refused_status(node: &LiveNode, path: &str) -> Option<u16> {
    match connect_async(format!("ws://{}/ws/{path}", node.addr)).await {
        Err(WsError::Http(response)) => Some(response.status().as_u16()),
        _ => None,
    }
}

async fn next_frame(socket: &mut Socket) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if message.is_text() {
            return serde_json::from_str(message.to_text().unwrap()).unwrap();
        }
    }
}

async fn wait_for_observers(node: &LiveNode, expected: usize) -> bool {
    let needle = format!(" observers={expected} ");
    for _ in 0..200 {
        let reply = node.dispatcher.call(Request::get("/health")).await.unwrap();
        if reply.response.payload.contains(&needle) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn first_frame_is_current_state_then_changes_follow() {
    let node = serve().await;
    node.joystick.write(SwitchPosition::Up);

    let mut socket = connect(&node, "joystick").await;
    assert_eq!(
        next_frame(&mut socket).await,
        json!({"resource": "joystick", "version": 1, "value": "up"})
    );

    assert!(wait_for_observers(&node, 1).await);
    node.joystick.write(SwitchPosition::Down);
    assert_eq!(
        next_frame(&mut socket).await,
        json!({"resource": "joystick", "version": 2, "value": "down"})
    );
}

#[tokio::test]
async fn led_writes_stream_to_led_observers() {
    let node = serve().await;
    let mut socket = connect(&node, "led").await;
    assert_eq!(next_frame(&mut socket).await["version"], 0);

    let reply = node
        .dispatcher
        .call(Request::put("/led", "orange"))
        .await
        .unwrap();
    assert_eq!(reply.response.version, Some(1));
    assert_eq!(
        next_frame(&mut socket).await,
        json!({"resource": "led", "version": 1, "value": "orange"})
    );
}

#[tokio::test]
async fn closing_the_socket_unregisters_the_observer() {
    let node = serve().await;
    let mut socket = connect(&node, "joystick").await;
    let _ = next_frame(&mut socket).await;
    assert!(wait_for_observers(&node, 1).await);

    socket.send(Message::Close(None)).await.unwrap();
    drop(socket);
    assert!(wait_for_observers(&node, 0).await);
}

#[tokio::test]
async fn dropped_connection_unregisters_the_observer() {
    let node = serve().await;
    let socket = connect(&node, "led").await;
    assert!(wait_for_observers(&node, 1).await);

    drop(socket);
    assert!(wait_for_observers(&node, 0).await);
}

#[tokio::test]
async fn non_observable_paths_answer_without_upgrading() {
    let node = serve().await;
    assert_eq!(refused_status(&node, ".well-known/core").await, Some(200));
    assert_eq!(refused_status(&node, "health").await, Some(200));
    assert_eq!(refused_status(&node, "temperature").await, Some(404));
    assert!(wait_for_observers(&node, 0).await);
}
