//! Server and clients from this workspace talking to each other.

use ironchat::prelude::*;
use std::net::SocketAddr;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

fn start_server() -> (Server, ServerHandle, SocketAddr) {
    let (mut server, handle) = ServerBuilder::new()
        .bind("127.0.0.1:0".parse().unwrap())
        .worker_threads(3)
        .build();
    let addr = server.start().unwrap();
    (server, handle, addr)
}

fn join(server: &ServerHandle, addr: SocketAddr, name: &str) -> (Client, ClientHandle) {
    let (client, handle) = ClientBuilder::new(addr).worker_threads(2).connect().unwrap();
    handle.send(name).unwrap();
    let registered = server.wait_for_event(
        TIMEOUT,
        |e| matches!(e, ServerEvent::Registered(_, n) if n == name),
    );
    assert!(registered.is_some(), "{name} did not register");
    (client, handle)
}

fn next_message(handle: &ClientHandle) -> Option<String> {
    match handle.wait_for(TIMEOUT, |e| matches!(e, ClientEvent::Message(_))) {
        Some(ClientEvent::Message(line)) => Some(line),
        _ => None,
    }
}

#[test]
fn test_chat_session() {
    let (mut server, events, addr) = start_server();
    let (_alice, alice) = join(&events, addr, "alice");
    let (_bob, bob) = join(&events, addr, "bob");

    alice.send("hi").unwrap();
    assert_eq!(next_message(&bob).as_deref(), Some("alice: hi"));

    bob.send("hello alice").unwrap();
    assert_eq!(next_message(&alice).as_deref(), Some("bob: hello alice"));

    alice.send("EXIT").unwrap();
    let closed = events.wait_for_event(TIMEOUT, |e| matches!(e, ServerEvent::SessionClosed(_)));
    assert!(closed.is_some());
    assert_eq!(events.registered_count(), 1);

    // EXIT never reaches bob
    bob.send("still there?").unwrap();
    assert!(
        bob.wait_for(Duration::from_millis(200), |e| matches!(e, ClientEvent::Message(_)))
            .is_none()
    );

    server.stop();
}

#[test]
fn test_clients_see_server_stop() {
    let (mut server, events, addr) = start_server();
    let (mut alice_client, alice) = join(&events, addr, "alice");
    let (mut bob_client, bob) = join(&events, addr, "bob");

    server.stop();
    assert!(!server.is_running());

    assert!(alice_client.wait_for_disconnect(TIMEOUT));
    assert!(bob_client.wait_for_disconnect(TIMEOUT));
    assert_eq!(
        alice.wait_for(TIMEOUT, |e| *e == ClientEvent::Disconnected),
        Some(ClientEvent::Disconnected)
    );
    assert_eq!(
        bob.wait_for(TIMEOUT, |e| *e == ClientEvent::Disconnected),
        Some(ClientEvent::Disconnected)
    );
}

#[test]
fn test_three_way_fan_out() {
    let (mut server, events, addr) = start_server();
    let (_a, alice) = join(&events, addr, "alice");
    let (_b, bob) = join(&events, addr, "bob");
    let (_c, carol) = join(&events, addr, "carol");

    for n in 0..20 {
        carol.send(format!("update {n}")).unwrap();
    }
    for n in 0..20 {
        let expected = format!("carol: update {n}");
        assert_eq!(next_message(&alice), Some(expected.clone()));
        assert_eq!(next_message(&bob), Some(expected));
    }

    server.stop();
}
