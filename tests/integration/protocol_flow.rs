//! Black-box protocol coverage driving the listener over a real loopback
//! `TcpStream` against the in-memory store (spec.md §8, scenarios S1/S2).

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use termchat_server::dispatcher::Shared;
use termchat_server::listener;
use termchat_server::room_cache::RoomCache;
use termchat_server::session_registry::SessionRegistry;
use termchat_server::store::memory::MemStore;
use termchat_server::store::ChatStore;

async fn start_server() -> std::net::SocketAddr {
    let listener_socket = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener_socket.local_addr().unwrap();
    drop(listener_socket);

    let shared = Shared {
        store: Arc::new(MemStore::new()) as Arc<dyn ChatStore>,
        registry: Arc::new(SessionRegistry::new()),
        rooms: Arc::new(RoomCache::new()),
    };
    let bind_addr = addr.to_string();
    tokio::spawn(async move {
        listener::run(&bind_addr, shared).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    addr
}

struct Client {
    writer: tokio::net::tcp::OwnedWriteHalf,
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
}

impl Client {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, write_half) = stream.into_split();
        Client {
            writer: write_half,
            reader: BufReader::new(read_half),
        }
    }

    async fn send(&mut self, frame: Value) {
        let mut line = serde_json::to_string(&frame).unwrap();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await.unwrap();
    }

    async fn recv(&mut self) -> Value {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        serde_json::from_str(line.trim_end()).unwrap()
    }
}

#[tokio::test]
async fn register_login_getrooms_scenario() {
    let addr = start_server().await;
    let mut client = Client::connect(addr).await;

    client
        .send(json!({"type": "register", "timestamp": 1, "username": "alice", "password": "pw1"}))
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["type"], "register-response");
    assert_eq!(reply["code"], 200);

    client
        .send(json!({"type": "login", "timestamp": 1, "username": "alice", "password": "pw1"}))
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["type"], "login-response");
    assert_eq!(reply["code"], 200);
    let key = reply["key"].as_str().unwrap().to_owned();
    assert!(!key.is_empty());

    client
        .send(json!({"type": "getrooms", "timestamp": 1, "key": key}))
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["type"], "getrooms-response");
    assert_eq!(reply["code"], 200);
    assert_eq!(reply["rooms"], json!({}));
}

#[tokio::test]
async fn createroom_adds_admin_and_general_channel_scenario() {
    let addr = start_server().await;
    let mut client = Client::connect(addr).await;

    client
        .send(json!({"type": "register", "timestamp": 1, "username": "bob", "password": "pw"}))
        .await;
    client.recv().await;
    client
        .send(json!({"type": "login", "timestamp": 1, "username": "bob", "password": "pw"}))
        .await;
    let key = client.recv().await["key"].as_str().unwrap().to_owned();

    client
        .send(json!({"type": "createroom", "timestamp": 1, "key": key, "room": "r1", "password": ""}))
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["type"], "createroom-response");
    assert_eq!(reply["code"], 200);

    client
        .send(json!({"type": "getrooms", "timestamp": 1, "key": key}))
        .await;
    let reply = client.recv().await;
    let rooms = reply["rooms"].as_object().unwrap();
    assert_eq!(rooms.len(), 1);
    let room = rooms.values().next().unwrap();
    assert_eq!(room["users"].as_object().unwrap().len(), 1);
    let channels = room["channels"].as_object().unwrap();
    assert_eq!(channels.len(), 1);
    assert!(channels.values().any(|c| c["name"] == "general"));
}

#[tokio::test]
async fn duplicate_room_name_scenario() {
    let addr = start_server().await;
    let mut client = Client::connect(addr).await;

    client
        .send(json!({"type": "register", "timestamp": 1, "username": "carol", "password": "pw"}))
        .await;
    client.recv().await;
    client
        .send(json!({"type": "login", "timestamp": 1, "username": "carol", "password": "pw"}))
        .await;
    let key = client.recv().await["key"].as_str().unwrap().to_owned();

    client
        .send(json!({"type": "createroom", "timestamp": 1, "key": key, "room": "dup", "password": ""}))
        .await;
    assert_eq!(client.recv().await["code"], 200);

    client
        .send(json!({"type": "createroom", "timestamp": 1, "key": key, "room": "dup", "password": ""}))
        .await;
    assert_eq!(client.recv().await["code"], 400);

    client
        .send(json!({"type": "getrooms", "timestamp": 1, "key": key}))
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["rooms"].as_object().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_type_closes_the_connection_without_a_reply() {
    let addr = start_server().await;
    let mut client = Client::connect(addr).await;

    client
        .writer
        .write_all(b"{\"type\":\"not-a-real-type\",\"timestamp\":1}\n")
        .await
        .unwrap();

    let mut line = String::new();
    let n = client.reader.read_line(&mut line).await.unwrap();
    assert_eq!(n, 0, "connection should be closed without a reply");
}
