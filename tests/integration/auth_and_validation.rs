//! Authentication and request-validation coverage (spec.md §8 scenarios
//! S4/S6, §4.4 "empty required field" and "unknown key" edge cases).

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
async fn unauth_request_on_a_fresh_connection_is_forbidden() {
    let addr = start_server().await;
    let mut client = Client::connect(addr).await;

    client
        .send(json!({"type": "getrooms", "timestamp": 1, "key": "garbage"}))
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["type"], "getrooms-response");
    assert_eq!(reply["code"], 403);
}

#[tokio::test]
async fn login_with_unknown_username_is_forbidden_and_creates_no_session() {
    let addr = start_server().await;
    let mut client = Client::connect(addr).await;

    client
        .send(json!({"type": "login", "timestamp": 1, "username": "ghost", "password": "whatever"}))
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["code"], 403);
    assert!(reply.get("key").is_none() || reply["key"].is_null());
}

#[tokio::test]
async fn login_with_wrong_password_is_forbidden() {
    let addr = start_server().await;
    let mut client = Client::connect(addr).await;
    client
        .send(json!({"type": "register", "timestamp": 1, "username": "dave", "password": "right"}))
        .await;
    client.recv().await;

    client
        .send(json!({"type": "login", "timestamp": 1, "username": "dave", "password": "wrong"}))
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["code"], 403);
}

#[tokio::test]
async fn empty_username_on_register_is_bad_request() {
    let addr = start_server().await;
    let mut client = Client::connect(addr).await;
    client
        .send(json!({"type": "register", "timestamp": 1, "username": "", "password": "pw"}))
        .await;
    assert_eq!(client.recv().await["code"], 400);
}

#[tokio::test]
async fn joinroom_against_a_nonexistent_room_is_bad_request() {
    let addr = start_server().await;
    let mut client = Client::connect(addr).await;
    client
        .send(json!({"type": "register", "timestamp": 1, "username": "erin", "password": "pw"}))
        .await;
    client.recv().await;
    client
        .send(json!({"type": "login", "timestamp": 1, "username": "erin", "password": "pw"}))
        .await;
    let key = client.recv().await["key"].as_str().unwrap().to_owned();

    client
        .send(json!({"type": "joinroom", "timestamp": 1, "key": key, "room": "does-not-exist"}))
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["type"], "joinroom-response");
    assert_eq!(reply["code"], 400);
}

#[tokio::test]
async fn logout_then_reusing_the_key_is_forbidden() {
    let addr = start_server().await;
    let mut client = Client::connect(addr).await;
    client
        .send(json!({"type": "register", "timestamp": 1, "username": "frank", "password": "pw"}))
        .await;
    client.recv().await;
    client
        .send(json!({"type": "login", "timestamp": 1, "username": "frank", "password": "pw"}))
        .await;
    let key = client.recv().await["key"].as_str().unwrap().to_owned();

    client
        .send(json!({"type": "logout", "timestamp": 1, "key": key}))
        .await;
    assert_eq!(client.recv().await["code"], 200);

    client
        .send(json!({"type": "getrooms", "timestamp": 1, "key": key}))
        .await;
    assert_eq!(client.recv().await["code"], 403);
}
