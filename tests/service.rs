use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use kdbxkey::service::{
    Database, LoginEntry, Request, RequestType, Response, Server, Service, ServiceConfig,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const KEY: [u8; 32] = [42u8; 32];

struct SingleEntry;

impl Database for SingleEntry {
    fn find_logins(&self, url: &str, _submit_url: Option<&str>) -> Vec<LoginEntry> {
        if url.contains("example.com") {
            self.all_logins()
        } else {
            Vec::new()
        }
    }

    fn all_logins(&self) -> Vec<LoginEntry> {
        vec![LoginEntry {
            login: "alice".into(),
            password: "correct horse".into(),
            uuid: "0001".into(),
            name: "Example".into(),
        }]
    }
}

fn local_config(idle_timeout: Duration) -> ServiceConfig {
    ServiceConfig::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, idle_timeout).unwrap()
}

fn request_head(addr: SocketAddr, content_length: usize) -> String {
    format!(
        "POST / HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\n\
         Content-Length: {content_length}\r\nConnection: close\r\n\r\n"
    )
}

/// Reads the whole response and returns its body.
async fn read_body(stream: &mut TcpStream) -> String {
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();

    assert!(raw.starts_with("HTTP/1.1 200"), "unexpected response: {raw}");
    let (_, body) = raw.split_once("\r\n\r\n").unwrap();
    body.to_string()
}

async fn post_raw(addr: SocketAddr, body: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = request_head(addr, body.len()) + body;
    stream.write_all(request.as_bytes()).await.unwrap();
    read_body(&mut stream).await
}

async fn post(addr: SocketAddr, body: &str) -> Response {
    serde_json::from_str(&post_raw(addr, body).await).unwrap()
}

fn spawn_server(idle_timeout: Duration) -> (SocketAddr, CancellationToken, JoinHandle<()>) {
    let service = Arc::new(Service::new(Arc::new(SingleEntry), Arc::new(|_: &str| true)));
    let server = Server::bind(local_config(idle_timeout), service).unwrap();
    let addr = server.local_addr().unwrap();
    let token = server.shutdown_token();
    let handle = tokio::spawn(async move { server.run().await.unwrap() });
    (addr, token, handle)
}

async fn start(idle_timeout: Duration) -> (SocketAddr, CancellationToken) {
    let (addr, token, _) = spawn_server(idle_timeout);
    (addr, token)
}

async fn associate(addr: SocketAddr) -> String {
    let mut associate = Request::new(RequestType::Associate).sign(&KEY).unwrap();
    associate.key = Some(STANDARD.encode(KEY));
    let response = post(addr, &serde_json::to_string(&associate).unwrap()).await;
    assert!(response.success, "{:?}", response.error);
    response.id.unwrap()
}

#[tokio::test]
async fn associate_then_fetch_logins_over_http() {
    let (addr, token) = start(Duration::from_secs(300)).await;
    let id = associate(addr).await;

    let mut get = Request::new(RequestType::GetLogins).sign(&KEY).unwrap();
    get.id = Some(id);
    get.url = Some("https://example.com/".into());
    let response = post(addr, &serde_json::to_string(&get).unwrap()).await;

    assert!(response.success);
    assert!(response.is_signed_by(&KEY));
    let entries = response.entries.unwrap();
    assert_eq!(entries.len(), 1);
    let entry = entries[0].open(&KEY).unwrap();
    assert_eq!(entry.login, "alice");
    assert_eq!(entry.password, "correct horse");

    token.cancel();
}

#[tokio::test]
async fn response_body_carries_no_plaintext_secrets() {
    let (addr, token) = start(Duration::from_secs(300)).await;
    let id = associate(addr).await;

    let mut get = Request::new(RequestType::GetAllLogins).sign(&KEY).unwrap();
    get.id = Some(id);
    let body = post_raw(addr, &serde_json::to_string(&get).unwrap()).await;

    assert!(body.contains("\"Entries\""), "{body}");
    assert!(!body.contains("correct horse"));
    assert!(!body.contains("alice"));

    token.cancel();
}

#[tokio::test]
async fn unauthenticated_request_gets_no_entries() {
    let (addr, token) = start(Duration::from_secs(300)).await;

    let body = r#"{"RequestType":"get-all-logins","Id":"nobody","Nonce":"AAAA","Verifier":"AAAA"}"#;
    let response = post(addr, body).await;

    assert!(!response.success);
    assert!(response.entries.is_none());

    token.cancel();
}

#[tokio::test]
async fn malformed_body_gets_protocol_error() {
    let (addr, token) = start(Duration::from_secs(300)).await;

    let response = post(addr, "definitely not json").await;
    assert!(!response.success);
    assert!(response.error.unwrap().contains("malformed request"));

    token.cancel();
}

#[tokio::test]
async fn idle_connection_is_closed() {
    let (addr, token) = start(Duration::from_secs(1)).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut buf = [0u8; 64];
    let read = tokio::time::timeout(Duration::from_secs(10), stream.read(&mut buf))
        .await
        .expect("server kept idle connection open");

    // either a clean close or a 408 before closing
    match read {
        Ok(0) => {}
        Ok(n) => assert!(String::from_utf8_lossy(&buf[..n]).starts_with("HTTP/1.1 408")),
        Err(_) => {}
    }

    token.cancel();
}

#[tokio::test]
async fn shutdown_stops_accepting() {
    let (_, token, handle) = spawn_server(Duration::from_secs(300));

    token.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_request() {
    let (addr, token, handle) = spawn_server(Duration::from_secs(300));

    let body = Request::new(RequestType::TestAssociate);
    let body = serde_json::to_string(&body).unwrap();
    let (first, rest) = body.split_at(body.len() / 2);

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all((request_head(addr, body.len()) + first).as_bytes())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    token.cancel();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!handle.is_finished(), "server stopped with a request in flight");

    stream.write_all(rest.as_bytes()).await.unwrap();
    let response: Response = serde_json::from_str(&read_body(&mut stream).await).unwrap();
    assert_eq!(response.request_type, "test-associate");

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}
