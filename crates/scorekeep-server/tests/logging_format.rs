use std::io;
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use scorekeep_server::{build_router, ApiConfig, AppState, Credentials};
use scorekeep_store::MemoryBackend;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

struct BufferWriter(Arc<Mutex<Vec<u8>>>);

impl<'a> MakeWriter<'a> for SharedBuffer {
    type Writer = BufferWriter;

    fn make_writer(&'a self) -> Self::Writer {
        BufferWriter(Arc::clone(&self.0))
    }
}

impl io::Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "lock poisoned"))?;
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn log_lines(sink: &SharedBuffer) -> Vec<Value> {
    let bytes = sink.0.lock().expect("lock output").clone();
    String::from_utf8(bytes)
        .expect("utf8 log output")
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).expect("json log line"))
        .collect()
}

#[tokio::test]
async fn score_creation_logs_json_event_inside_request_span() {
    let sink = SharedBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(sink.clone())
        .json()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("install subscriber");

    let api = ApiConfig {
        credentials: Credentials::new("alice", "secret"),
        ..ApiConfig::default()
    };
    let app = build_router(AppState::with_config(Arc::new(MemoryBackend::new()), api));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });

    let body = r#"{"score": 12.5}"#;
    let auth = STANDARD.encode("alice:secret");
    let req = format!(
        "POST /compute/api/scores/mt/en-de HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\
Authorization: Basic {auth}\r\nx-request-id: req-log-check\r\n\
Content-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    stream
        .write_all(req.as_bytes())
        .await
        .expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    assert!(response.starts_with("HTTP/1.1 201"));

    let lines = log_lines(&sink);
    let created = lines
        .iter()
        .find(|l| l["fields"]["message"] == "score created")
        .expect("score created event");
    assert_eq!(created["level"], "INFO");
    assert_eq!(created["fields"]["task"], "mt");
    assert_eq!(created["fields"]["shard"], "en-de");
    assert_eq!(created["fields"]["id"], 0);
    assert_eq!(created["fields"]["user"], "alice");
    assert_eq!(created["span"]["name"], "http.request");
    assert_eq!(created["span"]["request_id"], "req-log-check");
    assert!(!created.to_string().contains("secret"));

    let finished = lines
        .iter()
        .find(|l| l["fields"]["message"] == "request finished")
        .expect("request finished event");
    assert_eq!(finished["fields"]["status"], 201);
    assert_eq!(finished["span"]["request_id"], "req-log-check");
}
