//! Tests for the read-only HTTP store against a mock server.

#![cfg(feature = "http")]

use std::time::{Duration, UNIX_EPOCH};

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cachine::{
    Cachine, HttpStore, IdentityProcessor, ImageProperties, MemoryStore, Predicates,
    RequestEvent, Store, StoreError, VariantPathResolver,
};

const LAST_MODIFIED: &str = "Sat, 01 May 1982 00:00:00 GMT";

async fn server_with_image() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/originals/photos/cat.jpg"))
        .and(header("user-agent", cachine::user_agent().as_str()))
        .respond_with(ResponseTemplate::new(200).insert_header("Last-Modified", LAST_MODIFIED))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/originals/photos/cat.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Last-Modified", LAST_MODIFIED)
                .set_body_bytes(b"remote bytes".to_vec()),
        )
        .mount(&server)
        .await;
    server
}

fn store_for(server: &MockServer) -> HttpStore {
    HttpStore::new(format!("{}/originals/", server.uri())).unwrap()
}

// ============================================================================
// Store operations
// ============================================================================

#[tokio::test]
async fn stat_reads_last_modified() {
    let server = server_with_image().await;
    let store = store_for(&server);

    let stat = store.stat("/photos/cat.jpg").await.unwrap();
    assert_eq!(stat.mod_time, UNIX_EPOCH + Duration::from_secs(389_059_200));
}

#[tokio::test]
async fn open_read_streams_body() {
    let server = server_with_image().await;
    let store = store_for(&server);

    let mut stream = store.open_read("photos/cat.jpg").await.unwrap();
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(body, b"remote bytes");
}

#[tokio::test]
async fn missing_resource_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let store = store_for(&server);

    let err = store.stat("/photos/dog.jpg").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn server_errors_are_not_absence() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let store = store_for(&server);

    let err = store.open_read("/photos/cat.jpg").await.err().unwrap();
    assert!(matches!(err, StoreError::Http(_)));
}

#[tokio::test]
async fn missing_last_modified_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let store = store_for(&server);

    let err = store.stat("/photos/cat.jpg").await.unwrap_err();
    assert!(matches!(err, StoreError::Http(_)));
}

#[tokio::test]
async fn writes_are_refused() {
    let server = MockServer::start().await;
    let store = store_for(&server);

    let err = store.open_write("/photos/cat.jpg").await.err().unwrap();
    assert!(matches!(err, StoreError::ReadOnly));
    // Default touch is a no-op.
    store
        .touch("/photos/cat.jpg", UNIX_EPOCH, UNIX_EPOCH)
        .await
        .unwrap();
}

/// Serve one response whose body arrives chunk by chunk, `gap` apart.
async fn trickling_server(chunks: &'static [&'static [u8]], gap: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 1024];
        let _ = socket.read(&mut request).await.unwrap();

        let length: usize = chunks.iter().map(|c| c.len()).sum();
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {length}\r\nConnection: close\r\n\r\n"
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        for chunk in chunks {
            tokio::time::sleep(gap).await;
            socket.write_all(chunk).await.unwrap();
            socket.flush().await.unwrap();
        }
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn slow_bodies_are_not_cut_off_by_the_timeout() {
    // Four gaps of 150ms: well past the 300ms timeout in total, never in one read.
    let chunks: &[&[u8]] = &[b"abc", b"def", b"ghi", b"jkl"];
    let url = trickling_server(chunks, Duration::from_millis(150)).await;
    let store = HttpStore::with_timeout(url, Duration::from_millis(300)).unwrap();

    let mut stream = store.open_read("/big.jpg").await.unwrap();
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(body, b"abcdefghijkl");
}

#[tokio::test]
async fn stalled_bodies_time_out() {
    let url = trickling_server(&[b"abc", b"def"], Duration::from_millis(500)).await;
    let store = HttpStore::with_timeout(url, Duration::from_millis(100)).unwrap();

    let result = match store.open_read("/big.jpg").await {
        Ok(mut stream) => {
            let mut failed = false;
            while let Some(chunk) = stream.next().await {
                if chunk.is_err() {
                    failed = true;
                    break;
                }
            }
            failed
        }
        Err(_) => true,
    };
    assert!(result, "a stalled read should fail");
}

#[tokio::test]
async fn obsolete_last_modified_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Last-Modified", "Saturday, 01-May-82 00:00:00 GMT"),
        )
        .mount(&server)
        .await;
    let store = store_for(&server);

    let stat = store.stat("/photos/cat.jpg").await.unwrap();
    assert_eq!(stat.mod_time, UNIX_EPOCH + Duration::from_secs(389_059_200));
}

// ============================================================================
// As an origin
// ============================================================================

#[tokio::test]
async fn http_origin_feeds_memory_cache() {
    let server = server_with_image().await;
    let cache = MemoryStore::new().named("cache");

    let cachine = Cachine::builder::<ImageProperties>()
        .origin(store_for(&server))
        .cache(cache.clone())
        .resolver(VariantPathResolver)
        .processor(IdentityProcessor)
        .build()
        .unwrap();

    let mut events = cachine.request(
        "/photos/cat.jpg",
        ImageProperties::new(64, 64),
        Predicates::default(),
    );
    let mut payload = Vec::new();
    while let Some(event) = events.next().await {
        if let RequestEvent::Data(chunk) = event.unwrap() {
            payload.extend_from_slice(&chunk);
        }
    }
    assert_eq!(payload, b"remote bytes");
    assert_eq!(
        cache.get("/64x64/photos/cat.jpg").await,
        Some(Bytes::from_static(b"remote bytes"))
    );
    assert_eq!(
        cache.stat("/64x64/photos/cat.jpg").await.unwrap().mod_time,
        UNIX_EPOCH + Duration::from_secs(389_059_200)
    );
}
