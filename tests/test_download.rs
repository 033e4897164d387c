use std::time::Duration;

use pathguard::Error;
use pathguard::fs::{FileAccess, LockManager, ReactiveFs};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn reactive() -> ReactiveFs {
    ReactiveFs::new(FileAccess::new(LockManager::new()))
}

#[tokio::test]
async fn test_download_success() {
    let server = MockServer::start().await;
    let payload: Vec<u8> = (0..50_000u32).map(|i| (i % 256) as u8).collect();
    Mock::given(method("GET"))
        .and(path("/files/blob.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("blob.bin");
    let url = format!("{}/files/blob.bin", server.uri());

    let written = reactive().download_to_file(url, &dest).await.unwrap();

    assert_eq!(written, payload.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), payload);
}

#[tokio::test]
async fn test_download_error_status_leaves_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("missing.bin");

    let err = reactive()
        .download_to_file(format!("{}/missing", server.uri()), &dest)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TransportFailure { .. }));
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_download_cut_mid_transfer_removes_partial_file() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = socket.read(&mut buf).await;
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\n")
            .await
            .unwrap();
        socket.write_all(&[b'x'; 300]).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        // Dropping the socket ends the body 700 bytes short.
    });

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("partial.bin");

    let err = reactive()
        .download_to_file(format!("http://{addr}/partial"), &dest)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TransportFailure { .. }));
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_download_connection_refused() {
    // Bind then drop to get a port nothing listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("never.bin");
    let download = reactive().download_to_file(format!("http://{addr}/x"), &dest);

    assert!(matches!(download.await, Err(Error::TransportFailure { .. })));
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_download_to_unwritable_destination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("data"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("no/such/dir/file.bin");

    let err = reactive().download_to_file(server.uri(), &dest).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}
