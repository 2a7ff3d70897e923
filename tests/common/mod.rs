//! Shared helpers for integration tests.

use std::time::Duration;

use miniblog::{Pipeline, Router, Server, ServerHandle};

/// Starts `router` behind the standard pipeline on an ephemeral local port.
pub async fn start(router: Router) -> ServerHandle {
    Server::new(Pipeline::standard(router))
        .start("127.0.0.1:0")
        .await
        .expect("server should bind to an ephemeral port")
}

/// A client that never pools connections or goes through a proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

pub fn url(handle: &ServerHandle, path: &str) -> String {
    format!("http://{}{}", handle.local_addr(), path)
}

/// Writes `request` verbatim on a fresh connection and returns everything the
/// server sends back before closing it, lowercased.
pub async fn raw_exchange(handle: &ServerHandle, request: &[u8]) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut stream = tokio::net::TcpStream::connect(handle.local_addr()).await.unwrap();
    stream.write_all(request).await.unwrap();

    let mut received = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf)).await {
            Ok(Ok(0)) | Ok(Err(_)) | Err(_) => break,
            Ok(Ok(n)) => received.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&received).to_lowercase()
}
