mod common;

use std::time::Duration;

use common::{TestClient, TestServer};

#[tokio::test]
async fn third_connection_blocks_until_a_slot_frees_up() {
    let server = TestServer::start(|config| config.max_clients = 2).await;

    let alice = TestClient::connect(server.addr, "alice", "x").await;
    let _bob = TestClient::connect(server.addr, "bob", "y").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Third client's TCP connect succeeds, but its handshake is not yet
    // serviced: a chat line sent immediately should not be echoed back.
    let mut carol_stream = tokio::net::TcpStream::connect(server.addr).await.unwrap();
    use tokio::io::AsyncWriteExt;
    carol_stream
        .write_all(b"carol\nz\n")
        .await
        .unwrap();

    let mut buf = [0u8; 64];
    use tokio::io::AsyncReadExt;
    let still_blocked = tokio::time::timeout(Duration::from_millis(200), carol_stream.read(&mut buf)).await;
    assert!(still_blocked.is_err(), "carol should still be waiting for a permit");

    drop(alice);
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Now that a slot freed up, carol's handshake should proceed; she will
    // receive her own join announcement.
    let n = tokio::time::timeout(Duration::from_secs(2), carol_stream.read(&mut buf))
        .await
        .expect("carol should be admitted once a slot frees up")
        .unwrap();
    assert!(String::from_utf8_lossy(&buf[..n]).contains("carol has joined"));

    server.shutdown().await;
}
