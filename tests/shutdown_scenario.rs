mod common;

use common::{TestClient, TestServer};

#[tokio::test]
async fn graceful_shutdown_notifies_and_disconnects_every_session() {
    let server = TestServer::start(|_| {}).await;

    let mut alice = TestClient::connect(server.addr, "alice", "x").await;
    let mut bob = TestClient::connect(server.addr, "bob", "y").await;
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    let credential_path = server.ctx.config.credential_path.clone();
    let log_path = server.ctx.config.log_path.clone();

    server.shutdown().await;

    let alice_notice = alice
        .recv_matching(|line| line.contains("Server is shutting down."))
        .await;
    assert!(alice_notice.is_some());
    assert!(alice.recv_line().await.is_none(), "alice's connection should close after the notice");

    let bob_notice = bob
        .recv_matching(|line| line.contains("Server is shutting down."))
        .await;
    assert!(bob_notice.is_some());

    assert!(std::path::Path::new(&credential_path).exists());
    assert!(std::path::Path::new(&log_path).exists());
}
