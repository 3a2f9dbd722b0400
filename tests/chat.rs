mod common;

use common::TestServer;

#[tokio::test]
async fn registration_then_chat_is_visible_to_room_and_users_lists_both() {
    let server = TestServer::start(|_| {}).await;

    let mut alice = common::TestClient::connect(server.addr, "alice", "secret").await;
    let mut bob = common::TestClient::connect(server.addr, "bob", "hunter2").await;

    // Let both joins land before alice speaks.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    alice.send("hello").await;

    let chat_line = bob
        .recv_matching(|line| line.contains("alice: hello"))
        .await
        .expect("bob should see alice's chat line");
    assert!(chat_line.contains("[#general]"));

    bob.send("/users").await;
    let roster = bob
        .recv_matching(|line| line.contains("Users in #general"))
        .await
        .expect("bob should get a roster");
    assert!(roster.contains("alice"));
    assert!(roster.contains("bob"));

    server.shutdown().await;
}

#[tokio::test]
async fn room_isolation_after_join() {
    let server = TestServer::start(|_| {}).await;

    let mut alice = common::TestClient::connect(server.addr, "alice", "x").await;
    let mut bob = common::TestClient::connect(server.addr, "bob", "y").await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    alice.send("/join games").await;
    let confirm = alice
        .recv_matching(|line| line.contains("You joined #games"))
        .await;
    assert!(confirm.is_some());

    bob.send("hi").await;
    let leaked = alice.recv_matching(|line| line.contains("bob: hi")).await;
    assert!(leaked.is_none(), "alice in #games should not see bob's #general chat");

    alice.send("hello games").await;
    let leaked_back = bob
        .recv_matching(|line| line.contains("alice: hello games"))
        .await;
    assert!(leaked_back.is_none(), "bob in #general should not see alice's #games chat");

    server.shutdown().await;
}
