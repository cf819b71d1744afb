//! End-to-end exercise of the join handshake: reverse-lookup a bootstrap
//! peer, then let it connect back and register us (spec §4.G).

use std::time::Duration;

use test_util::spawn_node;

#[tokio::test]
async fn bootstrap_join_registers_both_peers() {
    let bootstrap = spawn_node().await.expect("spawn bootstrap node");
    let joiner = spawn_node().await.expect("spawn joining node");

    joiner
        .node
        .bootstrap_join(bootstrap.addr, Duration::from_secs(5))
        .await
        .expect("bootstrap join");

    assert!(joiner.knows_peer(&bootstrap.id).await);

    // The bootstrap node only learns of the joiner once the `JOIN` frame
    // sent by `broadcast_join` has been dispatched and its `RegisterPeer`
    // side effect applied; poll briefly since that happens on a task the
    // accept loop spawned for this connection.
    let mut seen = false;
    for _ in 0..50 {
        if bootstrap.knows_peer(&joiner.id).await {
            seen = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(seen, "bootstrap node never registered the joining peer");

    joiner.shutdown().await;
    bootstrap.shutdown().await;
}
