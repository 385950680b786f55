//! Integration tests against a real cluster.
//!
//! These tests require a cluster running on localhost:7000-7005.
//! All tests are marked with #[ignore] by default.
//!
//! Setup with Docker:
//! ```bash
//! docker run -d --name redis-cluster \
//!   -p 7000-7005:7000-7005 \
//!   grokzen/redis-cluster:latest
//! ```
//!
//! Run tests:
//! ```bash
//! cargo test --test cluster_integration -- --ignored
//! ```

use std::time::Duration;

use bytes::Bytes;
use shardwalk::{key_slot, ClientBuilder, ClusterClient, Result};

/// Helper function to create a cluster client for testing.
async fn create_test_client() -> Result<ClusterClient> {
    ClientBuilder::new()
        .address("redis://127.0.0.1:7000")
        .connection_timeout(Duration::from_secs(2))
        .build()
        .await
}

#[tokio::test]
#[ignore]
async fn test_cluster_connect() {
    let client = create_test_client().await.expect("failed to connect");
    assert!(client.node_count() >= 1);
    assert!(client.current_node().is_some());
}

#[tokio::test]
#[ignore]
async fn test_cluster_basic_operations() {
    let mut client = create_test_client().await.expect("failed to connect");

    let key = "integration:test:basic";
    assert!(client.set(key, "Hello, Cluster!").await.expect("SET failed"));
    assert_eq!(
        client.get(key).await.expect("GET failed"),
        Some(Bytes::from("Hello, Cluster!"))
    );
    assert!(client.exists(key).await.expect("EXISTS failed"));
    assert!(client.del(key).await.expect("DEL failed"));
    assert_eq!(client.get(key).await.expect("GET failed"), None);
}

#[tokio::test]
#[ignore]
async fn test_cluster_learns_nodes_from_redirects() {
    let mut client = create_test_client().await.expect("failed to connect");

    for i in 0..100 {
        let key = format!("integration:spread:{}", i);
        client.set(&key, i.to_string()).await.expect("SET failed");
    }

    assert!(
        client.node_count() >= 3,
        "expected redirects to reveal the masters, got {}",
        client.node_count()
    );
    assert!(client.routed_slot_count() > 0);

    for i in 0..100 {
        let key = format!("integration:spread:{}", i);
        client.del(&key).await.expect("DEL failed");
    }
}

#[tokio::test]
#[ignore]
async fn test_cluster_hash_tags() {
    let mut client = create_test_client().await.expect("failed to connect");

    let profile = "{user:1000}:profile";
    let visits = "{user:1000}:visits";
    assert_eq!(key_slot(profile), key_slot(visits));

    client.del(visits).await.expect("DEL failed");
    assert!(client.hset(profile, "name", "alice").await.expect("HSET failed"));
    assert!(!client.hset(profile, "name", "bob").await.expect("HSET failed"));
    assert_eq!(client.incr_by(visits, 5).await.expect("INCRBY failed"), 5);
    assert_eq!(client.incr_by(visits, -2).await.expect("INCRBY failed"), 3);

    assert_eq!(
        client.cached_route(key_slot(profile)),
        client.cached_route(key_slot(visits))
    );

    assert!(client.expire(profile, 60).await.expect("EXPIRE failed"));
    client.del(profile).await.expect("DEL failed");
    client.del(visits).await.expect("DEL failed");
}

#[tokio::test]
#[ignore]
async fn test_cluster_readonly_readwrite() {
    let mut client = create_test_client().await.expect("failed to connect");
    assert!(client.readonly().await.expect("READONLY failed"));
    assert!(client.readwrite().await.expect("READWRITE failed"));
    client.close();
}
