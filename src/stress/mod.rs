//! Internal socket-level tests.
//!
//! Fake nodes listen on local TCP ports, speak RESP through the crate's own
//! codec and answer from a shared [`FakeCluster`], so the real TCP transport
//! is driven through redirects, migrations and node failures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::cluster::key_slot;
use crate::core::builder::ClientBuilder;
use crate::core::command::Cmd;
use crate::core::transport::{NodeAddress, TcpTransport};
use crate::proto::codec::{Decoder, Encoder};
use crate::proto::frame::Frame;
use crate::testing::{FakeCluster, Session};
use crate::ClusterClient;

struct FakeNodes {
    cluster: Arc<Mutex<FakeCluster>>,
    addresses: Vec<NodeAddress>,
    served: Arc<AtomicUsize>,
}

impl FakeNodes {
    async fn spawn(count: usize) -> Self {
        let cluster = Arc::new(Mutex::new(FakeCluster::new()));
        let served = Arc::new(AtomicUsize::new(0));
        let mut addresses = Vec::new();

        for _ in 0..count {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let address = NodeAddress::from(listener.local_addr().unwrap());
            cluster.lock().unwrap().add_node(&address);
            tokio::spawn(serve(
                listener,
                address.clone(),
                cluster.clone(),
                served.clone(),
            ));
            addresses.push(address);
        }

        Self {
            cluster,
            addresses,
            served,
        }
    }

    /// Spawns `count` nodes splitting the slot space evenly.
    async fn sharded(count: usize) -> Self {
        let nodes = Self::spawn(count).await;
        let per_node = 16384 / count;
        {
            let mut cluster = nodes.cluster.lock().unwrap();
            for (i, address) in nodes.addresses.iter().enumerate() {
                let start = (i * per_node) as u16;
                let end = if i + 1 == count {
                    16383
                } else {
                    ((i + 1) * per_node - 1) as u16
                };
                cluster.assign_slots(address, start..=end);
            }
        }
        nodes
    }

    fn owner(&self, key: &str) -> &NodeAddress {
        let per_node = 16384 / self.addresses.len();
        let idx = (key_slot(key) as usize / per_node).min(self.addresses.len() - 1);
        &self.addresses[idx]
    }

    async fn client(&self) -> ClusterClient<TcpTransport> {
        ClientBuilder::new()
            .seed(self.addresses[0].host(), self.addresses[0].port())
            .connection_timeout(Duration::from_secs(2))
            .read_timeout(Duration::from_secs(2))
            .write_timeout(Duration::from_secs(2))
            .build()
            .await
            .expect("Failed to connect")
    }
}

async fn serve(
    listener: TcpListener,
    address: NodeAddress,
    cluster: Arc<Mutex<FakeCluster>>,
    served: Arc<AtomicUsize>,
) {
    while let Ok((socket, _)) = listener.accept().await {
        tokio::spawn(handle(
            socket,
            address.clone(),
            cluster.clone(),
            served.clone(),
        ));
    }
}

async fn handle(
    mut socket: TcpStream,
    address: NodeAddress,
    cluster: Arc<Mutex<FakeCluster>>,
    served: Arc<AtomicUsize>,
) {
    let mut decoder = Decoder::new();
    let mut encoder = Encoder::new();
    let mut session = Session::default();
    let mut buf = [0u8; 4096];

    loop {
        let n = match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        decoder.append(&buf[..n]);

        while let Ok(Some(frame)) = decoder.decode() {
            let Some(cmd) = to_cmd(frame) else {
                return;
            };
            let reply = {
                let mut cluster = cluster.lock().unwrap();
                // an unreachable node hangs up on its clients
                if !cluster.accept_send(&address) {
                    return;
                }
                cluster.reply(&address, &mut session, &cmd)
            };
            served.fetch_add(1, Ordering::SeqCst);

            encoder.encode(&reply);
            let data = encoder.take();
            if socket.write_all(&data).await.is_err() {
                return;
            }
        }
    }
}

fn to_cmd(frame: Frame) -> Option<Cmd> {
    let Frame::Array(items) = frame else {
        return None;
    };
    let mut parts = items.into_iter().map(|item| match item {
        Frame::BulkString(Some(bytes)) => Some(bytes),
        _ => None,
    });
    let mut cmd = Cmd::new(parts.next()??);
    for part in parts {
        cmd = cmd.arg(part?);
    }
    Some(cmd)
}

#[tokio::test]
async fn test_redirects_over_tcp() {
    let nodes = FakeNodes::sharded(3).await;
    let mut client = nodes.client().await;

    for i in 0..200 {
        let key = format!("key:{}", i);
        assert!(client.set(&key, i.to_string()).await.unwrap());
    }
    assert_eq!(client.node_count(), 3);

    {
        let cluster = nodes.cluster.lock().unwrap();
        for i in 0..200 {
            let key = format!("key:{}", i);
            assert_eq!(
                cluster.stored(nodes.owner(&key), &key),
                Some(Bytes::from(i.to_string())),
                "{} stored on the wrong node",
                key
            );
        }
    }

    // every slot touched is cached now, so no command is redirected
    nodes.served.store(0, Ordering::SeqCst);
    for i in 0..200 {
        let key = format!("key:{}", i);
        assert_eq!(
            client.get(&key).await.unwrap(),
            Some(Bytes::from(i.to_string()))
        );
    }
    assert_eq!(nodes.served.load(Ordering::SeqCst), 200);

    client.close();
}

#[tokio::test]
async fn test_ask_migration_over_tcp() {
    let nodes = FakeNodes::sharded(2).await;
    let mut client = nodes.client().await;
    let slot = key_slot("foo");
    let owner = nodes.owner("foo").clone();
    let target = nodes
        .addresses
        .iter()
        .find(|a| **a != owner)
        .unwrap()
        .clone();

    assert_eq!(client.get("foo").await.unwrap(), None);
    assert_eq!(client.cached_route(slot), Some(&owner));

    nodes
        .cluster
        .lock()
        .unwrap()
        .migrate_slot(slot, &owner, &target);

    assert!(client.set("foo", "bar").await.unwrap());
    assert_eq!(
        nodes.cluster.lock().unwrap().stored(&target, "foo"),
        Some(Bytes::from("bar"))
    );
    // ASK never rewrites the route
    assert_eq!(client.cached_route(slot), Some(&owner));

    // once the slot is handed over, MOVED rewrites it
    nodes.cluster.lock().unwrap().move_slot(slot, &target);
    assert_eq!(client.get("foo").await.unwrap(), Some(Bytes::from("bar")));
    assert_eq!(client.cached_route(slot), Some(&target));
}

#[tokio::test]
async fn test_failover_over_tcp() {
    let nodes = FakeNodes::spawn(2).await;
    let (first, second) = (nodes.addresses[0].clone(), nodes.addresses[1].clone());
    nodes.cluster.lock().unwrap().push_reply(
        &first,
        Frame::Error(format!("MOVED 1 {}", second).into_bytes()),
    );

    let mut client = nodes.client().await;
    client.execute(None, Cmd::new("PING")).await.unwrap();
    assert_eq!(client.node_count(), 2);
    assert_eq!(client.current_node(), Some(&second));

    nodes.cluster.lock().unwrap().set_reachable(&second, false);

    let reply = client.execute(None, Cmd::new("PING")).await.unwrap();
    assert_eq!(reply, Frame::SimpleString(b"PONG".to_vec()));
    assert_eq!(client.current_node(), Some(&first));
}

#[tokio::test]
async fn test_concurrent_clients() {
    let nodes = FakeNodes::sharded(3).await;

    let mut handles = Vec::new();
    for worker in 0..16 {
        let mut client = nodes.client().await;
        handles.push(tokio::spawn(async move {
            for i in 0..25 {
                client.incr("{shared}counter").await.unwrap();
                let key = format!("worker:{}:{}", worker, i);
                assert!(client.hset(&key, "n", i.to_string()).await.unwrap());
            }
            client.close();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut client = nodes.client().await;
    assert_eq!(client.incr_by("{shared}counter", 0).await.unwrap(), 16 * 25);
    assert_eq!(
        client.hget("worker:3:7", "n").await.unwrap(),
        Some(Bytes::from("7"))
    );
}
